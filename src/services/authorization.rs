use chrono::Utc;
use sea_orm::{ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::database::entities::{
    projects, stage_files, stages, tasks, user_sessions, users, UserRole,
};
use crate::errors::{CoreError, CoreErrorKind, CoreResult};

/// Authenticated caller of a service operation
#[derive(Clone, Debug)]
pub struct Actor {
    pub user: users::Model,
}

impl Actor {
    pub fn new(user: users::Model) -> Self {
        Self { user }
    }

    pub fn id(&self) -> i32 {
        self.user.id
    }

    pub fn role(&self) -> UserRole {
        self.user.role
    }

    pub fn is_admin(&self) -> bool {
        self.user.role.is_admin()
    }

    pub fn is_superadmin(&self) -> bool {
        self.user.role == UserRole::Superadmin
    }

    /// Tenant of the caller, or the `NO_COMPANY` error
    pub fn company_id(&self) -> CoreResult<i32> {
        self.user.company_id.ok_or_else(CoreError::no_company)
    }

    /// Entities of another tenant are reported as missing
    pub fn ensure_company(&self, entity: &str, id: i32, company_id: i32) -> CoreResult<()> {
        if self.is_superadmin() || self.user.company_id == Some(company_id) {
            Ok(())
        } else {
            Err(CoreError::not_found(entity, id))
        }
    }

    pub fn require_admin(&self) -> CoreResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(CoreError::forbidden("Admin role required"))
        }
    }
}

/// Resolves sessions to users and entities to the caller's tenant
#[derive(Clone, Debug)]
pub struct AuthorizationService {
    db: DatabaseConnection,
}

impl AuthorizationService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Get user from session ID
    pub async fn get_user_from_session(&self, session_id: &str) -> CoreResult<users::Model> {
        let session = user_sessions::Entity::find()
            .filter(user_sessions::Column::SessionId.eq(session_id))
            .filter(user_sessions::Column::IsActive.eq(true))
            .one(&self.db)
            .await?
            .ok_or_else(|| CoreError::unauthorized("Invalid or expired session"))?;

        if session.expires_at <= Utc::now() {
            return Err(CoreError::unauthorized("Session expired"));
        }

        let user = users::Entity::find_by_id(session.user_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| CoreError::unauthorized("Invalid or expired session"))?;

        if !user.is_active {
            return Err(CoreError::forbidden("Account is deactivated"));
        }

        Ok(user)
    }
}

/// Load a project visible to `actor`
pub async fn load_project<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    project_id: i32,
) -> CoreResult<projects::Model> {
    if !actor.is_superadmin() {
        actor.company_id()?;
    }

    let project = projects::Entity::find_by_id(project_id)
        .one(db)
        .await?
        .ok_or_else(|| CoreError::not_found("Project", project_id))?;

    actor.ensure_company("Project", project_id, project.company_id)?;
    Ok(project)
}

/// Load a stage together with its project, scoped to `actor`'s tenant
pub async fn load_stage<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    stage_id: i32,
) -> CoreResult<(stages::Model, projects::Model)> {
    let stage = stages::Entity::find_by_id(stage_id)
        .one(db)
        .await?
        .ok_or_else(|| CoreError::not_found("Stage", stage_id))?;

    let project = load_project(db, actor, stage.project_id)
        .await
        .map_err(|err| match err.kind() {
            CoreErrorKind::NotFound => CoreError::not_found("Stage", stage_id),
            _ => err,
        })?;

    Ok((stage, project))
}

pub async fn load_stage_file<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    file_id: i32,
) -> CoreResult<(stage_files::Model, stages::Model, projects::Model)> {
    let file = stage_files::Entity::find_by_id(file_id)
        .one(db)
        .await?
        .ok_or_else(|| CoreError::not_found("File", file_id))?;

    let (stage, project) = load_stage(db, actor, file.stage_id)
        .await
        .map_err(|err| match err.kind() {
            CoreErrorKind::NotFound => CoreError::not_found("File", file_id),
            _ => err,
        })?;

    Ok((file, stage, project))
}

pub async fn load_task<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    task_id: i32,
) -> CoreResult<(tasks::Model, stages::Model, projects::Model)> {
    let task = tasks::Entity::find_by_id(task_id)
        .one(db)
        .await?
        .ok_or_else(|| CoreError::not_found("Task", task_id))?;

    let (stage, project) = load_stage(db, actor, task.stage_id)
        .await
        .map_err(|err| match err.kind() {
            CoreErrorKind::NotFound => CoreError::not_found("Task", task_id),
            _ => err,
        })?;

    Ok((task, stage, project))
}

/// Active users of `company_id` among `user_ids`; any stranger is a validation error
pub async fn company_members<C: ConnectionTrait>(
    db: &C,
    company_id: i32,
    field: &str,
    user_ids: &[i32],
) -> CoreResult<Vec<users::Model>> {
    if user_ids.is_empty() {
        return Ok(Vec::new());
    }

    let members = users::Entity::find()
        .filter(users::Column::Id.is_in(user_ids.iter().copied()))
        .filter(users::Column::CompanyId.eq(company_id))
        .filter(users::Column::IsActive.eq(true))
        .all(db)
        .await?;

    if let Some(stranger) = user_ids
        .iter()
        .find(|id| !members.iter().any(|m| m.id == **id))
    {
        return Err(CoreError::invalid_field(
            field,
            format!("User {} is not a member of this company", stranger),
        ));
    }

    Ok(members)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::entities::users::Model as User;

    fn actor(role: UserRole, company_id: Option<i32>) -> Actor {
        let now = Utc::now();
        Actor::new(User {
            id: 7,
            company_id,
            email: "a@example.com".into(),
            password_hash: String::new(),
            first_name: None,
            last_name: None,
            role,
            is_active: true,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        })
    }

    #[test]
    fn missing_company_is_reported_as_no_company() {
        let err = actor(UserRole::Member, None).company_id().unwrap_err();
        assert_eq!(err.kind().error_code(), "NO_COMPANY");
    }

    #[test]
    fn foreign_entities_look_missing() {
        let member = actor(UserRole::Member, Some(1));
        assert!(member.ensure_company("Project", 3, 1).is_ok());
        let err = member.ensure_company("Project", 3, 2).unwrap_err();
        assert_eq!(err.kind().http_status_code(), 404);
    }

    #[test]
    fn superadmin_crosses_tenants() {
        let root = actor(UserRole::Superadmin, Some(1));
        assert!(root.ensure_company("Project", 3, 2).is_ok());
        assert!(root.require_admin().is_ok());
        assert!(actor(UserRole::Member, Some(1)).require_admin().is_err());
    }
}
