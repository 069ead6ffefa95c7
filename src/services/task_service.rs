use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::database::entities::{tasks, users, TaskStatus, UserSummary};
use crate::errors::{CoreError, CoreResult};
use crate::services::authorization::{company_members, load_stage, load_task, Actor};
use crate::services::history_service::{summary_or_unknown, user_summaries};
use crate::services::mailer::{notify, MailMessage, Mailer};

const MAX_DESCRIPTION_LEN: usize = 2000;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub assigned_to: i32,
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    pub description: Option<String>,
    pub assigned_to: Option<i32>,
    /// Answer to a revision request; reopens the task
    pub revision_response: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RevisionRequest {
    pub revision_note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    #[serde(flatten)]
    pub task: tasks::Model,
    pub assigned_by_user: UserSummary,
    pub assigned_to_user: UserSummary,
}

fn validate_description(description: &str) -> CoreResult<String> {
    let trimmed = description.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(CoreError::invalid_field(
            "description",
            format!("Description must be between 1 and {} characters", MAX_DESCRIPTION_LEN),
        ));
    }
    Ok(trimmed.to_string())
}

/// Tasks of the given stages with both parties resolved, oldest first
pub async fn tasks_for_stages<C: ConnectionTrait>(
    db: &C,
    stage_ids: &[i32],
) -> CoreResult<HashMap<i32, Vec<TaskView>>> {
    let mut grouped: HashMap<i32, Vec<TaskView>> = HashMap::new();
    if stage_ids.is_empty() {
        return Ok(grouped);
    }

    let rows = tasks::Entity::find()
        .filter(tasks::Column::StageId.is_in(stage_ids.iter().copied()))
        .order_by_asc(tasks::Column::CreatedAt)
        .order_by_asc(tasks::Column::Id)
        .all(db)
        .await?;
    let people = user_summaries(db, rows.iter().flat_map(|t| [t.assigned_by, t.assigned_to])).await?;

    for task in rows {
        grouped.entry(task.stage_id).or_default().push(TaskView {
            assigned_by_user: summary_or_unknown(&people, task.assigned_by),
            assigned_to_user: summary_or_unknown(&people, task.assigned_to),
            task,
        });
    }
    Ok(grouped)
}

#[derive(Clone)]
pub struct TaskService {
    db: DatabaseConnection,
    mailer: Arc<dyn Mailer>,
}

impl TaskService {
    pub fn new(db: DatabaseConnection, mailer: Arc<dyn Mailer>) -> Self {
        Self { db, mailer }
    }

    pub async fn create(
        &self,
        actor: &Actor,
        stage_id: i32,
        request: CreateTaskRequest,
    ) -> CoreResult<TaskView> {
        let (stage, project) = load_stage(&self.db, actor, stage_id).await?;
        let description = validate_description(&request.description)?;
        let assignee =
            company_members(&self.db, project.company_id, "assignedTo", &[request.assigned_to])
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| CoreError::invalid_field("assignedTo", "Unknown user"))?;

        let now = Utc::now();
        let task = tasks::ActiveModel {
            stage_id: Set(stage.id),
            assigned_by: Set(actor.id()),
            assigned_to: Set(assignee.id),
            description: Set(description),
            completed: Set(false),
            status: Set(TaskStatus::Pending),
            revision_note: Set(None),
            revision_response: Set(None),
            completed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        info!(
            "User {} assigned task {} on stage {} to user {}",
            actor.id(),
            task.id,
            stage.id,
            assignee.id
        );

        if assignee.id != actor.id() {
            self.send(
                &assignee,
                format!("New task in {}", project.name),
                format!(
                    "{} assigned you a task on the \"{}\" stage:\n\n{}",
                    actor.user.display_name(),
                    stage.name,
                    task.description
                ),
            )
            .await;
        }

        Ok(TaskView {
            assigned_by_user: UserSummary::from(&actor.user),
            assigned_to_user: UserSummary::from(&assignee),
            task,
        })
    }

    /// Assigner edits; a revision response puts a returned task back to pending
    pub async fn update(
        &self,
        actor: &Actor,
        task_id: i32,
        request: UpdateTaskRequest,
    ) -> CoreResult<TaskView> {
        let (task, _, project) = load_task(&self.db, actor, task_id).await?;
        if task.assigned_by != actor.id() {
            return Err(CoreError::forbidden("Only the assigner can edit this task"));
        }

        let mut active: tasks::ActiveModel = task.clone().into();
        if let Some(description) = &request.description {
            active.description = Set(validate_description(description)?);
        }
        if let Some(assigned_to) = request.assigned_to {
            company_members(&self.db, project.company_id, "assignedTo", &[assigned_to]).await?;
            active.assigned_to = Set(assigned_to);
        }
        if let Some(response) = request.revision_response {
            let response = response.trim().to_string();
            if !response.is_empty() {
                active.revision_response = Set(Some(response));
                if task.status == TaskStatus::NeedsRevision {
                    active.status = Set(TaskStatus::Pending);
                }
            }
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(&self.db).await?;
        info!("Task {} updated by user {}", updated.id, actor.id());
        self.view(updated).await
    }

    pub async fn complete(&self, actor: &Actor, task_id: i32) -> CoreResult<TaskView> {
        let (task, stage, _) = load_task(&self.db, actor, task_id).await?;
        if task.assigned_to != actor.id() {
            return Err(CoreError::forbidden("Only the assignee can complete this task"));
        }

        let now = Utc::now();
        let mut active: tasks::ActiveModel = task.into();
        active.completed = Set(true);
        active.status = Set(TaskStatus::Completed);
        active.completed_at = Set(Some(now));
        active.updated_at = Set(now);
        let updated = active.update(&self.db).await?;

        info!("Task {} completed by user {}", updated.id, actor.id());
        self.notify_assigner(
            &updated,
            format!("Task completed on {}", stage.name),
            format!(
                "{} completed the task:\n\n{}",
                actor.user.display_name(),
                updated.description
            ),
        )
        .await?;
        self.view(updated).await
    }

    pub async fn request_revision(
        &self,
        actor: &Actor,
        task_id: i32,
        request: RevisionRequest,
    ) -> CoreResult<TaskView> {
        let (task, stage, _) = load_task(&self.db, actor, task_id).await?;
        if task.assigned_to != actor.id() {
            return Err(CoreError::forbidden(
                "Only the assignee can request a revision",
            ));
        }

        let note = request
            .revision_note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| CoreError::invalid_field("revisionNote", "A revision note is required"))?;

        let mut active: tasks::ActiveModel = task.into();
        active.completed = Set(false);
        active.status = Set(TaskStatus::NeedsRevision);
        active.completed_at = Set(None);
        active.revision_note = Set(Some(note));
        active.updated_at = Set(Utc::now());
        let updated = active.update(&self.db).await?;

        info!("Revision requested on task {} by user {}", updated.id, actor.id());
        self.notify_assigner(
            &updated,
            format!("Revision requested on {}", stage.name),
            format!(
                "{} asked for a revision:\n\n{}",
                actor.user.display_name(),
                updated.revision_note.as_deref().unwrap_or_default()
            ),
        )
        .await?;
        self.view(updated).await
    }

    /// Assigner only, while the task is still open
    pub async fn delete(&self, actor: &Actor, task_id: i32) -> CoreResult<()> {
        let (task, _, _) = load_task(&self.db, actor, task_id).await?;
        if task.assigned_by != actor.id() {
            return Err(CoreError::forbidden("Only the assigner can delete this task"));
        }
        if task.completed {
            return Err(CoreError::conflict("Completed tasks cannot be deleted"));
        }

        tasks::Entity::delete_by_id(task.id).exec(&self.db).await?;
        info!("Task {} deleted by user {}", task_id, actor.id());
        Ok(())
    }

    async fn view(&self, task: tasks::Model) -> CoreResult<TaskView> {
        let people = user_summaries(&self.db, [task.assigned_by, task.assigned_to]).await?;
        Ok(TaskView {
            assigned_by_user: summary_or_unknown(&people, task.assigned_by),
            assigned_to_user: summary_or_unknown(&people, task.assigned_to),
            task,
        })
    }

    async fn notify_assigner(&self, task: &tasks::Model, subject: String, text: String) -> CoreResult<()> {
        if task.assigned_by == task.assigned_to {
            return Ok(());
        }
        if let Some(assigner) = users::Entity::find_by_id(task.assigned_by).one(&self.db).await? {
            self.send(&assigner, subject, text).await;
        }
        Ok(())
    }

    async fn send(&self, to: &users::Model, subject: String, text: String) {
        notify(
            self.mailer.as_ref(),
            MailMessage {
                to: to.email.clone(),
                subject,
                text,
            },
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_utils::setup_test_db;
    use crate::services::mailer::LogMailer;
    use crate::services::project_service::{CreateProjectRequest, ProjectService};
    use crate::services::template_service::{CreateTemplateRequest, TemplateService};
    use crate::services::test_support::{seed_company_with_admin, seed_member};

    struct Fixture {
        service: TaskService,
        assigner: Actor,
        assignee: Actor,
        stage_id: i32,
    }

    async fn fixture() -> Fixture {
        let db = setup_test_db().await;
        let (company, assigner) = seed_company_with_admin(&db).await;
        let assignee = seed_member(&db, company.id, "worker@acme.test").await;
        TemplateService::new(db.clone())
            .create(
                &assigner,
                CreateTemplateRequest {
                    name: "Sample Approval".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let project = ProjectService::new(db.clone())
            .create(
                &assigner,
                CreateProjectRequest {
                    name: "Lamp".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        Fixture {
            service: TaskService::new(db, Arc::new(LogMailer)),
            stage_id: project.stages[0].stage.id,
            assigner,
            assignee,
        }
    }

    async fn create(f: &Fixture) -> TaskView {
        f.service
            .create(
                &f.assigner,
                f.stage_id,
                CreateTaskRequest {
                    assigned_to: f.assignee.id(),
                    description: "Check stitching".into(),
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn revision_round_trip() {
        let f = fixture().await;
        let task = create(&f).await;
        assert_eq!(task.task.status, TaskStatus::Pending);
        assert_eq!(task.assigned_to_user.id, f.assignee.id());

        let err = f
            .service
            .request_revision(&f.assignee, task.task.id, RevisionRequest { revision_note: None })
            .await
            .unwrap_err();
        assert!(err.fields().unwrap().contains_key("revisionNote"));

        let revised = f
            .service
            .request_revision(
                &f.assignee,
                task.task.id,
                RevisionRequest {
                    revision_note: Some("Which seam?".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(revised.task.status, TaskStatus::NeedsRevision);

        let answered = f
            .service
            .update(
                &f.assigner,
                task.task.id,
                UpdateTaskRequest {
                    revision_response: Some("The shoulder seam".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(answered.task.status, TaskStatus::Pending);
        assert_eq!(answered.task.revision_response.as_deref(), Some("The shoulder seam"));
    }

    #[tokio::test]
    async fn only_assignee_completes() {
        let f = fixture().await;
        let task = create(&f).await;

        let err = f.service.complete(&f.assigner, task.task.id).await.unwrap_err();
        assert_eq!(err.kind().http_status_code(), 403);

        let done = f.service.complete(&f.assignee, task.task.id).await.unwrap();
        assert!(done.task.completed);
        assert_eq!(done.task.status, TaskStatus::Completed);
        assert!(done.task.completed_at.is_some());
    }

    #[tokio::test]
    async fn completed_tasks_cannot_be_deleted() {
        let f = fixture().await;
        let open = create(&f).await;
        let done = create(&f).await;
        f.service.complete(&f.assignee, done.task.id).await.unwrap();

        let err = f.service.delete(&f.assignee, open.task.id).await.unwrap_err();
        assert_eq!(err.kind().http_status_code(), 403);

        let err = f.service.delete(&f.assigner, done.task.id).await.unwrap_err();
        assert_eq!(err.kind().http_status_code(), 409);

        f.service.delete(&f.assigner, open.task.id).await.unwrap();
    }
}
