use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;

use crate::database::entities::{stage_templates, StageKind};
use crate::errors::{CoreError, CoreResult};
use crate::services::authorization::Actor;
use crate::services::validation::{patch_field, ValidationService};
use crate::stage_data::{
    validate_custom_field_defs, validate_key_list, CustomFieldDefs, KeyList, LocalizedNames,
};

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTemplateRequest {
    pub name: String,
    pub name_translations: Option<LocalizedNames>,
    /// Derived from the name when omitted
    pub kind: Option<StageKind>,
    pub position: Option<i32>,
    pub has_checklist: Option<bool>,
    pub checklist_items: Option<KeyList>,
    pub has_conditional_substages: Option<bool>,
    pub conditional_substages: Option<KeyList>,
    pub custom_fields: Option<CustomFieldDefs>,
}

/// Only fields present in the body are changed; `null` clears nullable ones
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTemplateRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "patch_field")]
    #[schema(value_type = Option<LocalizedNames>)]
    pub name_translations: Option<Option<LocalizedNames>>,
    pub kind: Option<StageKind>,
    pub position: Option<i32>,
    pub has_checklist: Option<bool>,
    #[serde(default, deserialize_with = "patch_field")]
    #[schema(value_type = Option<KeyList>)]
    pub checklist_items: Option<Option<KeyList>>,
    pub has_conditional_substages: Option<bool>,
    #[serde(default, deserialize_with = "patch_field")]
    #[schema(value_type = Option<KeyList>)]
    pub conditional_substages: Option<Option<KeyList>>,
    #[serde(default, deserialize_with = "patch_field")]
    #[schema(value_type = Option<CustomFieldDefs>)]
    pub custom_fields: Option<Option<CustomFieldDefs>>,
    pub is_active: Option<bool>,
}

#[derive(Clone)]
pub struct TemplateService {
    db: DatabaseConnection,
}

impl TemplateService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn list_active(&self, actor: &Actor) -> CoreResult<Vec<stage_templates::Model>> {
        let company_id = actor.company_id()?;
        active_templates(&self.db, company_id).await
    }

    pub async fn create(
        &self,
        actor: &Actor,
        request: CreateTemplateRequest,
    ) -> CoreResult<stage_templates::Model> {
        let company_id = actor.company_id()?;
        actor.require_admin()?;

        let name = ValidationService::validate_name("name", &request.name)?;
        if let Some(items) = &request.checklist_items {
            validate_key_list("checklistItems", items)?;
        }
        if let Some(substages) = &request.conditional_substages {
            validate_key_list("conditionalSubstages", substages)?;
        }
        if let Some(fields) = &request.custom_fields {
            validate_custom_field_defs(fields)?;
        }

        let position = match request.position {
            Some(position) => position,
            None => self.next_position(company_id).await?,
        };
        ensure_position_free(&self.db, company_id, position, None).await?;

        let has_items = |list: &Option<KeyList>| list.as_ref().map(|l| !l.0.is_empty()).unwrap_or(false);
        let now = Utc::now();
        let template = stage_templates::ActiveModel {
            company_id: Set(company_id),
            kind: Set(request.kind.unwrap_or_else(|| StageKind::from_name(&name))),
            name: Set(name),
            name_translations: Set(request.name_translations),
            position: Set(position),
            has_checklist: Set(request
                .has_checklist
                .unwrap_or_else(|| has_items(&request.checklist_items))),
            has_conditional_substages: Set(request
                .has_conditional_substages
                .unwrap_or_else(|| has_items(&request.conditional_substages))),
            checklist_items: Set(request.checklist_items),
            conditional_substages: Set(request.conditional_substages),
            custom_fields: Set(request.custom_fields),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        info!(
            "Created template {} '{}' at position {} for company {}",
            template.id, template.name, template.position, company_id
        );
        Ok(template)
    }

    pub async fn update(
        &self,
        actor: &Actor,
        template_id: i32,
        request: UpdateTemplateRequest,
    ) -> CoreResult<stage_templates::Model> {
        actor.require_admin()?;
        let template = self.load(actor, template_id).await?;
        let company_id = template.company_id;

        let mut active: stage_templates::ActiveModel = template.clone().into();

        if let Some(name) = &request.name {
            active.name = Set(ValidationService::validate_name("name", name)?);
        }
        if let Some(translations) = request.name_translations {
            active.name_translations = Set(translations);
        }
        if let Some(kind) = request.kind {
            active.kind = Set(kind);
        }
        if let Some(has_checklist) = request.has_checklist {
            active.has_checklist = Set(has_checklist);
        }
        if let Some(items) = request.checklist_items {
            if let Some(items) = &items {
                validate_key_list("checklistItems", items)?;
            }
            active.checklist_items = Set(items);
        }
        if let Some(flag) = request.has_conditional_substages {
            active.has_conditional_substages = Set(flag);
        }
        if let Some(substages) = request.conditional_substages {
            if let Some(substages) = &substages {
                validate_key_list("conditionalSubstages", substages)?;
            }
            active.conditional_substages = Set(substages);
        }
        if let Some(fields) = request.custom_fields {
            if let Some(fields) = &fields {
                validate_custom_field_defs(fields)?;
            }
            active.custom_fields = Set(fields);
        }

        let position = request.position.unwrap_or(template.position);
        let is_active = request.is_active.unwrap_or(template.is_active);
        if is_active && (position != template.position || !template.is_active) {
            ensure_position_free(&self.db, company_id, position, Some(template_id)).await?;
        }
        active.position = Set(position);
        active.is_active = Set(is_active);
        active.updated_at = Set(Utc::now());

        let updated = active.update(&self.db).await?;
        info!("Updated template {}", updated.id);
        Ok(updated)
    }

    /// Hide a template from future projects; existing stages keep their reference
    pub async fn deactivate(&self, actor: &Actor, template_id: i32) -> CoreResult<()> {
        actor.require_admin()?;
        let template = self.load(actor, template_id).await?;

        let mut active: stage_templates::ActiveModel = template.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now());
        active.update(&self.db).await?;

        info!("Deactivated template {}", template_id);
        Ok(())
    }

    async fn load(&self, actor: &Actor, template_id: i32) -> CoreResult<stage_templates::Model> {
        let template = stage_templates::Entity::find_by_id(template_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| CoreError::not_found("Template", template_id))?;
        actor.ensure_company("Template", template_id, template.company_id)?;
        Ok(template)
    }

    /// `count + 1`, bumped past the highest active position if that is taken
    async fn next_position(&self, company_id: i32) -> CoreResult<i32> {
        let count = stage_templates::Entity::find()
            .filter(stage_templates::Column::CompanyId.eq(company_id))
            .count(&self.db)
            .await? as i32;

        let max_active = active_templates(&self.db, company_id)
            .await?
            .iter()
            .map(|t| t.position)
            .max()
            .unwrap_or(0);

        Ok((count + 1).max(max_active + 1))
    }
}

/// Active templates of a company in pipeline order
pub async fn active_templates<C: ConnectionTrait>(
    db: &C,
    company_id: i32,
) -> CoreResult<Vec<stage_templates::Model>> {
    Ok(stage_templates::Entity::find()
        .filter(stage_templates::Column::CompanyId.eq(company_id))
        .filter(stage_templates::Column::IsActive.eq(true))
        .order_by_asc(stage_templates::Column::Position)
        .order_by_asc(stage_templates::Column::Id)
        .all(db)
        .await?)
}

async fn ensure_position_free<C: ConnectionTrait>(
    db: &C,
    company_id: i32,
    position: i32,
    except_id: Option<i32>,
) -> CoreResult<()> {
    let mut query = stage_templates::Entity::find()
        .filter(stage_templates::Column::CompanyId.eq(company_id))
        .filter(stage_templates::Column::IsActive.eq(true))
        .filter(stage_templates::Column::Position.eq(position));
    if let Some(id) = except_id {
        query = query.filter(stage_templates::Column::Id.ne(id));
    }

    if let Some(existing) = query.one(db).await? {
        return Err(CoreError::conflict(format!(
            "Position {} is already used by template '{}'",
            position, existing.name
        ))
        .with_fields(
            [("position".to_string(), "Position already in use".to_string())]
                .into_iter()
                .collect(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::seed_data::{default_catalog_len, seed_default_templates};
    use crate::database::test_utils::setup_test_db;
    use crate::services::test_support::{seed_company_with_admin, seed_member};

    #[tokio::test]
    async fn create_appends_after_seeded_catalog() {
        let db = setup_test_db().await;
        let (company, admin) = seed_company_with_admin(&db).await;
        seed_default_templates(&db, company.id).await.unwrap();
        let service = TemplateService::new(db.clone());

        let template = service
            .create(
                &admin,
                CreateTemplateRequest {
                    name: "  Packaging  ".into(),
                    checklist_items: Some(KeyList(vec!["dieline".into(), "print_proof".into()])),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(template.name, "Packaging");
        assert_eq!(template.position, default_catalog_len() as i32 + 1);
        assert!(template.has_checklist);
        assert_eq!(template.kind, StageKind::Generic);
    }

    #[tokio::test]
    async fn duplicate_active_position_conflicts() {
        let db = setup_test_db().await;
        let (company, admin) = seed_company_with_admin(&db).await;
        seed_default_templates(&db, company.id).await.unwrap();
        let service = TemplateService::new(db.clone());

        let err = service
            .create(
                &admin,
                CreateTemplateRequest {
                    name: "Second render".into(),
                    position: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind().http_status_code(), 409);
    }

    #[tokio::test]
    async fn update_only_touches_present_fields() {
        let db = setup_test_db().await;
        let (_, admin) = seed_company_with_admin(&db).await;
        let service = TemplateService::new(db.clone());
        let template = service
            .create(
                &admin,
                CreateTemplateRequest {
                    name: "Render".into(),
                    checklist_items: Some(KeyList(vec!["front".into()])),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(template.kind, StageKind::Render);

        let request: UpdateTemplateRequest =
            serde_json::from_str(r#"{"name":"Render v2","customFields":null}"#).unwrap();
        let updated = service.update(&admin, template.id, request).await.unwrap();

        assert_eq!(updated.name, "Render v2");
        assert_eq!(updated.kind, StageKind::Render);
        assert_eq!(updated.checklist_items, template.checklist_items);
        assert_eq!(updated.position, template.position);
    }

    #[tokio::test]
    async fn members_cannot_edit_templates() {
        let db = setup_test_db().await;
        let (company, admin) = seed_company_with_admin(&db).await;
        let member = seed_member(&db, company.id, "m@example.com").await;
        let service = TemplateService::new(db.clone());
        let template = service
            .create(
                &admin,
                CreateTemplateRequest {
                    name: "Audit".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = service
            .update(&member, template.id, UpdateTemplateRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind().http_status_code(), 403);
    }

    #[tokio::test]
    async fn deactivated_templates_leave_the_active_list() {
        let db = setup_test_db().await;
        let (company, admin) = seed_company_with_admin(&db).await;
        seed_default_templates(&db, company.id).await.unwrap();
        let service = TemplateService::new(db.clone());

        let before = service.list_active(&admin).await.unwrap();
        service.deactivate(&admin, before[0].id).await.unwrap();
        let after = service.list_active(&admin).await.unwrap();

        assert_eq!(after.len(), before.len() - 1);
        assert!(after.iter().all(|t| t.id != before[0].id));
        assert!(after.windows(2).all(|w| w[0].position <= w[1].position));
    }
}
