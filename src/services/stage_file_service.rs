//! Files attached to stages, optionally restricted to an allow-list of users.
//!
//! Every read path that hands files to a caller goes through
//! [`visible_files`] with that caller's id.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;

use crate::database::entities::{projects, stage_files, StageKind};
use crate::errors::{CoreError, CoreResult};
use crate::services::authorization::{company_members, load_stage, load_stage_file, Actor};
use crate::services::validation::ValidationService;
use crate::stage_data::UserIdList;

const DEFAULT_FILE_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileRequest {
    pub file_name: String,
    pub file_url: String,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub file_size: i64,
    pub checklist_item_key: Option<String>,
    pub allowed_user_ids: Option<UserIdList>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccessRequest {
    pub allowed_user_ids: Option<UserIdList>,
}

/// Files `viewer_id` may see, in their original order
pub fn visible_files(
    files: Vec<stage_files::Model>,
    viewer_id: Option<i32>,
) -> Vec<stage_files::Model> {
    files
        .into_iter()
        .filter(|file| file.is_visible_to(viewer_id))
        .collect()
}

fn check_extension(kind: StageKind, file_name: &str) -> CoreResult<()> {
    let extension = ValidationService::file_extension(file_name)
        .ok_or_else(|| CoreError::invalid_field("fileName", "File name needs an extension"))?;

    if let Some(allowed) = kind.allowed_extensions() {
        if !allowed.contains(&extension.as_str()) {
            return Err(CoreError::invalid_field(
                "fileName",
                format!(
                    "'.{}' files are not accepted on this stage (allowed: {})",
                    extension,
                    allowed.join(", ")
                ),
            ));
        }
    }
    Ok(())
}

fn require_access_list(kind: StageKind, list: &Option<UserIdList>) -> CoreResult<()> {
    let empty = list.as_ref().map(UserIdList::is_empty).unwrap_or(true);
    if kind.requires_access_list() && empty {
        return Err(CoreError::invalid_field(
            "allowedUserIds",
            "Choose at least one user who may see this file",
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct StageFileService {
    db: DatabaseConnection,
}

impl StageFileService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn record_upload(
        &self,
        actor: &Actor,
        stage_id: i32,
        request: UploadFileRequest,
    ) -> CoreResult<stage_files::Model> {
        let (stage, project) = load_stage(&self.db, actor, stage_id).await?;

        let file_name = request.file_name.trim().to_string();
        if file_name.is_empty() {
            return Err(CoreError::invalid_field("fileName", "File name cannot be empty"));
        }
        check_extension(stage.kind, &file_name)?;
        let file_url = ValidationService::normalize_file_url(&request.file_url)?;
        if request.file_size < 0 {
            return Err(CoreError::invalid_field("fileSize", "File size cannot be negative"));
        }

        let checklist_item_key = ValidationService::optional_text(request.checklist_item_key);
        if let Some(key) = &checklist_item_key {
            if !stage.checklist_keys().contains(key) {
                return Err(CoreError::invalid_field(
                    "checklistItemKey",
                    format!("Stage has no checklist item '{}'", key),
                ));
            }
        }

        let mut allowed = request.allowed_user_ids.filter(|list| !list.is_empty());
        require_access_list(stage.kind, &allowed)?;
        if let Some(list) = allowed.take() {
            company_members(&self.db, project.company_id, "allowedUserIds", &list.0).await?;
            let mut list = list.dedup();
            list.ensure(actor.id());
            if stage.kind == StageKind::Quotation {
                if let Some(responsible) = project.responsible_user_id {
                    list.ensure(responsible);
                }
            }
            allowed = Some(list);
        }

        let file_type = match request.file_type.trim() {
            "" => DEFAULT_FILE_TYPE.to_string(),
            other => other.to_string(),
        };

        let file = stage_files::ActiveModel {
            stage_id: Set(stage.id),
            checklist_item_key: Set(checklist_item_key),
            file_name: Set(file_name),
            file_url: Set(file_url),
            file_type: Set(file_type),
            file_size: Set(request.file_size),
            uploaded_by: Set(actor.id()),
            version: Set(1),
            is_latest: Set(true),
            allowed_user_ids: Set(allowed),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        info!(
            "User {} attached file {} '{}' to stage {}",
            actor.id(),
            file.id,
            file.file_name,
            stage.id
        );
        Ok(file)
    }

    /// Files of a stage the caller may see, optionally for one checklist item
    pub async fn list_for_viewer(
        &self,
        actor: &Actor,
        stage_id: i32,
        checklist_item_key: Option<String>,
    ) -> CoreResult<Vec<stage_files::Model>> {
        let (stage, _) = load_stage(&self.db, actor, stage_id).await?;

        let mut query = stage_files::Entity::find()
            .filter(stage_files::Column::StageId.eq(stage.id))
            .order_by_asc(stage_files::Column::Id);
        if let Some(key) = ValidationService::optional_text(checklist_item_key) {
            query = query.filter(stage_files::Column::ChecklistItemKey.eq(key));
        }

        Ok(visible_files(query.all(&self.db).await?, Some(actor.id())))
    }

    pub async fn update_access(
        &self,
        actor: &Actor,
        file_id: i32,
        request: UpdateAccessRequest,
    ) -> CoreResult<stage_files::Model> {
        let (file, stage, project) = load_stage_file(&self.db, actor, file_id).await?;

        if stage.kind == StageKind::Quotation {
            if project.responsible_user_id != Some(actor.id()) {
                return Err(CoreError::forbidden(
                    "Only the project's responsible user can change quotation access",
                ));
            }
        } else if file.uploaded_by != actor.id() && !actor.is_admin() {
            return Err(CoreError::forbidden(
                "Only the uploader or an admin can change file access",
            ));
        }

        let allowed = request.allowed_user_ids.filter(|list| !list.is_empty());
        require_access_list(stage.kind, &allowed)?;
        let allowed = match allowed {
            Some(list) => {
                company_members(&self.db, project.company_id, "allowedUserIds", &list.0).await?;
                let mut list = list.dedup();
                if stage.kind == StageKind::Quotation {
                    if let Some(responsible) = project.responsible_user_id {
                        list.ensure(responsible);
                    }
                }
                Some(list)
            }
            None => None,
        };

        let mut active: stage_files::ActiveModel = file.into();
        active.allowed_user_ids = Set(allowed);
        let updated = active.update(&self.db).await?;

        info!("User {} changed access of file {}", actor.id(), updated.id);
        Ok(updated)
    }

    pub async fn delete(&self, actor: &Actor, file_id: i32) -> CoreResult<()> {
        let (file, _, project) = load_stage_file(&self.db, actor, file_id).await?;

        if file.uploaded_by != actor.id() && !actor.is_admin() {
            return Err(CoreError::forbidden(
                "Only the uploader or an admin can delete this file",
            ));
        }

        let txn = self.db.begin().await?;
        if project.cover_image_id == Some(file.id) {
            let mut active: projects::ActiveModel = project.into();
            active.cover_image_id = Set(None);
            active.update(&txn).await?;
        }
        stage_files::Entity::delete_by_id(file.id).exec(&txn).await?;
        txn.commit().await?;

        info!("User {} deleted file {}", actor.id(), file_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::entities::stages;
    use crate::database::seed_data::seed_default_templates;
    use crate::database::test_utils::setup_test_db;
    use crate::services::project_service::{CreateProjectRequest, ProjectService};
    use crate::services::test_support::{seed_company_with_admin, seed_member};

    struct Fixture {
        service: StageFileService,
        admin: Actor,
        responsible: Actor,
        member: Actor,
        outsider: Actor,
        stages: Vec<stages::Model>,
    }

    impl Fixture {
        fn stage(&self, kind: StageKind) -> i32 {
            self.stages
                .iter()
                .find(|s| s.kind == kind)
                .map(|s| s.id)
                .expect("stage of kind")
        }
    }

    async fn fixture() -> Fixture {
        let db = setup_test_db().await;
        let (company, admin) = seed_company_with_admin(&db).await;
        seed_default_templates(&db, company.id).await.unwrap();
        let responsible = seed_member(&db, company.id, "lead@acme.test").await;
        let member = seed_member(&db, company.id, "member@acme.test").await;
        let outsider = seed_member(&db, company.id, "outsider@acme.test").await;

        let detail = ProjectService::new(db.clone())
            .create(
                &admin,
                CreateProjectRequest {
                    name: "Lamp".into(),
                    responsible_user_id: Some(responsible.id()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        Fixture {
            service: StageFileService::new(db),
            admin,
            responsible,
            member,
            outsider,
            stages: detail.stages.into_iter().map(|s| s.stage).collect(),
        }
    }

    fn upload(name: &str, allowed: Option<Vec<i32>>) -> UploadFileRequest {
        UploadFileRequest {
            file_name: name.into(),
            file_url: format!("https://storage.example.com/uploads/{}?token=abc", name),
            file_type: String::new(),
            file_size: 2048,
            checklist_item_key: None,
            allowed_user_ids: allowed.map(UserIdList),
        }
    }

    #[tokio::test]
    async fn render_stage_only_accepts_images() {
        let f = fixture().await;
        let render = f.stage(StageKind::Render);

        let err = f
            .service
            .record_upload(&f.member, render, upload("x.txt", None))
            .await
            .unwrap_err();
        assert_eq!(err.kind().http_status_code(), 400);

        let file = f
            .service
            .record_upload(&f.member, render, upload("x.png", None))
            .await
            .unwrap();
        assert_eq!(file.file_url, "/uploads/x.png");
        assert_eq!(file.file_type, DEFAULT_FILE_TYPE);
        assert_eq!(file.version, 1);
        assert!(file.is_latest);
    }

    #[tokio::test]
    async fn model_stage_only_accepts_cad_files() {
        let f = fixture().await;
        let model = f.stage(StageKind::Model3d);

        assert!(f
            .service
            .record_upload(&f.member, model, upload("x.stl", None))
            .await
            .is_ok());
        assert!(f
            .service
            .record_upload(&f.member, model, upload("x.png", None))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn access_controlled_stages_need_a_list() {
        let f = fixture().await;
        let proposal = f.stage(StageKind::FactoryProposal);

        let err = f
            .service
            .record_upload(&f.member, proposal, upload("offer.pdf", Some(vec![])))
            .await
            .unwrap_err();
        assert!(err.fields().unwrap().contains_key("allowedUserIds"));

        let file = f
            .service
            .record_upload(&f.member, proposal, upload("offer.pdf", Some(vec![f.admin.id()])))
            .await
            .unwrap();
        assert_eq!(
            file.allowed_user_ids.unwrap().0,
            vec![f.admin.id(), f.member.id()]
        );
    }

    #[tokio::test]
    async fn quotation_always_includes_responsible_user() {
        let f = fixture().await;
        let quotation = f.stage(StageKind::Quotation);

        let file = f
            .service
            .record_upload(&f.member, quotation, upload("quote.pdf", Some(vec![f.admin.id()])))
            .await
            .unwrap();
        let allowed = file.allowed_user_ids.clone().unwrap();
        assert!(allowed.contains(f.member.id()));
        assert!(allowed.contains(f.responsible.id()));

        let err = f
            .service
            .update_access(
                &f.member,
                file.id,
                UpdateAccessRequest {
                    allowed_user_ids: Some(UserIdList(vec![f.member.id()])),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind().http_status_code(), 403);

        let updated = f
            .service
            .update_access(
                &f.responsible,
                file.id,
                UpdateAccessRequest {
                    allowed_user_ids: Some(UserIdList(vec![f.admin.id()])),
                },
            )
            .await
            .unwrap();
        assert_eq!(
            updated.allowed_user_ids.unwrap().0,
            vec![f.admin.id(), f.responsible.id()]
        );
    }

    #[tokio::test]
    async fn restricted_files_are_filtered_per_viewer() {
        let f = fixture().await;
        let proposal = f.stage(StageKind::FactoryProposal);
        f.service
            .record_upload(&f.member, proposal, upload("offer.pdf", Some(vec![f.admin.id()])))
            .await
            .unwrap();

        let contract = f
            .stages
            .iter()
            .find(|s| s.name == "Contract")
            .map(|s| s.id)
            .unwrap();
        f.service
            .record_upload(&f.member, contract, upload("draft.pdf", None))
            .await
            .unwrap();

        assert_eq!(f.service.list_for_viewer(&f.admin, proposal, None).await.unwrap().len(), 1);
        assert_eq!(f.service.list_for_viewer(&f.member, proposal, None).await.unwrap().len(), 1);
        assert!(f
            .service
            .list_for_viewer(&f.outsider, proposal, None)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            f.service.list_for_viewer(&f.outsider, contract, None).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn checklist_item_files_are_listed_by_key() {
        let f = fixture().await;
        let proposal = f.stage(StageKind::FactoryProposal);
        let mut request = upload("shortlist.pdf", Some(vec![f.member.id()]));
        request.checklist_item_key = Some("factory_shortlist".into());
        f.service.record_upload(&f.member, proposal, request).await.unwrap();

        let mut bad = upload("other.pdf", Some(vec![f.member.id()]));
        bad.checklist_item_key = Some("nope".into());
        assert!(f.service.record_upload(&f.member, proposal, bad).await.is_err());

        let listed = f
            .service
            .list_for_viewer(&f.member, proposal, Some("factory_shortlist".into()))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert!(f
            .service
            .list_for_viewer(&f.member, proposal, Some("capability_check".into()))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn only_uploader_or_admin_deletes() {
        let f = fixture().await;
        let render = f.stage(StageKind::Render);
        let file = f
            .service
            .record_upload(&f.member, render, upload("x.png", None))
            .await
            .unwrap();

        let err = f.service.delete(&f.outsider, file.id).await.unwrap_err();
        assert_eq!(err.kind().http_status_code(), 403);
        f.service.delete(&f.admin, file.id).await.unwrap();
        assert!(f.service.list_for_viewer(&f.member, render, None).await.unwrap().is_empty());
    }

    #[test]
    fn generic_stages_accept_any_extension() {
        assert!(check_extension(StageKind::Generic, "notes.txt").is_ok());
        assert!(check_extension(StageKind::Generic, "notes").is_err());
        assert!(check_extension(StageKind::Render, "FRONT.JPG").is_ok());
    }
}
