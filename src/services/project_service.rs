use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::database::entities::{
    factories, product_types, products, projects, stage_files, stage_templates, stages, StageKind,
    StageStatus, UserSummary,
};
use crate::errors::{CoreError, CoreResult};
use crate::services::authorization::{company_members, load_project, Actor};
use crate::services::comment_service::{comments_for_stages, CommentView};
use crate::services::history_service::user_summaries;
use crate::services::stage_file_service::visible_files;
use crate::services::stage_service::{dedupe_by_position, materialize_for_project, project_stages};
use crate::services::task_service::{tasks_for_stages, TaskView};
use crate::services::template_service::active_templates;
use crate::services::validation::{patch_field, ValidationService};

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub article: Option<String>,
    pub name: String,
    pub barcode: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
    pub responsible_user_id: Option<i32>,
    pub factory_id: Option<i32>,
    pub product_type_id: Option<i32>,
    #[schema(example = "2026-06-30")]
    pub deadline: Option<String>,
    #[serde(default)]
    pub products: Vec<ProductInput>,
    /// Active templates that should not become stages
    #[serde(default)]
    pub excluded_template_ids: Vec<i32>,
}

/// Absent fields are kept, `null` clears; `products` replaces the whole list
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "patch_field")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "patch_field")]
    #[schema(value_type = Option<i32>)]
    pub responsible_user_id: Option<Option<i32>>,
    #[serde(default, deserialize_with = "patch_field")]
    #[schema(value_type = Option<i32>)]
    pub factory_id: Option<Option<i32>>,
    #[serde(default, deserialize_with = "patch_field")]
    #[schema(value_type = Option<i32>)]
    pub product_type_id: Option<Option<i32>>,
    #[serde(default, deserialize_with = "patch_field")]
    #[schema(value_type = Option<String>)]
    pub deadline: Option<Option<String>>,
    #[serde(default, deserialize_with = "patch_field")]
    #[schema(value_type = Option<i32>)]
    pub cover_image_id: Option<Option<i32>>,
    pub products: Option<Vec<ProductInput>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageDetail {
    #[serde(flatten)]
    pub stage: stages::Model,
    pub template: Option<stage_templates::Model>,
    pub files: Vec<stage_files::Model>,
    pub comments: Vec<CommentView>,
    pub tasks: Vec<TaskView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: projects::Model,
    pub responsible_user: Option<UserSummary>,
    pub factory_name: Option<String>,
    pub product_type_name: Option<String>,
    pub products: Vec<products::Model>,
    pub stages: Vec<StageDetail>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StageStatusSummary {
    pub id: i32,
    pub template_id: Option<i32>,
    pub name: String,
    pub kind: StageKind,
    pub position: i32,
    pub status: StageStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    #[serde(flatten)]
    pub project: projects::Model,
    pub responsible_user_name: Option<String>,
    pub cover_image: Option<stage_files::Model>,
    pub stages: Vec<StageStatusSummary>,
}

/// Cover shown for a project in lists, as seen by `viewer_id`.
///
/// The explicit cover wins when the viewer may see it; otherwise the first
/// visible file of the first render stage.
pub fn resolve_cover(
    project: &projects::Model,
    stages: &[stages::Model],
    files_by_stage: &HashMap<i32, Vec<stage_files::Model>>,
    viewer_id: Option<i32>,
) -> Option<stage_files::Model> {
    let visible = |file: &&stage_files::Model| file.is_visible_to(viewer_id);

    if let Some(cover_id) = project.cover_image_id {
        let explicit = files_by_stage
            .values()
            .flatten()
            .filter(visible)
            .find(|file| file.id == cover_id);
        if let Some(file) = explicit {
            return Some(file.clone());
        }
    }

    let mut render_stages: Vec<_> = stages
        .iter()
        .filter(|stage| stage.kind == StageKind::Render)
        .collect();
    render_stages.sort_by_key(|stage| stage.position);

    render_stages.first().and_then(|stage| {
        files_by_stage
            .get(&stage.id)?
            .iter()
            .filter(visible)
            .min_by_key(|file| file.id)
            .cloned()
    })
}

fn clean_products(inputs: Vec<ProductInput>) -> Vec<ProductInput> {
    inputs
        .into_iter()
        .filter_map(|p| {
            let name = p.name.trim().to_string();
            (!name.is_empty()).then(|| ProductInput {
                name,
                article: ValidationService::optional_text(p.article),
                barcode: ValidationService::optional_text(p.barcode),
            })
        })
        .collect()
}

async fn insert_products<C: ConnectionTrait>(
    db: &C,
    project_id: i32,
    inputs: Vec<ProductInput>,
) -> CoreResult<usize> {
    let rows: Vec<products::ActiveModel> = clean_products(inputs)
        .into_iter()
        .map(|p| products::ActiveModel {
            project_id: Set(project_id),
            article: Set(p.article),
            name: Set(p.name),
            barcode: Set(p.barcode),
            created_at: Set(Utc::now()),
            ..Default::default()
        })
        .collect();

    let count = rows.len();
    if count > 0 {
        products::Entity::insert_many(rows).exec(db).await?;
    }
    Ok(count)
}

/// Delete every product of the project, then insert the given list
pub async fn replace_products<C: ConnectionTrait>(
    db: &C,
    project_id: i32,
    inputs: Vec<ProductInput>,
) -> CoreResult<usize> {
    products::Entity::delete_many()
        .filter(products::Column::ProjectId.eq(project_id))
        .exec(db)
        .await?;
    insert_products(db, project_id, inputs).await
}

#[derive(Clone)]
pub struct ProjectService {
    db: DatabaseConnection,
}

impl ProjectService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        actor: &Actor,
        request: CreateProjectRequest,
    ) -> CoreResult<ProjectDetail> {
        let company_id = actor.company_id()?;
        let name = ValidationService::validate_name("name", &request.name)?;
        let deadline =
            ValidationService::parse_optional_date("deadline", request.deadline.as_deref())?;
        self.check_references(
            company_id,
            request.responsible_user_id,
            request.factory_id,
            request.product_type_id,
        )
        .await?;

        let txn = self.db.begin().await?;
        let now = Utc::now();
        let project = projects::ActiveModel {
            company_id: Set(company_id),
            name: Set(name),
            description: Set(ValidationService::optional_text(request.description)),
            responsible_user_id: Set(request.responsible_user_id),
            factory_id: Set(request.factory_id),
            product_type_id: Set(request.product_type_id),
            deadline: Set(deadline),
            cover_image_id: Set(None),
            created_by: Set(actor.id()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let product_count = insert_products(&txn, project.id, request.products).await?;

        let templates: Vec<_> = active_templates(&txn, company_id)
            .await?
            .into_iter()
            .filter(|t| !request.excluded_template_ids.contains(&t.id))
            .collect();
        let stages = materialize_for_project(&txn, project.id, &dedupe_by_position(templates)).await?;
        txn.commit().await?;

        info!(
            "Created project {} '{}' with {} products and {} stages",
            project.id,
            project.name,
            product_count,
            stages.len()
        );
        self.get_by_id(actor, project.id).await
    }

    /// Full project view, with files filtered for the caller
    pub async fn get_by_id(&self, actor: &Actor, project_id: i32) -> CoreResult<ProjectDetail> {
        let project = load_project(&self.db, actor, project_id).await?;

        let responsible_user = match project.responsible_user_id {
            Some(id) => user_summaries(&self.db, [id]).await?.remove(&id),
            None => None,
        };
        let factory_name = match project.factory_id {
            Some(id) => factories::Entity::find_by_id(id)
                .one(&self.db)
                .await?
                .map(|f| f.name),
            None => None,
        };
        let product_type_name = match project.product_type_id {
            Some(id) => product_types::Entity::find_by_id(id)
                .one(&self.db)
                .await?
                .map(|p| p.name),
            None => None,
        };

        let products = products::Entity::find()
            .filter(products::Column::ProjectId.eq(project.id))
            .order_by_asc(products::Column::Id)
            .all(&self.db)
            .await?;

        let stages = project_stages(&self.db, project.id).await?;
        let stage_ids: Vec<i32> = stages.iter().map(|s| s.id).collect();

        let template_ids: Vec<i32> = stages.iter().filter_map(|s| s.template_id).collect();
        let templates: HashMap<i32, stage_templates::Model> = if template_ids.is_empty() {
            HashMap::new()
        } else {
            stage_templates::Entity::find()
                .filter(stage_templates::Column::Id.is_in(template_ids))
                .all(&self.db)
                .await?
                .into_iter()
                .map(|t| (t.id, t))
                .collect()
        };

        let mut files = self.files_by_stage(&stage_ids).await?;
        let mut comments = comments_for_stages(&self.db, &stage_ids).await?;
        let mut tasks = tasks_for_stages(&self.db, &stage_ids).await?;

        let stages = stages
            .into_iter()
            .map(|stage| StageDetail {
                template: stage.template_id.and_then(|id| templates.get(&id).cloned()),
                files: visible_files(files.remove(&stage.id).unwrap_or_default(), Some(actor.id())),
                comments: comments.remove(&stage.id).unwrap_or_default(),
                tasks: tasks.remove(&stage.id).unwrap_or_default(),
                stage,
            })
            .collect();

        debug!("Loaded project {} for user {}", project.id, actor.id());
        Ok(ProjectDetail {
            project,
            responsible_user,
            factory_name,
            product_type_name,
            products,
            stages,
        })
    }

    /// Company projects, newest first, with a flat stage status list
    pub async fn list_with_stage_status(&self, actor: &Actor) -> CoreResult<Vec<ProjectSummary>> {
        let company_id = actor.company_id()?;

        let projects = projects::Entity::find()
            .filter(projects::Column::CompanyId.eq(company_id))
            .order_by_desc(projects::Column::CreatedAt)
            .order_by_desc(projects::Column::Id)
            .all(&self.db)
            .await?;
        if projects.is_empty() {
            return Ok(Vec::new());
        }

        let project_ids: Vec<i32> = projects.iter().map(|p| p.id).collect();
        let mut stages_by_project: BTreeMap<i32, Vec<stages::Model>> = BTreeMap::new();
        for stage in stages::Entity::find()
            .filter(stages::Column::ProjectId.is_in(project_ids))
            .order_by_asc(stages::Column::Position)
            .all(&self.db)
            .await?
        {
            stages_by_project.entry(stage.project_id).or_default().push(stage);
        }

        let all_stage_ids: Vec<i32> = stages_by_project
            .values()
            .flatten()
            .map(|s| s.id)
            .collect();
        let files = self.files_by_stage(&all_stage_ids).await?;

        let names = user_summaries(
            &self.db,
            projects.iter().filter_map(|p| p.responsible_user_id),
        )
        .await?;

        Ok(projects
            .into_iter()
            .map(|project| {
                let stages = stages_by_project.remove(&project.id).unwrap_or_default();
                ProjectSummary {
                    cover_image: resolve_cover(&project, &stages, &files, Some(actor.id())),
                    responsible_user_name: project
                        .responsible_user_id
                        .and_then(|id| names.get(&id))
                        .map(|u| u.name.clone()),
                    stages: stages
                        .into_iter()
                        .map(|s| StageStatusSummary {
                            id: s.id,
                            template_id: s.template_id,
                            name: s.name,
                            kind: s.kind,
                            position: s.position,
                            status: s.status,
                        })
                        .collect(),
                    project,
                }
            })
            .collect())
    }

    pub async fn update(
        &self,
        actor: &Actor,
        project_id: i32,
        request: UpdateProjectRequest,
    ) -> CoreResult<ProjectDetail> {
        let project = load_project(&self.db, actor, project_id).await?;
        let company_id = project.company_id;

        self.check_references(
            company_id,
            request.responsible_user_id.flatten(),
            request.factory_id.flatten(),
            request.product_type_id.flatten(),
        )
        .await?;

        let mut active: projects::ActiveModel = project.clone().into();
        if let Some(name) = &request.name {
            active.name = Set(ValidationService::validate_name("name", name)?);
        }
        if let Some(description) = request.description {
            active.description = Set(ValidationService::optional_text(description));
        }
        if let Some(user_id) = request.responsible_user_id {
            active.responsible_user_id = Set(user_id);
        }
        if let Some(factory_id) = request.factory_id {
            active.factory_id = Set(factory_id);
        }
        if let Some(product_type_id) = request.product_type_id {
            active.product_type_id = Set(product_type_id);
        }
        if let Some(deadline) = request.deadline {
            active.deadline = Set(ValidationService::parse_optional_date(
                "deadline",
                deadline.as_deref(),
            )?);
        }
        if let Some(cover_id) = request.cover_image_id {
            if let Some(file_id) = cover_id {
                self.check_cover(project.id, file_id).await?;
            }
            active.cover_image_id = Set(cover_id);
        }
        active.updated_at = Set(Utc::now());

        let txn = self.db.begin().await?;
        active.update(&txn).await?;
        if let Some(products) = request.products {
            let count = replace_products(&txn, project.id, products).await?;
            debug!("Replaced products of project {} ({} rows)", project.id, count);
        }
        txn.commit().await?;

        info!("Updated project {} by user {}", project.id, actor.id());
        self.get_by_id(actor, project.id).await
    }

    /// Admins only; superadmins may delete across companies
    pub async fn delete(&self, actor: &Actor, project_id: i32) -> CoreResult<()> {
        let project = load_project(&self.db, actor, project_id).await?;
        actor.require_admin()?;

        projects::Entity::delete_by_id(project.id)
            .exec(&self.db)
            .await?;

        info!("Deleted project {} by user {}", project.id, actor.id());
        Ok(())
    }

    async fn check_references(
        &self,
        company_id: i32,
        responsible_user_id: Option<i32>,
        factory_id: Option<i32>,
        product_type_id: Option<i32>,
    ) -> CoreResult<()> {
        if let Some(user_id) = responsible_user_id {
            company_members(&self.db, company_id, "responsibleUserId", &[user_id]).await?;
        }

        if let Some(id) = factory_id {
            let found = factories::Entity::find_by_id(id)
                .filter(factories::Column::CompanyId.eq(company_id))
                .one(&self.db)
                .await?;
            if found.is_none() {
                return Err(CoreError::invalid_field("factoryId", "Unknown factory"));
            }
        }

        if let Some(id) = product_type_id {
            let found = product_types::Entity::find_by_id(id)
                .filter(product_types::Column::CompanyId.eq(company_id))
                .one(&self.db)
                .await?;
            if found.is_none() {
                return Err(CoreError::invalid_field("productTypeId", "Unknown product type"));
            }
        }

        Ok(())
    }

    async fn check_cover(&self, project_id: i32, file_id: i32) -> CoreResult<()> {
        let file = stage_files::Entity::find_by_id(file_id)
            .find_also_related(stages::Entity)
            .one(&self.db)
            .await?;
        match file {
            Some((_, Some(stage))) if stage.project_id == project_id => Ok(()),
            _ => Err(CoreError::invalid_field(
                "coverImageId",
                "Cover image must be a file of this project",
            )),
        }
    }

    async fn files_by_stage(
        &self,
        stage_ids: &[i32],
    ) -> CoreResult<HashMap<i32, Vec<stage_files::Model>>> {
        let mut grouped: HashMap<i32, Vec<stage_files::Model>> = HashMap::new();
        if stage_ids.is_empty() {
            return Ok(grouped);
        }
        for file in stage_files::Entity::find()
            .filter(stage_files::Column::StageId.is_in(stage_ids.iter().copied()))
            .order_by_asc(stage_files::Column::Id)
            .all(&self.db)
            .await?
        {
            grouped.entry(file.stage_id).or_default().push(file);
        }
        Ok(grouped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::entities::UserRole;
    use crate::database::seed_data::{default_catalog_len, seed_default_templates};
    use crate::database::test_utils::setup_test_db;
    use crate::services::test_support::{seed_company, seed_company_with_admin, seed_member, seed_user};
    use crate::stage_data::UserIdList;

    fn file(id: i32, stage_id: i32, allowed: Option<Vec<i32>>) -> stage_files::Model {
        stage_files::Model {
            id,
            stage_id,
            checklist_item_key: None,
            file_name: format!("f{}.png", id),
            file_url: format!("/files/f{}.png", id),
            file_type: "image/png".into(),
            file_size: 1,
            uploaded_by: 1,
            version: 1,
            is_latest: true,
            allowed_user_ids: allowed.map(UserIdList),
            created_at: Utc::now(),
        }
    }

    fn stage(id: i32, kind: StageKind, position: i32) -> stages::Model {
        let now = Utc::now();
        stages::Model {
            id,
            project_id: 1,
            template_id: None,
            name: "S".into(),
            kind,
            position,
            status: StageStatus::Waiting,
            start_date: None,
            deadline: None,
            checklist_data: None,
            checklist_input_data: None,
            conditional_enabled: true,
            conditional_substages_data: None,
            custom_fields_data: None,
            distribution_data: None,
            product_quantities_data: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn project(cover: Option<i32>) -> projects::Model {
        let now = Utc::now();
        projects::Model {
            id: 1,
            company_id: 1,
            name: "P".into(),
            description: None,
            responsible_user_id: None,
            factory_id: None,
            product_type_id: None,
            deadline: None,
            cover_image_id: cover,
            created_by: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn cover_falls_back_to_first_visible_render_file() {
        let stages = vec![stage(10, StageKind::Generic, 2), stage(11, StageKind::Render, 1)];
        let files = HashMap::from([
            (10, vec![file(1, 10, None)]),
            (11, vec![file(2, 11, Some(vec![99])), file(3, 11, None)]),
        ]);

        let cover = resolve_cover(&project(None), &stages, &files, Some(5)).unwrap();
        assert_eq!(cover.id, 3);

        let cover = resolve_cover(&project(None), &stages, &files, Some(99)).unwrap();
        assert_eq!(cover.id, 2);
    }

    #[test]
    fn hidden_explicit_cover_is_not_leaked() {
        let stages = vec![stage(11, StageKind::Render, 1)];
        let files = HashMap::from([(11, vec![file(2, 11, Some(vec![99])), file(3, 11, None)])]);

        let cover = resolve_cover(&project(Some(2)), &stages, &files, Some(99)).unwrap();
        assert_eq!(cover.id, 2);

        let cover = resolve_cover(&project(Some(2)), &stages, &files, Some(5)).unwrap();
        assert_eq!(cover.id, 3);

        let cover = resolve_cover(&project(Some(2)), &stages, &files, None).unwrap();
        assert_eq!(cover.id, 3);
    }

    #[tokio::test]
    async fn create_skips_blank_products_and_excluded_templates() {
        let db = setup_test_db().await;
        let (company, admin) = seed_company_with_admin(&db).await;
        seed_default_templates(&db, company.id).await.unwrap();
        let templates = active_templates(&db, company.id).await.unwrap();
        let service = ProjectService::new(db.clone());

        let detail = service
            .create(
                &admin,
                CreateProjectRequest {
                    name: "Floor lamp".into(),
                    products: vec![
                        ProductInput {
                            name: " Lamp ".into(),
                            article: Some("FL-1".into()),
                            barcode: Some("  ".into()),
                        },
                        ProductInput {
                            name: "   ".into(),
                            ..Default::default()
                        },
                    ],
                    excluded_template_ids: vec![templates[1].id],
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(detail.products.len(), 1);
        assert_eq!(detail.products[0].name, "Lamp");
        assert_eq!(detail.products[0].barcode, None);
        assert_eq!(detail.stages.len(), default_catalog_len() - 1);
        assert!(detail
            .stages
            .iter()
            .all(|s| s.stage.template_id != Some(templates[1].id)));
        assert_eq!(detail.stages[0].stage.name, "Render");
        assert_eq!(detail.stages[0].stage.status, StageStatus::Waiting);
        assert!(detail.stages[0].stage.checklist_data.is_none());
        assert!(detail.stages[0].template.is_some());
    }

    #[tokio::test]
    async fn update_replaces_products_wholesale() {
        let db = setup_test_db().await;
        let (_, admin) = seed_company_with_admin(&db).await;
        let service = ProjectService::new(db.clone());
        let detail = service
            .create(
                &admin,
                CreateProjectRequest {
                    name: "Chair".into(),
                    products: vec![
                        ProductInput {
                            name: "Oak".into(),
                            ..Default::default()
                        },
                        ProductInput {
                            name: "Walnut".into(),
                            ..Default::default()
                        },
                    ],
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let updated = service
            .update(
                &admin,
                detail.project.id,
                UpdateProjectRequest {
                    description: Some(Some("Dining chair".into())),
                    products: Some(vec![ProductInput {
                        name: "Ash".into(),
                        ..Default::default()
                    }]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.project.name, "Chair");
        assert_eq!(updated.project.description.as_deref(), Some("Dining chair"));
        assert_eq!(
            updated.products.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            vec!["Ash"]
        );
    }

    #[tokio::test]
    async fn responsible_user_must_belong_to_company() {
        let db = setup_test_db().await;
        let (_, admin) = seed_company_with_admin(&db).await;
        let other = seed_company(&db, "Other").await;
        let stranger = seed_member(&db, other.id, "s@other.test").await;

        let err = ProjectService::new(db.clone())
            .create(
                &admin,
                CreateProjectRequest {
                    name: "Chair".into(),
                    responsible_user_id: Some(stranger.id()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.fields().unwrap().contains_key("responsibleUserId"));
    }

    #[tokio::test]
    async fn delete_is_admin_only_within_company() {
        let db = setup_test_db().await;
        let (company, admin) = seed_company_with_admin(&db).await;
        let member = seed_member(&db, company.id, "m@acme.test").await;
        let other = seed_company(&db, "Other").await;
        let other_admin = seed_user(&db, Some(other.id), "a@other.test", UserRole::Admin).await;
        let service = ProjectService::new(db.clone());

        let project = service
            .create(
                &member,
                CreateProjectRequest {
                    name: "Table".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .project;

        let err = service.delete(&member, project.id).await.unwrap_err();
        assert_eq!(err.kind().http_status_code(), 403);

        let err = service.delete(&other_admin, project.id).await.unwrap_err();
        assert_eq!(err.kind().http_status_code(), 404);

        service.delete(&admin, project.id).await.unwrap();
        assert!(service.get_by_id(&admin, project.id).await.is_err());
    }

    #[tokio::test]
    async fn superadmin_deletes_across_companies() {
        let db = setup_test_db().await;
        let (_, admin) = seed_company_with_admin(&db).await;
        let root = seed_user(&db, None, "root@platform.test", UserRole::Superadmin).await;
        let service = ProjectService::new(db.clone());
        let project = service
            .create(
                &admin,
                CreateProjectRequest {
                    name: "Shelf".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .project;

        service.delete(&root, project.id).await.unwrap();
    }

    #[tokio::test]
    async fn list_reports_stage_statuses() {
        let db = setup_test_db().await;
        let (company, admin) = seed_company_with_admin(&db).await;
        seed_default_templates(&db, company.id).await.unwrap();
        let service = ProjectService::new(db.clone());
        service
            .create(
                &admin,
                CreateProjectRequest {
                    name: "Lamp".into(),
                    responsible_user_id: Some(admin.id()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let list = service.list_with_stage_status(&admin).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].stages.len(), default_catalog_len());
        assert!(list[0].stages.iter().all(|s| s.status == StageStatus::Waiting));
        assert_eq!(list[0].responsible_user_name.as_deref(), Some("admin@acme.test"));
        assert!(list[0].cover_image.is_none());
    }
}
