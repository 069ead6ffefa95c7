use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use crate::database::entities::stages;
use crate::errors::CoreResult;
use crate::server::app::AppState;
use crate::server::error::ApiJson;
use crate::server::extract::CompanyUser;
use crate::services::project_service::{
    CreateProjectRequest, ProjectDetail, ProjectSummary, UpdateProjectRequest,
};
use crate::services::stage_service::AddStagesRequest;
use crate::services::{ProjectService, StageService};

#[utoipa::path(
    get,
    path = "/api/v1/projects",
    responses((status = 200, description = "Projects with per-stage status and cover image"))
)]
pub async fn list_projects(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
) -> CoreResult<Json<Vec<ProjectSummary>>> {
    let projects = ProjectService::new(state.db.clone())
        .list_with_stage_status(&actor)
        .await?;
    Ok(Json(projects))
}

#[utoipa::path(
    post,
    path = "/api/v1/projects",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created with stages from the active templates"),
        (status = 400, description = "Invalid project data")
    )
)]
pub async fn create_project(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
    ApiJson(payload): ApiJson<CreateProjectRequest>,
) -> CoreResult<(StatusCode, Json<ProjectDetail>)> {
    let project = ProjectService::new(state.db.clone()).create(&actor, payload).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/{id}",
    params(("id" = i32, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project with stages, files, comments and tasks"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn get_project(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
    Path(id): Path<i32>,
) -> CoreResult<Json<ProjectDetail>> {
    Ok(Json(ProjectService::new(state.db.clone()).get_by_id(&actor, id).await?))
}

#[utoipa::path(
    patch,
    path = "/api/v1/projects/{id}",
    params(("id" = i32, Path, description = "Project id")),
    request_body = UpdateProjectRequest,
    responses(
        (status = 200, description = "Project updated"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn update_project(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
    Path(id): Path<i32>,
    ApiJson(payload): ApiJson<UpdateProjectRequest>,
) -> CoreResult<Json<ProjectDetail>> {
    let project = ProjectService::new(state.db.clone())
        .update(&actor, id, payload)
        .await?;
    Ok(Json(project))
}

#[utoipa::path(
    delete,
    path = "/api/v1/projects/{id}",
    params(("id" = i32, Path, description = "Project id")),
    responses(
        (status = 204, description = "Project deleted"),
        (status = 403, description = "Admins only"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn delete_project(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
    Path(id): Path<i32>,
) -> CoreResult<StatusCode> {
    ProjectService::new(state.db.clone()).delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/projects/{id}/add-stages",
    params(("id" = i32, Path, description = "Project id")),
    request_body = AddStagesRequest,
    responses(
        (status = 201, description = "Stages appended after the current last position"),
        (status = 400, description = "Every selected template already has a stage")
    )
)]
pub async fn add_stages(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
    Path(id): Path<i32>,
    ApiJson(payload): ApiJson<AddStagesRequest>,
) -> CoreResult<(StatusCode, Json<Vec<stages::Model>>)> {
    let created = StageService::new(state.db.clone())
        .add_stages(&actor, id, payload.template_ids)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    post,
    path = "/api/v1/projects/{id}/generate-stages",
    params(("id" = i32, Path, description = "Project id")),
    responses(
        (status = 200, description = "Stages created, empty when the project already had stages"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn generate_stages(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
    Path(id): Path<i32>,
) -> CoreResult<Json<Vec<stages::Model>>> {
    let created = StageService::new(state.db.clone())
        .generate_stages(&actor, id)
        .await?;
    Ok(Json(created))
}
