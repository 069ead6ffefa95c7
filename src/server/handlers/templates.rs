use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use crate::database::entities::stage_templates;
use crate::errors::CoreResult;
use crate::server::app::AppState;
use crate::server::error::ApiJson;
use crate::server::extract::CompanyUser;
use crate::services::template_service::{CreateTemplateRequest, UpdateTemplateRequest};
use crate::services::TemplateService;

#[utoipa::path(
    get,
    path = "/api/v1/templates",
    responses((status = 200, description = "Active templates ordered by position"))
)]
pub async fn list_templates(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
) -> CoreResult<Json<Vec<stage_templates::Model>>> {
    let templates = TemplateService::new(state.db.clone()).list_active(&actor).await?;
    Ok(Json(templates))
}

#[utoipa::path(
    post,
    path = "/api/v1/templates",
    request_body = CreateTemplateRequest,
    responses(
        (status = 201, description = "Template created"),
        (status = 400, description = "Invalid schema"),
        (status = 403, description = "Admins only"),
        (status = 409, description = "Position already used")
    )
)]
pub async fn create_template(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
    ApiJson(payload): ApiJson<CreateTemplateRequest>,
) -> CoreResult<(StatusCode, Json<stage_templates::Model>)> {
    let template = TemplateService::new(state.db.clone()).create(&actor, payload).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/templates/{id}",
    params(("id" = i32, Path, description = "Template id")),
    request_body = UpdateTemplateRequest,
    responses(
        (status = 200, description = "Template updated"),
        (status = 404, description = "Template not found"),
        (status = 409, description = "Position already used")
    )
)]
pub async fn update_template(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
    Path(id): Path<i32>,
    ApiJson(payload): ApiJson<UpdateTemplateRequest>,
) -> CoreResult<Json<stage_templates::Model>> {
    let template = TemplateService::new(state.db.clone())
        .update(&actor, id, payload)
        .await?;
    Ok(Json(template))
}

#[utoipa::path(
    delete,
    path = "/api/v1/templates/{id}",
    params(("id" = i32, Path, description = "Template id")),
    responses(
        (status = 204, description = "Template deactivated"),
        (status = 404, description = "Template not found")
    )
)]
pub async fn delete_template(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
    Path(id): Path<i32>,
) -> CoreResult<StatusCode> {
    TemplateService::new(state.db.clone()).deactivate(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
