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
use crate::services::history_service::StageHistory;
use crate::services::stage_service::{ConditionalRequest, DeadlineRequest, PatchStageRequest};
use crate::services::{HistoryService, StageService};

#[utoipa::path(
    patch,
    path = "/api/v1/stages/{id}",
    params(("id" = i32, Path, description = "Stage id")),
    request_body = PatchStageRequest,
    responses(
        (status = 200, description = "Stage updated, transitions recorded in the history"),
        (status = 400, description = "Payload does not match the template schema"),
        (status = 404, description = "Stage not found")
    )
)]
pub async fn patch_stage(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
    Path(id): Path<i32>,
    ApiJson(payload): ApiJson<PatchStageRequest>,
) -> CoreResult<Json<stages::Model>> {
    Ok(Json(StageService::new(state.db.clone()).patch(&actor, id, payload).await?))
}

#[utoipa::path(
    patch,
    path = "/api/v1/stages/{id}/deadline",
    params(("id" = i32, Path, description = "Stage id")),
    request_body = DeadlineRequest,
    responses(
        (status = 200, description = "Deadline changed and logged"),
        (status = 400, description = "Reason required when replacing a deadline"),
        (status = 404, description = "Stage not found")
    )
)]
pub async fn patch_deadline(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
    Path(id): Path<i32>,
    ApiJson(payload): ApiJson<DeadlineRequest>,
) -> CoreResult<Json<stages::Model>> {
    let stage = StageService::new(state.db.clone())
        .patch_deadline(&actor, id, payload)
        .await?;
    Ok(Json(stage))
}

#[utoipa::path(
    patch,
    path = "/api/v1/stages/{id}/conditional",
    params(("id" = i32, Path, description = "Stage id")),
    request_body = ConditionalRequest,
    responses(
        (status = 200, description = "Stage enabled (waiting) or disabled (skip)"),
        (status = 404, description = "Stage not found")
    )
)]
pub async fn toggle_conditional(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
    Path(id): Path<i32>,
    ApiJson(payload): ApiJson<ConditionalRequest>,
) -> CoreResult<Json<stages::Model>> {
    let stage = StageService::new(state.db.clone())
        .toggle_conditional(&actor, id, payload.enabled)
        .await?;
    Ok(Json(stage))
}

#[utoipa::path(
    delete,
    path = "/api/v1/stages/{id}",
    params(("id" = i32, Path, description = "Stage id")),
    responses(
        (status = 204, description = "Stage deleted"),
        (status = 403, description = "Only admins, the project creator or the responsible user"),
        (status = 404, description = "Stage not found")
    )
)]
pub async fn delete_stage(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
    Path(id): Path<i32>,
) -> CoreResult<StatusCode> {
    StageService::new(state.db.clone()).delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/stages/{id}/history",
    params(("id" = i32, Path, description = "Stage id")),
    responses(
        (status = 200, description = "Status and deadline transitions, newest first", body = StageHistory),
        (status = 404, description = "Stage not found")
    )
)]
pub async fn stage_history(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
    Path(id): Path<i32>,
) -> CoreResult<Json<StageHistory>> {
    Ok(Json(HistoryService::new(state.db.clone()).list_for_stage(&actor, id).await?))
}
