use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::database::entities::stage_files;
use crate::errors::CoreResult;
use crate::server::app::AppState;
use crate::server::error::ApiJson;
use crate::server::extract::CompanyUser;
use crate::services::stage_file_service::{UpdateAccessRequest, UploadFileRequest};
use crate::services::StageFileService;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct FileListQuery {
    /// Only files attached to this checklist item
    pub checklist_item_key: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/stages/{id}/files",
    params(("id" = i32, Path, description = "Stage id"), FileListQuery),
    responses(
        (status = 200, description = "Files the caller is allowed to see"),
        (status = 404, description = "Stage not found")
    )
)]
pub async fn list_files(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
    Path(id): Path<i32>,
    Query(query): Query<FileListQuery>,
) -> CoreResult<Json<Vec<stage_files::Model>>> {
    let files = StageFileService::new(state.db.clone())
        .list_for_viewer(&actor, id, query.checklist_item_key)
        .await?;
    Ok(Json(files))
}

#[utoipa::path(
    post,
    path = "/api/v1/stages/{id}/files",
    params(("id" = i32, Path, description = "Stage id")),
    request_body = UploadFileRequest,
    responses(
        (status = 201, description = "Upload recorded"),
        (status = 400, description = "Extension not accepted by the stage or access list missing"),
        (status = 404, description = "Stage not found")
    )
)]
pub async fn upload_file(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
    Path(id): Path<i32>,
    ApiJson(payload): ApiJson<UploadFileRequest>,
) -> CoreResult<(StatusCode, Json<stage_files::Model>)> {
    let file = StageFileService::new(state.db.clone())
        .record_upload(&actor, id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(file)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/stage-files/{id}",
    params(("id" = i32, Path, description = "File id")),
    request_body = UpdateAccessRequest,
    responses(
        (status = 200, description = "Access list replaced"),
        (status = 403, description = "Caller may not change this file's access"),
        (status = 404, description = "File not found")
    )
)]
pub async fn update_access(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
    Path(id): Path<i32>,
    ApiJson(payload): ApiJson<UpdateAccessRequest>,
) -> CoreResult<Json<stage_files::Model>> {
    let file = StageFileService::new(state.db.clone())
        .update_access(&actor, id, payload)
        .await?;
    Ok(Json(file))
}

#[utoipa::path(
    delete,
    path = "/api/v1/stage-files/{id}",
    params(("id" = i32, Path, description = "File id")),
    responses(
        (status = 204, description = "File deleted"),
        (status = 403, description = "Only the uploader or an admin"),
        (status = 404, description = "File not found")
    )
)]
pub async fn delete_file(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
    Path(id): Path<i32>,
) -> CoreResult<StatusCode> {
    StageFileService::new(state.db.clone()).delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
