use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use crate::errors::CoreResult;
use crate::server::app::AppState;
use crate::server::error::ApiJson;
use crate::server::extract::CompanyUser;
use crate::services::comment_service::{CommentView, CreateCommentRequest};
use crate::services::CommentService;

#[utoipa::path(
    get,
    path = "/api/v1/stages/{id}/comments",
    params(("id" = i32, Path, description = "Stage id")),
    responses(
        (status = 200, description = "Comments, oldest first"),
        (status = 404, description = "Stage not found")
    )
)]
pub async fn list_comments(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
    Path(id): Path<i32>,
) -> CoreResult<Json<Vec<CommentView>>> {
    let comments = CommentService::new(state.db.clone(), state.mailer.clone())
        .list(&actor, id)
        .await?;
    Ok(Json(comments))
}

#[utoipa::path(
    post,
    path = "/api/v1/stages/{id}/comments",
    params(("id" = i32, Path, description = "Stage id")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment posted, mentioned users notified"),
        (status = 400, description = "Empty or oversized content"),
        (status = 404, description = "Stage not found")
    )
)]
pub async fn add_comment(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
    Path(id): Path<i32>,
    ApiJson(payload): ApiJson<CreateCommentRequest>,
) -> CoreResult<(StatusCode, Json<CommentView>)> {
    let comment = CommentService::new(state.db.clone(), state.mailer.clone())
        .add(&actor, id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}
