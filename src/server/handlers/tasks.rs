use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use crate::errors::CoreResult;
use crate::server::app::AppState;
use crate::server::error::ApiJson;
use crate::server::extract::CompanyUser;
use crate::services::task_service::{
    CreateTaskRequest, RevisionRequest, TaskView, UpdateTaskRequest,
};
use crate::services::TaskService;

fn service(state: &AppState) -> TaskService {
    TaskService::new(state.db.clone(), state.mailer.clone())
}

#[utoipa::path(
    post,
    path = "/api/v1/stages/{id}/tasks",
    params(("id" = i32, Path, description = "Stage id")),
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task assigned"),
        (status = 400, description = "Assignee is not a company member"),
        (status = 404, description = "Stage not found")
    )
)]
pub async fn create_task(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
    Path(id): Path<i32>,
    ApiJson(payload): ApiJson<CreateTaskRequest>,
) -> CoreResult<(StatusCode, Json<TaskView>)> {
    let task = service(&state).create(&actor, id, payload).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/tasks/{id}",
    params(("id" = i32, Path, description = "Task id")),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Task updated"),
        (status = 403, description = "Only the assigner can edit"),
        (status = 404, description = "Task not found")
    )
)]
pub async fn update_task(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
    Path(id): Path<i32>,
    ApiJson(payload): ApiJson<UpdateTaskRequest>,
) -> CoreResult<Json<TaskView>> {
    Ok(Json(service(&state).update(&actor, id, payload).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/tasks/{id}/complete",
    params(("id" = i32, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task completed"),
        (status = 403, description = "Only the assignee can complete"),
        (status = 404, description = "Task not found")
    )
)]
pub async fn complete_task(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
    Path(id): Path<i32>,
) -> CoreResult<Json<TaskView>> {
    Ok(Json(service(&state).complete(&actor, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/tasks/{id}/revision",
    params(("id" = i32, Path, description = "Task id")),
    request_body = RevisionRequest,
    responses(
        (status = 200, description = "Revision requested"),
        (status = 400, description = "Revision note missing"),
        (status = 403, description = "Only the assignee can request a revision")
    )
)]
pub async fn request_revision(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
    Path(id): Path<i32>,
    ApiJson(payload): ApiJson<RevisionRequest>,
) -> CoreResult<Json<TaskView>> {
    Ok(Json(service(&state).request_revision(&actor, id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/tasks/{id}",
    params(("id" = i32, Path, description = "Task id")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 403, description = "Only the assigner can delete"),
        (status = 409, description = "Completed tasks are kept")
    )
)]
pub async fn delete_task(
    State(state): State<AppState>,
    CompanyUser(actor): CompanyUser,
    Path(id): Path<i32>,
) -> CoreResult<StatusCode> {
    service(&state).delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
