use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json},
};

use crate::database::entities::users;
use crate::errors::{CoreError, CoreResult};
use crate::server::app::AppState;
use crate::server::error::ApiJson;
use crate::server::extract::{session_id_from_headers, CurrentUser, SESSION_COOKIE};
use crate::services::auth_service::{LoginRequest, RegisterRequest};
use crate::services::AuthService;

fn session_cookie(state: &AppState, value: &str, max_age_secs: i64) -> CoreResult<HeaderValue> {
    let mut cookie = format!(
        "{}={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, value, max_age_secs
    );
    if state.config.secure_cookies {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
        .map_err(|e| CoreError::internal("Failed to build session cookie").with_source(e))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created"),
        (status = 400, description = "Invalid email or password"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> CoreResult<(StatusCode, Json<users::Model>)> {
    let user = AuthService::new(state.db.clone(), state.config.clone())
        .register(payload)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session opened, `sid` cookie set"),
        (status = 401, description = "Invalid email or password"),
        (status = 429, description = "Too many failed attempts")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> CoreResult<impl IntoResponse> {
    let session = AuthService::new(state.db.clone(), state.config.clone())
        .login(&state.login_limiter, payload)
        .await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        session_cookie(&state, &session.session_id, state.config.session_ttl_hours * 3600)?,
    );

    Ok((headers, Json(session)))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses(
        (status = 204, description = "Session closed"),
        (status = 401, description = "No session")
    )
)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> CoreResult<impl IntoResponse> {
    let session_id = session_id_from_headers(&headers)
        .ok_or_else(|| CoreError::unauthorized("Authentication required"))?;

    AuthService::new(state.db.clone(), state.config.clone())
        .logout(&session_id)
        .await?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::SET_COOKIE, session_cookie(&state, "", 0)?);
    Ok((StatusCode::NO_CONTENT, response_headers))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "The signed-in user"),
        (status = 401, description = "No valid session")
    )
)]
pub async fn me(CurrentUser(actor): CurrentUser) -> Json<users::Model> {
    Json(actor.user)
}
