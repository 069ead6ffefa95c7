use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::error;

use crate::errors::{CoreError, CoreErrorKind};

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.kind().http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if self.kind() == CoreErrorKind::Internal {
            error!("Internal error: {}", self);
            let body = json!({
                "error": self.kind().error_code(),
                "message": "Internal server error",
            });
            return (status, Json(body)).into_response();
        }

        let mut body = json!({
            "error": self.kind().error_code(),
            "message": self.message(),
        });
        if let Some(fields) = self.fields() {
            body["fields"] = json!(fields);
        }

        (status, Json(body)).into_response()
    }
}

/// JSON body extractor whose rejections use the API error shape
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = CoreError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> CoreError {
    CoreError::validation(format!("Invalid request body: {}", rejection.body_text()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_of(err: CoreError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn field_errors_are_reported() {
        let (status, body) = body_of(CoreError::invalid_field("reason", "Reason is required")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "VALIDATION_FAILED");
        assert_eq!(body["fields"]["reason"], "Reason is required");
    }

    #[tokio::test]
    async fn internal_errors_are_opaque() {
        let (status, body) = body_of(CoreError::internal("connection pool exhausted")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
        assert!(body.get("fields").is_none());
    }

    #[tokio::test]
    async fn missing_company_has_its_own_code() {
        let (status, body) = body_of(CoreError::no_company()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "NO_COMPANY");
    }
}
