use crate::webhook::WebhookError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if let Some(e) = self.0.downcast_ref::<WebhookError>() {
            match e {
                WebhookError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
                WebhookError::MissingHeader(_) | WebhookError::ContentType => {
                    StatusCode::BAD_REQUEST
                }
                WebhookError::MissingSignature | WebhookError::InvalidSignature => {
                    StatusCode::FORBIDDEN
                }
            }
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
