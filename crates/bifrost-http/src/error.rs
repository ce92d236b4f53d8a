use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use uuid::Uuid;

/// The wire error shape: `{event_id, type, is_bifrost_error, status_code,
/// error: {type, code, message, param?, event_id}}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponseBody {
    pub event_id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub is_bifrost_error: bool,
    pub status_code: u16,
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub kind: String,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    pub event_id: String,
}

/// Wraps a [`bifrost_core::Error`] (or a transport-level rejection) for
/// `IntoResponse`, pairing an HTTP status with a structured error body.
pub struct ApiError {
    status: StatusCode,
    kind: String,
    code: String,
    message: String,
}

impl ApiError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "invalid_request".to_string(),
            code: "invalid_request".to_string(),
            message: message.into(),
        }
    }
}

impl From<bifrost_core::Error> for ApiError {
    fn from(err: bifrost_core::Error) -> Self {
        let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self {
            status,
            kind: err.kind().to_string(),
            code: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let event_id = Uuid::new_v4().to_string();
        let body = ErrorResponseBody {
            event_id: event_id.clone(),
            kind: "error",
            is_bifrost_error: true,
            status_code: self.status.as_u16(),
            error: ErrorDetail {
                kind: self.kind,
                code: self.code,
                message: self.message,
                param: None,
                event_id,
            },
        };
        (self.status, Json(body)).into_response()
    }
}
