//! JSON error envelope returned by every endpoint.

use axum::{
    http::StatusCode,
    response::{ IntoResponse, Response },
    Json,
};
use serde::Serialize;

use crate::chat::ChatError;
use crate::prescription::PrescriptionError;

pub const MESSAGE_REQUIRED: &str = "Message is required";
pub const CHAT_FAILED: &str = "Failed to process chat";
pub const INPUT_REQUIRED: &str = "Provide an image, medicine name, or audio note";
pub const PROCESSING_FAILED: &str = "Processing failed";
pub const UNAUTHORIZED: &str = "Unauthorized";

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: &'static str,
    pub details: Option<String>,
}

impl ApiError {
    pub fn bad_request(error: &'static str) -> Self {
        Self { status: StatusCode::BAD_REQUEST, error, details: None }
    }

    pub fn unauthorized() -> Self {
        Self { status: StatusCode::UNAUTHORIZED, error: UNAUTHORIZED, details: None }
    }

    pub fn internal(error: &'static str, details: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error,
            details: Some(details.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody { error: self.error, details: self.details });
        (self.status, body).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyMessage => ApiError::bad_request(MESSAGE_REQUIRED),
            other => ApiError::internal(CHAT_FAILED, other.to_string()),
        }
    }
}

impl From<PrescriptionError> for ApiError {
    fn from(err: PrescriptionError) -> Self {
        match err {
            PrescriptionError::NoInput => ApiError::bad_request(INPUT_REQUIRED),
            other => ApiError::internal(PROCESSING_FAILED, other.to_string()),
        }
    }
}
