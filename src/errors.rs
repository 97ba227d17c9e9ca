use axum::{http::StatusCode, Json};
use serde_json::json;
use thiserror::Error;

/// Failures of the routine operations, independent of transport.
#[derive(Debug, Error, PartialEq)]
pub enum RoutineError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden")]
    Forbidden,
    #[error("Template not found")]
    TemplateNotFound,
    #[error("Calendar day not found")]
    DayNotFound,
    #[error("Instance not found")]
    InstanceNotFound,
    #[error("{0}")]
    Validation(String),
    #[error("No active template")]
    NoActiveTemplate,
    #[error("No template for this day")]
    NoTemplateForDay,
}

impl RoutineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(err: impl std::error::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<RoutineError> for AppError {
    fn from(err: RoutineError) -> Self {
        let status = match err {
            RoutineError::Unauthorized => StatusCode::UNAUTHORIZED,
            RoutineError::Forbidden => StatusCode::FORBIDDEN,
            RoutineError::TemplateNotFound
            | RoutineError::DayNotFound
            | RoutineError::InstanceNotFound
            | RoutineError::NoActiveTemplate => StatusCode::NOT_FOUND,
            RoutineError::Validation(_) | RoutineError::NoTemplateForDay => {
                StatusCode::BAD_REQUEST
            }
        };

        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(err)
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
