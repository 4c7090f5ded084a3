use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::archive::ReclassifyError;
use crate::workflows::intake::{StorageError, SubmissionDecodeError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Payload(serde_json::Error),
    Submission(SubmissionDecodeError),
    Storage(StorageError),
    Reclassify(ReclassifyError),
    Report(csv::Error),
    Worker(String),
    Aborted(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Payload(err) => write!(f, "invalid submission payload: {}", err),
            AppError::Submission(err) => write!(f, "invalid submission: {}", err),
            AppError::Storage(err) => write!(f, "storage error: {}", err),
            AppError::Reclassify(err) => write!(f, "reclassification error: {}", err),
            AppError::Report(err) => write!(f, "report error: {}", err),
            AppError::Worker(message) => write!(f, "background worker failed: {}", message),
            AppError::Aborted(message) => write!(f, "submission processing aborted: {}", message),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Payload(err) => Some(err),
            AppError::Submission(err) => Some(err),
            AppError::Storage(err) => Some(err),
            AppError::Reclassify(err) => Some(err),
            AppError::Report(err) => Some(err),
            AppError::Worker(_) | AppError::Aborted(_) => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Payload(_) | AppError::Submission(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Storage(StorageError::NotFound { .. }) => StatusCode::NOT_FOUND,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Storage(_)
            | AppError::Reclassify(_)
            | AppError::Report(_)
            | AppError::Worker(_)
            | AppError::Aborted(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Payload(value)
    }
}

impl From<SubmissionDecodeError> for AppError {
    fn from(value: SubmissionDecodeError) -> Self {
        Self::Submission(value)
    }
}

impl From<StorageError> for AppError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

impl From<ReclassifyError> for AppError {
    fn from(value: ReclassifyError) -> Self {
        Self::Reclassify(value)
    }
}

impl From<csv::Error> for AppError {
    fn from(value: csv::Error) -> Self {
        Self::Report(value)
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::Worker(value.to_string())
    }
}
