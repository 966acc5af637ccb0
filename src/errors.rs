// src/errors.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::daraja_service::DarajaError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("MongoDB error: {0}")]
    MongoDB(#[from] mongodb::error::Error),

    #[error("BSON serialization error: {0}")]
    BsonSerialization(#[from] mongodb::bson::ser::Error),

    #[error("BSON deserialization error: {0}")]
    BsonDeserialization(#[from] mongodb::bson::de::Error),

    #[error("Invalid ObjectId: {0}")]
    InvalidObjectId(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Duplicate key error: {0}")]
    DuplicateKey(String),

    #[error("Unauthorized access")]
    Unauthorized,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Daraja error: {0}")]
    Daraja(#[from] DarajaError),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Export failed: {0}")]
    Export(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::MongoDB(e) => {
                tracing::error!("MongoDB error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
            }
            AppError::BsonSerialization(_) | AppError::BsonDeserialization(_) => {
                tracing::error!("{}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
            }
            AppError::StorageUnavailable(_) => {
                tracing::error!("{}", self);
                (StatusCode::SERVICE_UNAVAILABLE, "Storage unavailable")
            }
            AppError::InvalidObjectId(_) => (StatusCode::BAD_REQUEST, "Invalid ID format"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "Not found"),
            AppError::DuplicateKey(_) => (StatusCode::CONFLICT, "Duplicate entry"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized access"),
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "Validation failed"),
            AppError::Daraja(DarajaError::Config(_)) => {
                (StatusCode::BAD_REQUEST, "Invalid callback configuration")
            }
            AppError::Daraja(DarajaError::Transport(_)) => {
                (StatusCode::BAD_GATEWAY, "M-Pesa error")
            }
            AppError::Export(_) => {
                tracing::error!("{}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, "Export failed")
            }
            AppError::ConfigurationError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Configuration error")
            }
        };

        let body = Json(json!({
            "error": error_message,
            "message": self.to_string(),
            "success": false,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

impl From<mongodb::bson::oid::Error> for AppError {
    fn from(err: mongodb::bson::oid::Error) -> Self {
        AppError::InvalidObjectId(err.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Export(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

impl AppError {
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        AppError::ValidationError(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        AppError::ConfigurationError(msg.into())
    }

    /// True when MongoDB rejected a write because of a unique index.
    pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
        use mongodb::error::{ErrorKind, WriteFailure};

        match err.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == 11000,
            ErrorKind::Command(e) => e.code == 11000,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
