use crate::api::ApiResponse;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("{resource} not found: {key}")]
    NotFound { resource: String, key: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Invalid schema: {message}")]
    InvalidSchema { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Storage operation {operation} failed on {target}: {cause}")]
    StorageFailure {
        operation: String,
        target: String,
        cause: String,
    },

    #[error("Content type lookup for {api_id} failed: {cause}")]
    LookupFailed { api_id: String, cause: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ContentError {
    pub fn content_type_not_found(key: impl Into<String>) -> Self {
        ContentError::NotFound {
            resource: "Content type".to_string(),
            key: key.into(),
        }
    }

    pub fn record_not_found(key: impl Into<String>) -> Self {
        ContentError::NotFound {
            resource: "Content".to_string(),
            key: key.into(),
        }
    }

    /// Physical table missing underneath a DML statement
    pub fn storage_missing(table: impl Into<String>) -> Self {
        ContentError::NotFound {
            resource: "Storage".to_string(),
            key: table.into(),
        }
    }

    pub fn is_storage_missing(&self) -> bool {
        matches!(self, ContentError::NotFound { resource, .. } if resource == "Storage")
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ContentError::Conflict {
            message: message.into(),
        }
    }

    pub fn invalid_schema(message: impl Into<String>) -> Self {
        ContentError::InvalidSchema {
            message: message.into(),
        }
    }

    pub fn storage(
        operation: impl Into<String>,
        target: impl Into<String>,
        cause: impl ToString,
    ) -> Self {
        ContentError::StorageFailure {
            operation: operation.into(),
            target: target.into(),
            cause: cause.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ContentError::NotFound { .. })
    }

    /// Stable machine-readable code placed in the envelope `error` slot.
    pub fn code(&self) -> &'static str {
        match self {
            ContentError::NotFound { .. } => "not_found",
            ContentError::Conflict { .. } => "conflict",
            ContentError::InvalidSchema { .. } => "invalid_schema",
            ContentError::InvalidRequest { .. } => "invalid_request",
            ContentError::StorageFailure { .. } => "storage_failure",
            ContentError::LookupFailed { .. } => "lookup_failed",
            ContentError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ContentError::NotFound { .. } => StatusCode::NOT_FOUND,
            ContentError::Conflict { .. } => StatusCode::CONFLICT,
            ContentError::InvalidSchema { .. } | ContentError::InvalidRequest { .. } => {
                StatusCode::BAD_REQUEST
            }
            ContentError::LookupFailed { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ContentError::StorageFailure { .. } | ContentError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to hand to callers. Storage and internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            ContentError::NotFound { resource, key } => format!("{} not found: {}", resource, key),
            ContentError::Conflict { message }
            | ContentError::InvalidSchema { message }
            | ContentError::InvalidRequest { message } => message.clone(),
            ContentError::LookupFailed { api_id, .. } => {
                format!("Content type service unavailable while resolving '{}'", api_id)
            }
            ContentError::StorageFailure { .. } => "Storage operation failed".to_string(),
            ContentError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ContentError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            ContentError::StorageFailure {
                operation,
                target,
                cause,
            } => {
                error!(
                    "Storage failure during {} on {}: {}",
                    operation, target, cause
                );
            }
            ContentError::LookupFailed { api_id, cause } => {
                error!("Content type lookup failed for {}: {}", api_id, cause);
            }
            ContentError::Internal(msg) => {
                error!("Internal error: {}", msg);
            }
            _ => {}
        }

        let body: ApiResponse<()> = ApiResponse::error(self.code(), self.public_message());
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ContentError>;
