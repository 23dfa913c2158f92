//! HTTP surface
//!
//! - GET    /health
//! - POST   /content-types
//! - GET    /content-types
//! - GET    /content-types/:id
//! - GET    /content-types/api-id/:apiId
//! - PUT    /content-types/:id
//! - DELETE /content-types/:id
//! - GET    /content-types/:id/changes
//! - POST   /content/:apiId
//! - GET    /content/:apiId
//! - POST   /content/:apiId/search
//! - GET    /content/:apiId/:id
//! - PUT    /content/:apiId/:id
//! - DELETE /content/:apiId/:id

mod content;
mod content_types;
mod health;

pub use content::{create_record, delete_record, get_record, list_records, search_records, update_record};
pub use content_types::{
    create_content_type, delete_content_type, get_content_type, get_content_type_by_api_id,
    list_content_type_changes, list_content_types, update_content_type,
};
pub use health::{health_check, HealthResponse};

use crate::content::ContentService;
use crate::error::ContentError;
use crate::registry::ContentTypeRegistry;
use axum::{
    extract::rejection::JsonRejection,
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

/// Uniform response envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            error: None,
        }
    }

    pub fn with_message(message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data,
            error: None,
        }
    }

    pub fn error(code: &str, message: String) -> Self {
        Self {
            success: false,
            message: Some(message),
            data: None,
            error: Some(code.to_string()),
        }
    }
}

/// Shared state for all endpoints
pub struct AppState {
    pub registry: Arc<ContentTypeRegistry>,
    pub content: Arc<ContentService>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(registry: Arc<ContentTypeRegistry>, content: Arc<ContentService>) -> Self {
        Self {
            registry,
            content,
            start_time: Instant::now(),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/content-types",
            post(create_content_type).get(list_content_types),
        )
        .route(
            "/content-types/api-id/:api_id",
            get(get_content_type_by_api_id),
        )
        .route(
            "/content-types/:id",
            get(get_content_type)
                .put(update_content_type)
                .delete(delete_content_type),
        )
        .route("/content-types/:id/changes", get(list_content_type_changes))
        .route("/content/:api_id", post(create_record).get(list_records))
        .route("/content/:api_id/search", post(search_records))
        .route(
            "/content/:api_id/:id",
            get(get_record).put(update_record).delete(delete_record),
        )
        .with_state(state)
}

/// CORS for browser clients. `*` allows any origin; no origins means no CORS layer.
pub fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return Some(layer.allow_origin(Any));
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    Some(layer.allow_origin(allowed))
}

pub(crate) fn parse_id(raw: &str) -> Result<i64, ContentError> {
    raw.parse().map_err(|_| ContentError::InvalidRequest {
        message: format!("Invalid id '{}': expected an integer", raw),
    })
}

pub(crate) fn bad_body(rejection: JsonRejection) -> ContentError {
    ContentError::InvalidRequest {
        message: rejection.body_text(),
    }
}
