//! Content type resolution for the record layer
//!
//! In a single process the registry is consulted directly. When the registry
//! runs as a separate service, content types are fetched over HTTP with a
//! bounded timeout; an unreachable or slow registry is a request failure,
//! never a hang.

use crate::api::ApiResponse;
use crate::error::{ContentError, Result};
use crate::registry::{ApiId, ContentType, ContentTypeRegistry};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[async_trait]
pub trait ContentTypeLookup: Send + Sync {
    /// Resolve a content type by apiId. Absence is `NotFound`, never a default.
    async fn find(&self, api_id: &ApiId) -> Result<ContentType>;

    fn source(&self) -> &'static str;
}

/// Resolve through the in-process registry
pub struct LocalLookup {
    registry: Arc<ContentTypeRegistry>,
}

impl LocalLookup {
    pub fn new(registry: Arc<ContentTypeRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ContentTypeLookup for LocalLookup {
    async fn find(&self, api_id: &ApiId) -> Result<ContentType> {
        self.registry.get_by_api_id(api_id.as_str()).await
    }

    fn source(&self) -> &'static str {
        "local"
    }
}

/// Resolve through a remote registry's `GET /content-types/api-id/{apiId}`
pub struct RemoteLookup {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl RemoteLookup {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ContentError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn url_for(&self, api_id: &ApiId) -> String {
        format!(
            "{}/content-types/api-id/{}",
            self.base_url,
            urlencoding::encode(api_id.as_str())
        )
    }

    fn failed(api_id: &ApiId, cause: impl Into<String>) -> ContentError {
        ContentError::LookupFailed {
            api_id: api_id.to_string(),
            cause: cause.into(),
        }
    }
}

#[async_trait]
impl ContentTypeLookup for RemoteLookup {
    async fn find(&self, api_id: &ApiId) -> Result<ContentType> {
        let url = self.url_for(api_id);
        debug!("Resolving content type {} via {}", api_id, url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                Self::failed(api_id, format!("timed out after {}ms", self.timeout.as_millis()))
            } else {
                Self::failed(api_id, e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ContentError::content_type_not_found(api_id.as_str()));
        }
        if !status.is_success() {
            warn!("Content type service answered {} for {}", status, api_id);
            return Err(Self::failed(api_id, format!("unexpected status {}", status)));
        }

        let envelope: ApiResponse<ContentType> = response.json().await.map_err(|e| {
            if e.is_timeout() {
                Self::failed(api_id, format!("timed out after {}ms", self.timeout.as_millis()))
            } else {
                Self::failed(api_id, format!("invalid response body: {}", e))
            }
        })?;

        match envelope.data {
            Some(content_type) if envelope.success && &content_type.api_id == api_id => Ok(content_type),
            Some(other) if envelope.success => Err(Self::failed(
                api_id,
                format!("service returned content type '{}'", other.api_id),
            )),
            _ => Err(Self::failed(
                api_id,
                envelope
                    .error
                    .unwrap_or_else(|| "response carried no content type".to_string()),
            )),
        }
    }

    fn source(&self) -> &'static str {
        "remote"
    }
}
