//! Startup seeding
//!
//! Reads a JSON array of content type definitions and creates the ones whose
//! apiId is not registered yet. Existing content types are left untouched.

use crate::error::{ContentError, Result};
use crate::registry::content_type::ContentTypeRegistry;
use crate::registry::model::ContentTypeInput;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Default, Serialize)]
pub struct SeedResult {
    pub created: Vec<String>,
    pub skipped: Vec<String>,
}

pub fn read_seed_file(path: &Path) -> Result<Vec<ContentTypeInput>> {
    let content = fs::read_to_string(path).map_err(|e| ContentError::InvalidRequest {
        message: format!("Failed to read seed file {:?}: {}", path, e),
    })?;

    serde_json::from_str(&content).map_err(|e| ContentError::InvalidRequest {
        message: format!("Invalid seed file {:?}: {}", path, e),
    })
}

pub async fn seed_content_types(registry: &ContentTypeRegistry, path: &Path) -> Result<SeedResult> {
    let definitions = read_seed_file(path)?;
    let mut result = SeedResult::default();

    for definition in definitions {
        let api_id = definition.api_id.clone();

        match registry.get_by_api_id(&api_id).await {
            Ok(_) => {
                debug!("Seed content type {} already exists, skipping", api_id);
                result.skipped.push(api_id);
                continue;
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        match registry.create(definition).await {
            Ok(created) => result.created.push(created.api_id.to_string()),
            // Another instance seeded it first
            Err(ContentError::Conflict { .. }) => result.skipped.push(api_id),
            Err(e) => return Err(e),
        }
    }

    info!(
        "Seeded content types from {:?}: {} created, {} skipped",
        path,
        result.created.len(),
        result.skipped.len()
    );

    Ok(result)
}
