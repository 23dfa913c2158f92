//! PostgreSQL backend
//!
//! `content_types` holds the metadata (one row per content type, fields as
//! JSONB), `content_type_changes` the structural change log, and every
//! content type owns one `ct_<apiId>` table.

mod catalog;
mod engine;
pub mod sql;

pub use catalog::PgCatalog;
pub use engine::PgEngine;

use crate::error::ContentError;
use tokio_postgres::error::SqlState;
use tracing::warn;

/// Translate a database error into the error taxonomy.
///
/// Constraint and existence failures are caller-visible; everything else is a
/// storage failure whose detail stays in the logs.
pub(crate) fn map_db_error(operation: &str, target: &str, err: tokio_postgres::Error) -> ContentError {
    let Some(code) = err.code() else {
        return ContentError::storage(operation, target, err);
    };

    if *code == SqlState::UNIQUE_VIOLATION {
        warn!("Unique violation during {} on {}: {}", operation, target, err);
        ContentError::conflict(format!("A unique value already exists in {}", target))
    } else if *code == SqlState::DUPLICATE_TABLE {
        ContentError::conflict(format!("Storage {} already exists", target))
    } else if *code == SqlState::DUPLICATE_COLUMN {
        ContentError::conflict(format!("A column being added already exists in {}", target))
    } else if *code == SqlState::UNDEFINED_TABLE {
        ContentError::storage_missing(target)
    } else if *code == SqlState::UNDEFINED_COLUMN {
        ContentError::conflict(format!(
            "The fields of {} changed during the request, retry the request",
            target
        ))
    } else if *code == SqlState::NOT_NULL_VIOLATION {
        ContentError::invalid_schema(format!("A required field of {} is missing", target))
    } else {
        ContentError::storage(operation, target, err)
    }
}
