//! Content Type Registry
//!
//! Persists content type definitions and owns their storage lifecycle.
//!
//! ```text
//! ContentTypeInput ──validate──▶ NewContentType ──Catalog──▶ ContentType (PENDING)
//!                                                   │
//!                              TableSynthesizer ◀───┘ ──▶ ContentType (ACTIVE)
//! ```

mod content_type;
mod identifier;
mod model;
mod seed;

pub use content_type::ContentTypeRegistry;
pub use identifier::{quote_ident, ApiId, FieldName, StorageName, MAX_API_ID_LEN, RESERVED_COLUMNS, STORAGE_PREFIX};
pub use model::{
    fields_checksum, validate_fields, ContentStatus, ContentType, ContentTypeInput, ContentTypePatch,
    FieldDefinition, FieldInput, FieldType, NewContentType, RelationType,
};
pub use seed::{read_seed_file, seed_content_types, SeedResult};
