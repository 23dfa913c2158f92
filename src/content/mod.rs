//! Record layer
//!
//! Resolves a content type by apiId, validates payloads and filters against
//! its field definitions, and runs generic CRUD over the derived table.

mod filter;
mod lookup;
mod service;
mod store;
mod value;

pub use filter::{Equality, FilterTranslator, Predicate};
pub use lookup::{ContentTypeLookup, LocalLookup, RemoteLookup};
pub use service::ContentService;
pub use store::RecordStore;
pub use value::{coerce_payload, FieldValue, FieldValues, Record, WriteMode};
