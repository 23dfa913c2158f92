//! APIForge content engine
//!
//! Turns user-defined content type schemas into physical tables and serves
//! generic, schema-checked CRUD and equality search over them.

pub mod api;
pub mod config;
pub mod content;
pub mod error;
pub mod pool;
pub mod registry;
pub mod schema;
pub mod storage;
