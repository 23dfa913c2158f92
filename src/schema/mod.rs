mod diff;
mod tables;
mod types;

pub use diff::{ChangeCompatibility, ChangeType, FieldChange, FieldSetDiff};
pub use tables::{MigrationResult, TableSynthesizer};
pub use types::{ColumnSpec, ColumnType, TableSpec, SHORT_TEXT_MAX_LEN};
