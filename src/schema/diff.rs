//! Field Set Diff
//!
//! Compares the current field list of a content type against a proposed one
//! and classifies every change before any storage is touched.
//!
//! - SAFE: new fields (added as nullable columns), display-name changes,
//!   reordering, relation target changes, MEDIA <-> RELATION (same column)
//! - DATALOSS: removed fields; a rename shows up as removal + addition.
//!   Applied only when the caller confirms it.
//! - INCOMPATIBLE: column type, `required` or `unique` changes of an
//!   existing field. Never applied.

use crate::registry::{FieldDefinition, FieldName};
use crate::schema::types::{ColumnSpec, ColumnType};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    AddField,
    RemoveField,
    ModifyFieldType,
    ModifyFieldRequired,
    ModifyFieldUnique,
    ModifyFieldMetadata,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeCompatibility {
    Safe,
    DataLoss,
    Incompatible,
}

/// A single field change
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub field: FieldName,
    pub change_type: ChangeType,
    pub from: Option<String>,
    pub to: Option<String>,
    pub compatibility: ChangeCompatibility,
    pub reason: Option<String>,
}

impl FieldChange {
    fn describe(&self) -> String {
        match &self.reason {
            Some(reason) => format!("'{}': {}", self.field, reason),
            None => format!("'{}'", self.field),
        }
    }
}

/// Result of a field set diff
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSetDiff {
    pub safe_changes: Vec<FieldChange>,
    pub dataloss_changes: Vec<FieldChange>,
    pub incompatible_changes: Vec<FieldChange>,
    /// Columns to add, in the order of the new field list
    #[serde(skip)]
    pub added_columns: Vec<ColumnSpec>,
    #[serde(skip)]
    pub removed_columns: Vec<FieldName>,
}

impl FieldSetDiff {
    pub fn compute(current: &[FieldDefinition], proposed: &[FieldDefinition]) -> Self {
        let mut diff = Self::default();

        let current_by_name: HashMap<&FieldName, &FieldDefinition> =
            current.iter().map(|f| (&f.field_name, f)).collect();
        let proposed_by_name: HashMap<&FieldName, &FieldDefinition> =
            proposed.iter().map(|f| (&f.field_name, f)).collect();

        for field in current {
            if !proposed_by_name.contains_key(&field.field_name) {
                diff.add_change(FieldChange {
                    field: field.field_name.clone(),
                    change_type: ChangeType::RemoveField,
                    from: Some(field.field_type.to_string()),
                    to: None,
                    compatibility: ChangeCompatibility::DataLoss,
                    reason: Some("removing a field drops its column and data".to_string()),
                });
                diff.removed_columns.push(field.field_name.clone());
            }
        }

        for field in proposed {
            match current_by_name.get(&field.field_name) {
                None => {
                    diff.add_change(FieldChange {
                        field: field.field_name.clone(),
                        change_type: ChangeType::AddField,
                        from: None,
                        to: Some(field.field_type.to_string()),
                        compatibility: ChangeCompatibility::Safe,
                        reason: None,
                    });
                    diff.added_columns.push(ColumnSpec::additive(field));
                }
                Some(existing) => diff.compare_field(existing, field),
            }
        }

        diff
    }

    fn compare_field(&mut self, old: &FieldDefinition, new: &FieldDefinition) {
        if old.field_type != new.field_type {
            let same_column = ColumnType::for_field(old.field_type) == ColumnType::for_field(new.field_type);
            self.add_change(FieldChange {
                field: new.field_name.clone(),
                change_type: ChangeType::ModifyFieldType,
                from: Some(old.field_type.to_string()),
                to: Some(new.field_type.to_string()),
                compatibility: if same_column {
                    ChangeCompatibility::Safe
                } else {
                    ChangeCompatibility::Incompatible
                },
                reason: if same_column {
                    None
                } else {
                    Some(format!(
                        "type change {} -> {} is not supported; add a new field instead",
                        old.field_type, new.field_type
                    ))
                },
            });
        }

        if old.required != new.required {
            self.add_change(FieldChange {
                field: new.field_name.clone(),
                change_type: ChangeType::ModifyFieldRequired,
                from: Some(old.required.to_string()),
                to: Some(new.required.to_string()),
                compatibility: ChangeCompatibility::Incompatible,
                reason: Some("changing 'required' of an existing field is not supported".to_string()),
            });
        }

        if old.unique != new.unique {
            self.add_change(FieldChange {
                field: new.field_name.clone(),
                change_type: ChangeType::ModifyFieldUnique,
                from: Some(old.unique.to_string()),
                to: Some(new.unique.to_string()),
                compatibility: ChangeCompatibility::Incompatible,
                reason: Some("changing 'unique' of an existing field is not supported".to_string()),
            });
        }

        if old.name != new.name
            || old.target_content_type != new.target_content_type
            || old.relation_type != new.relation_type
        {
            self.add_change(FieldChange {
                field: new.field_name.clone(),
                change_type: ChangeType::ModifyFieldMetadata,
                from: None,
                to: None,
                compatibility: ChangeCompatibility::Safe,
                reason: None,
            });
        }
    }

    pub fn add_change(&mut self, change: FieldChange) {
        match change.compatibility {
            ChangeCompatibility::Safe => self.safe_changes.push(change),
            ChangeCompatibility::DataLoss => self.dataloss_changes.push(change),
            ChangeCompatibility::Incompatible => self.incompatible_changes.push(change),
        }
    }

    pub fn is_safe(&self) -> bool {
        self.dataloss_changes.is_empty() && self.incompatible_changes.is_empty()
    }

    pub fn has_changes(&self) -> bool {
        !self.safe_changes.is_empty()
            || !self.dataloss_changes.is_empty()
            || !self.incompatible_changes.is_empty()
    }

    /// Whether the physical table has to change
    pub fn alters_storage(&self) -> bool {
        !self.added_columns.is_empty() || !self.removed_columns.is_empty()
    }

    pub fn incompatible_summary(&self) -> String {
        summarize(&self.incompatible_changes)
    }

    pub fn dataloss_summary(&self) -> String {
        summarize(&self.dataloss_changes)
    }
}

fn summarize(changes: &[FieldChange]) -> String {
    changes
        .iter()
        .map(FieldChange::describe)
        .collect::<Vec<_>>()
        .join("; ")
}
