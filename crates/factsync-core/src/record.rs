//! Staging records and per-record change sets

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A row as column name → text value (NULL is `None`)
pub type Row = BTreeMap<String, Option<String>>;

/// Name of the primary key column shared by every source table
pub const ID_COLUMN: &str = "id";

/// Kind of change a staging record represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    /// No baseline row with the same id
    Insert,

    /// A baseline row exists and may differ
    Update,
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
        }
    }
}

/// One row read from a staging table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagingRecord {
    /// Source table the row belongs to
    pub table: String,

    /// Primary key
    pub id: i64,

    /// Column values as read from staging
    pub values: Row,

    /// True when the baseline has no row with this id
    pub is_new_record: bool,

    /// `INSERT` when `created_at == updated_at`, else `UPDATE`; diagnostics only
    pub timestamp_hint: Option<ChangeType>,
}

impl StagingRecord {
    /// Create a record; the change type is derived from baseline presence
    pub fn new(table: impl Into<String>, id: i64, values: Row, is_new_record: bool) -> Self {
        Self {
            table: table.into(),
            id,
            values,
            is_new_record,
            timestamp_hint: None,
        }
    }

    /// Attach the created/updated timestamp heuristic
    pub fn with_timestamp_hint(mut self, hint: Option<ChangeType>) -> Self {
        self.timestamp_hint = hint;
        self
    }

    /// Authoritative change type: baseline presence wins over the timestamp hint
    pub fn change_type(&self) -> ChangeType {
        if self.is_new_record {
            ChangeType::Insert
        } else {
            ChangeType::Update
        }
    }

    /// True when the timestamp heuristic disagrees with baseline presence
    pub fn signals_disagree(&self) -> bool {
        self.timestamp_hint
            .map(|hint| hint != self.change_type())
            .unwrap_or(false)
    }

    /// Value of a column, `None` for NULL or missing
    pub fn value(&self, column: &str) -> Option<&str> {
        self.values.get(column).and_then(|v| v.as_deref())
    }
}

/// Columns changed by one staging record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Source table
    pub source_table: String,

    /// Primary key of the record
    pub record_id: i64,

    /// Change type
    pub change_type: ChangeType,

    /// Changed columns in ordinal order, without duplicates
    pub changed_columns: Vec<String>,
}

impl ChangeSet {
    /// True when the record is identical to its baseline counterpart
    pub fn is_empty(&self) -> bool {
        self.changed_columns.is_empty()
    }
}
