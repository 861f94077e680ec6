//! Warehouse trait: introspection, staging scans and baseline writes

use factsync_core::{ColumnDescriptor, Row, StagingRecord};

/// Names of the row creation/update timestamp columns
///
/// Either may be absent from a given table; the scan then falls back to
/// ordering by id and reports no timestamp hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampColumns {
    pub created: String,
    pub updated: String,
}

impl Default for TimestampColumns {
    fn default() -> Self {
        Self {
            created: "created_at".to_string(),
            updated: "updated_at".to_string(),
        }
    }
}

/// How a record is written to the baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// Insert; on primary-key conflict overwrite every non-id column
    Upsert,

    /// Update every non-id column of the row with the same id
    Update,
}

/// One baseline write
#[derive(Debug, Clone, Copy)]
pub struct BaselineWrite<'a> {
    pub kind: WriteKind,
    pub record: &'a StagingRecord,
}

/// A record whose write failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    pub record_id: i64,
    pub error: String,
}

/// Failure message for an update whose baseline row is gone
pub fn missing_baseline_row(record_id: i64) -> String {
    format!("Baseline row {} no longer exists", record_id)
}

/// Result of a batch of baseline writes that reached commit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Records written
    pub applied: usize,

    /// Records whose write failed; the rest of the batch still committed
    pub failures: Vec<RecordFailure>,
}

/// Errors that can occur when talking to the warehouse
#[derive(Debug, Clone, thiserror::Error)]
pub enum WarehouseError {
    #[error("Connection failed: {0}")]
    ConnectionError(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Query failed: {0}")]
    QueryError(String),

    #[error("Invalid row: {0}")]
    InvalidRow(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl WarehouseError {
    /// True when the warehouse could not be reached at all
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::ConnectionError(_))
    }
}

/// Trait for warehouses holding a staging and a baseline copy of each table
///
/// Implementations acquire a connection per call and release it before
/// returning, on success and on error.
#[async_trait::async_trait]
pub trait Warehouse: Send + Sync {
    /// Get the warehouse name (e.g., "PostgreSQL")
    fn name(&self) -> &'static str;

    /// Test the connection to the warehouse
    async fn test_connection(&self) -> Result<(), WarehouseError>;

    /// Columns of a staging table in ordinal order
    ///
    /// No columns are filtered out. An unknown table is `TableNotFound`.
    async fn describe_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>, WarehouseError>;

    /// Every staging row of a table, most recently updated first
    ///
    /// Each record is flagged new when the baseline has no row with its id.
    async fn fetch_staging_records(
        &self,
        table: &str,
        columns: &[ColumnDescriptor],
        timestamps: &TimestampColumns,
    ) -> Result<Vec<StagingRecord>, WarehouseError>;

    /// The baseline row with the given id, if any
    async fn fetch_baseline_row(
        &self,
        table: &str,
        id: i64,
        columns: &[ColumnDescriptor],
    ) -> Result<Option<Row>, WarehouseError>;

    /// Apply writes to the baseline in a single transaction
    ///
    /// A failing record is rolled back on its own and reported in the
    /// outcome; the others are committed. `Err` means nothing reached commit.
    async fn apply_baseline_writes(
        &self,
        table: &str,
        columns: &[ColumnDescriptor],
        writes: &[BaselineWrite<'_>],
    ) -> Result<WriteOutcome, WarehouseError>;
}
