//! Mock warehouse for testing
//!
//! Holds staging and baseline tables in memory without connecting to any
//! warehouse. It's useful for:
//! - Unit testing change detection and impact resolution
//! - End-to-end pipeline tests without credentials
//! - Simulating introspection, scan, connectivity and per-record write failures
//!
//! ## Usage
//!
//! ```rust,ignore
//! use factsync_catalog::{MockWarehouse, Warehouse};
//! use factsync_core::ColumnDescriptor;
//!
//! let warehouse = MockWarehouse::new();
//! warehouse.add_table("companies", vec![
//!     ColumnDescriptor::new("id", "integer", 1),
//!     ColumnDescriptor::new("email", "text", 2),
//! ]).await;
//! warehouse.add_staging_row("companies", &[("id", Some("1")), ("email", Some("a@b.c"))]).await;
//!
//! let columns = warehouse.describe_columns("companies").await?;
//! ```

use factsync_core::{ChangeType, ColumnDescriptor, Row, StagingRecord, ID_COLUMN};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::adapter::{
    missing_baseline_row, BaselineWrite, RecordFailure, TimestampColumns, Warehouse, WarehouseError,
    WriteKind, WriteOutcome,
};

/// One table with its staging rows and baseline snapshot
#[derive(Debug, Clone, Default)]
struct MockTable {
    columns: Vec<ColumnDescriptor>,
    staging: Vec<Row>,
    baseline: BTreeMap<i64, Row>,
}

#[derive(Debug, Default)]
struct MockState {
    tables: HashMap<String, MockTable>,

    /// Errors returned by `describe_columns` for specific tables
    introspection_errors: HashMap<String, WarehouseError>,

    /// Errors returned by `fetch_staging_records` for specific tables
    scan_errors: HashMap<String, WarehouseError>,

    /// Errors returned by `fetch_baseline_row` for specific tables
    baseline_errors: HashMap<String, WarehouseError>,

    /// (table, id) pairs whose baseline write fails
    failing_writes: HashSet<(String, i64)>,

    /// Baseline writes attempted, in order
    write_log: Vec<(String, i64, WriteKind)>,
}

/// Mock warehouse for testing
///
/// Clones share the same underlying tables.
#[derive(Clone, Default)]
pub struct MockWarehouse {
    state: Arc<RwLock<MockState>>,

    /// Simulate connection failure
    fail_connection: bool,
}

/// Build a row from `(column, value)` pairs
pub fn row(pairs: &[(&str, Option<&str>)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.map(|s| s.to_string())))
        .collect()
}

fn row_id(table: &str, row: &Row) -> Result<i64, WarehouseError> {
    row.get(ID_COLUMN)
        .and_then(|v| v.as_deref())
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| WarehouseError::InvalidRow(format!("{}: row without numeric id", table)))
}

impl MockWarehouse {
    /// Create an empty mock warehouse
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure to fail all operations with a connection error
    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    /// Create a table (in both schemas) with the given columns
    pub async fn add_table(&self, table: &str, columns: Vec<ColumnDescriptor>) {
        self.state.write().await.tables.insert(
            table.to_string(),
            MockTable {
                columns,
                ..MockTable::default()
            },
        );
    }

    /// Add a row to a staging table
    pub async fn add_staging_row(&self, table: &str, pairs: &[(&str, Option<&str>)]) {
        let mut state = self.state.write().await;
        state.tables.entry(table.to_string()).or_default().staging.push(row(pairs));
    }

    /// Add a row to a baseline table
    pub async fn add_baseline_row(&self, table: &str, pairs: &[(&str, Option<&str>)]) {
        let row = row(pairs);
        let id = row_id(table, &row).unwrap_or_default();
        let mut state = self.state.write().await;
        state.tables.entry(table.to_string()).or_default().baseline.insert(id, row);
    }

    /// Make `describe_columns` fail for a table
    pub async fn add_introspection_error(&self, table: &str, error: WarehouseError) {
        self.state.write().await.introspection_errors.insert(table.to_string(), error);
    }

    /// Make `fetch_staging_records` fail for a table
    pub async fn add_scan_error(&self, table: &str, error: WarehouseError) {
        self.state.write().await.scan_errors.insert(table.to_string(), error);
    }

    /// Make `fetch_baseline_row` fail for a table
    pub async fn add_baseline_error(&self, table: &str, error: WarehouseError) {
        self.state.write().await.baseline_errors.insert(table.to_string(), error);
    }

    /// Make the baseline write of one record fail
    pub async fn fail_write_for(&self, table: &str, id: i64) {
        self.state.write().await.failing_writes.insert((table.to_string(), id));
    }

    /// Current baseline row for an id
    pub async fn baseline_row(&self, table: &str, id: i64) -> Option<Row> {
        self.state
            .read()
            .await
            .tables
            .get(table)
            .and_then(|t| t.baseline.get(&id).cloned())
    }

    /// Number of rows in a baseline table
    pub async fn baseline_len(&self, table: &str) -> usize {
        self.state
            .read()
            .await
            .tables
            .get(table)
            .map(|t| t.baseline.len())
            .unwrap_or(0)
    }

    /// Baseline writes attempted so far, in order
    pub async fn write_log(&self) -> Vec<(String, i64, WriteKind)> {
        self.state.read().await.write_log.clone()
    }

    fn check_connection(&self) -> Result<(), WarehouseError> {
        if self.fail_connection {
            Err(WarehouseError::ConnectionError("Simulated connection failure".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Copy only the listed columns, keeping NULL for missing ones
fn project(row: &Row, columns: &[ColumnDescriptor]) -> Row {
    columns
        .iter()
        .map(|c| (c.name.clone(), row.get(&c.name).cloned().flatten()))
        .collect()
}

#[async_trait::async_trait]
impl Warehouse for MockWarehouse {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn test_connection(&self) -> Result<(), WarehouseError> {
        self.check_connection()
    }

    async fn describe_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>, WarehouseError> {
        self.check_connection()?;
        let state = self.state.read().await;

        if let Some(error) = state.introspection_errors.get(table) {
            return Err(error.clone());
        }

        match state.tables.get(table) {
            Some(t) if !t.columns.is_empty() => {
                let mut columns = t.columns.clone();
                columns.sort_by_key(|c| c.ordinal_position);
                Ok(columns)
            }
            _ => Err(WarehouseError::TableNotFound(format!(
                "Table staging.{} not found or has no columns",
                table
            ))),
        }
    }

    async fn fetch_staging_records(
        &self,
        table: &str,
        columns: &[ColumnDescriptor],
        timestamps: &TimestampColumns,
    ) -> Result<Vec<StagingRecord>, WarehouseError> {
        self.check_connection()?;
        let state = self.state.read().await;

        if let Some(error) = state.scan_errors.get(table) {
            return Err(error.clone());
        }

        let t = state
            .tables
            .get(table)
            .ok_or_else(|| WarehouseError::TableNotFound(format!("staging.{}", table)))?;

        let mut rows: Vec<&Row> = t.staging.iter().collect();
        // ISO timestamps order lexicographically; NULLs sort first like DESC in PostgreSQL
        rows.sort_by_key(|r| {
            let updated = r.get(&timestamps.updated).cloned().flatten();
            (updated.is_some(), Reverse(updated))
        });

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row_id(table, row)?;
            let hint = match (
                row.get(&timestamps.created).cloned().flatten(),
                row.get(&timestamps.updated).cloned().flatten(),
            ) {
                (Some(created), Some(updated)) if created == updated => Some(ChangeType::Insert),
                (Some(_), Some(_)) => Some(ChangeType::Update),
                _ => None,
            };
            let is_new = !t.baseline.contains_key(&id);

            records.push(
                StagingRecord::new(table, id, project(row, columns), is_new).with_timestamp_hint(hint),
            );
        }

        Ok(records)
    }

    async fn fetch_baseline_row(
        &self,
        table: &str,
        id: i64,
        columns: &[ColumnDescriptor],
    ) -> Result<Option<Row>, WarehouseError> {
        self.check_connection()?;
        let state = self.state.read().await;

        if let Some(error) = state.baseline_errors.get(table) {
            return Err(error.clone());
        }

        let t = state
            .tables
            .get(table)
            .ok_or_else(|| WarehouseError::TableNotFound(format!("public.{}", table)))?;

        Ok(t.baseline.get(&id).map(|row| project(row, columns)))
    }

    async fn apply_baseline_writes(
        &self,
        table: &str,
        columns: &[ColumnDescriptor],
        writes: &[BaselineWrite<'_>],
    ) -> Result<WriteOutcome, WarehouseError> {
        self.check_connection()?;
        let mut state = self.state.write().await;

        if !state.tables.contains_key(table) {
            return Err(WarehouseError::TableNotFound(format!("public.{}", table)));
        }

        let mut outcome = WriteOutcome::default();

        for write in writes {
            let id = write.record.id;
            state.write_log.push((table.to_string(), id, write.kind));

            if state.failing_writes.contains(&(table.to_string(), id)) {
                outcome.failures.push(RecordFailure {
                    record_id: id,
                    error: "simulated write failure".to_string(),
                });
                continue;
            }

            let values = project(&write.record.values, columns);
            let baseline = &mut state
                .tables
                .get_mut(table)
                .ok_or_else(|| WarehouseError::TableNotFound(format!("public.{}", table)))?
                .baseline;

            match write.kind {
                WriteKind::Upsert => {
                    baseline.insert(id, values);
                }
                WriteKind::Update => {
                    // UPDATE ... WHERE id = $n touches nothing when the row is gone
                    let Some(existing) = baseline.get_mut(&id) else {
                        outcome.failures.push(RecordFailure {
                            record_id: id,
                            error: missing_baseline_row(id),
                        });
                        continue;
                    };
                    for (column, value) in values {
                        if column != ID_COLUMN {
                            existing.insert(column, value);
                        }
                    }
                }
            }

            outcome.applied += 1;
        }

        Ok(outcome)
    }
}
