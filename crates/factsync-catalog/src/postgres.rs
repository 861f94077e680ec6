//! PostgreSQL warehouse using information_schema and a staging/baseline schema pair
//!
//! Works with:
//! - PostgreSQL 9.5+ (`INSERT ... ON CONFLICT`)
//! - Other PostgreSQL-compatible databases supporting upserts
//!
//! Every operation opens its own connection and drops it before returning.
//! Baseline writes run in one transaction per table, with a savepoint per
//! record so a failing row does not poison the rest of the batch.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let warehouse = PostgresWarehouse::new(&config.warehouse)?;
//! warehouse.test_connection().await?;
//! let columns = warehouse.describe_columns("companies").await?;
//! ```
//!
//! Reference: https://www.postgresql.org/docs/current/information-schema-columns.html

use factsync_core::{ColumnDescriptor, ChangeType, Row, StagingRecord, WarehouseConfig};
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Config as PgConfig, NoTls};

use crate::adapter::{
    missing_baseline_row, BaselineWrite, RecordFailure, TimestampColumns, Warehouse, WarehouseError,
    WriteKind, WriteOutcome,
};
use crate::sql;

#[cfg(feature = "tls")]
use postgres_native_tls::MakeTlsConnector;

#[cfg(feature = "tls")]
use native_tls::TlsConnector;

/// PostgreSQL warehouse
pub struct PostgresWarehouse {
    /// Parsed connection settings
    config: PgConfig,

    /// Connect over TLS
    tls: bool,

    /// Schema holding recently changed rows
    staging_schema: String,

    /// Schema holding the last synchronized snapshot
    baseline_schema: String,
}

impl PostgresWarehouse {
    /// Create a warehouse from configuration; no connection is opened yet
    pub fn new(config: &WarehouseConfig) -> Result<Self, WarehouseError> {
        let pg_config: PgConfig = config
            .to_connection_string()
            .parse()
            .map_err(|e| WarehouseError::ConfigError(format!("Invalid connection string: {}", e)))?;

        if config.tls && !cfg!(feature = "tls") {
            return Err(tls_not_compiled());
        }

        Ok(Self {
            config: pg_config,
            tls: config.tls,
            staging_schema: config.staging_schema.clone(),
            baseline_schema: config.baseline_schema.clone(),
        })
    }

    /// Host/port description for log messages
    fn endpoint(&self) -> String {
        let host = self
            .config
            .get_hosts()
            .first()
            .map(|h| format!("{:?}", h))
            .unwrap_or_else(|| "localhost".to_string());
        let port = self.config.get_ports().first().copied().unwrap_or(5432);
        format!("{}:{}", host, port)
    }

    /// Open a connection for one logical operation
    ///
    /// The connection task ends when the returned client is dropped.
    async fn connect(&self) -> Result<Client, WarehouseError> {
        if self.tls {
            return self.connect_with_tls().await;
        }

        let endpoint = self.endpoint();
        let (client, connection) = self
            .config
            .connect(NoTls)
            .await
            .map_err(|e| WarehouseError::ConnectionError(format!("{}: {}", endpoint, e)))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(endpoint = %endpoint, error = %e, "PostgreSQL connection error");
            }
        });

        Ok(client)
    }

    /// Open a TLS connection for one logical operation
    #[cfg(feature = "tls")]
    async fn connect_with_tls(&self) -> Result<Client, WarehouseError> {
        let endpoint = self.endpoint();

        let connector = TlsConnector::builder()
            .build()
            .map_err(|e| WarehouseError::ConfigError(format!("Failed to create TLS connector: {}", e)))?;

        let (client, connection) = self
            .config
            .connect(MakeTlsConnector::new(connector))
            .await
            .map_err(|e| WarehouseError::ConnectionError(format!("{} (TLS): {}", endpoint, e)))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(endpoint = %endpoint, error = %e, "PostgreSQL TLS connection error");
            }
        });

        Ok(client)
    }

    /// TLS requested without the `tls` feature (returns error)
    #[cfg(not(feature = "tls"))]
    async fn connect_with_tls(&self) -> Result<Client, WarehouseError> {
        Err(tls_not_compiled())
    }

    fn staging_fqn(&self, table: &str) -> String {
        format!("{}.{}", self.staging_schema, table)
    }
}

fn tls_not_compiled() -> WarehouseError {
    WarehouseError::Unsupported(
        "TLS support not compiled. Rebuild with: cargo build --features tls".to_string(),
    )
}

/// Classify a query error the way callers need it
fn query_error(target: &str, e: tokio_postgres::Error) -> WarehouseError {
    let err_str = e.to_string();
    if e.is_closed() {
        WarehouseError::ConnectionError(err_str)
    } else if err_str.contains("does not exist") {
        WarehouseError::TableNotFound(format!("{}: {}", target, err_str))
    } else if err_str.contains("permission denied") {
        WarehouseError::PermissionDenied(format!("Cannot access {}: {}", target, err_str))
    } else {
        WarehouseError::QueryError(err_str)
    }
}

/// Text values of `columns` for a record, in column order
fn text_values<'a>(record: &StagingRecord, columns: impl Iterator<Item = &'a ColumnDescriptor>) -> Vec<Option<String>> {
    columns.map(|c| record.values.get(&c.name).cloned().flatten()).collect()
}

/// An UPDATE that matched no row wrote nothing
fn check_affected(kind: WriteKind, record_id: i64, rows: u64) -> Result<(), String> {
    if kind == WriteKind::Update && rows == 0 {
        return Err(missing_baseline_row(record_id));
    }
    Ok(())
}

fn parse_hint(hint: Option<String>) -> Option<ChangeType> {
    match hint.as_deref() {
        Some("INSERT") => Some(ChangeType::Insert),
        Some("UPDATE") => Some(ChangeType::Update),
        _ => None,
    }
}

#[async_trait::async_trait]
impl Warehouse for PostgresWarehouse {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    async fn test_connection(&self) -> Result<(), WarehouseError> {
        let client = self.connect().await?;
        client
            .query("SELECT 1", &[])
            .await
            .map_err(|e| WarehouseError::QueryError(format!("Connection test failed: {}", e)))?;
        Ok(())
    }

    async fn describe_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>, WarehouseError> {
        let client = self.connect().await?;
        let target = self.staging_fqn(table);

        let rows = client
            .query(sql::describe_columns_query(), &[&self.staging_schema, &table])
            .await
            .map_err(|e| query_error(&target, e))?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.get(0);
            let data_type: String = row.get(1);
            let ordinal_position: i32 = row.get(2);
            let is_nullable: String = row.get(3);
            let udt_name: String = row.get(4);

            columns.push(
                ColumnDescriptor::new(name, &data_type, ordinal_position)
                    .with_nullable(is_nullable.eq_ignore_ascii_case("YES"))
                    .with_sql_type(udt_name),
            );
        }

        if columns.is_empty() {
            return Err(WarehouseError::TableNotFound(format!(
                "Table {} not found or has no columns",
                target
            )));
        }

        Ok(columns)
    }

    async fn fetch_staging_records(
        &self,
        table: &str,
        columns: &[ColumnDescriptor],
        timestamps: &TimestampColumns,
    ) -> Result<Vec<StagingRecord>, WarehouseError> {
        let client = self.connect().await?;
        let query = sql::staging_scan(&self.staging_schema, &self.baseline_schema, table, columns, timestamps);

        let rows = client
            .query(query.as_str(), &[])
            .await
            .map_err(|e| query_error(&self.staging_fqn(table), e))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let id: Option<i64> = row
                .try_get(0)
                .map_err(|e| WarehouseError::InvalidRow(format!("{}: {}", table, e)))?;
            let id = id.ok_or_else(|| WarehouseError::InvalidRow(format!("{}: row without id", table)))?;
            let is_new: bool = row.get(1);
            let hint: Option<String> = row.get(2);

            let mut values = Row::new();
            for (i, column) in columns.iter().enumerate() {
                let value: Option<String> = row.get(sql::STAGING_PREFIX_COLUMNS + i);
                values.insert(column.name.clone(), value);
            }

            records.push(StagingRecord::new(table, id, values, is_new).with_timestamp_hint(parse_hint(hint)));
        }

        Ok(records)
    }

    async fn fetch_baseline_row(
        &self,
        table: &str,
        id: i64,
        columns: &[ColumnDescriptor],
    ) -> Result<Option<Row>, WarehouseError> {
        let client = self.connect().await?;
        let query = sql::baseline_row(&self.baseline_schema, table, columns);

        let row = client
            .query_opt(query.as_str(), &[&id])
            .await
            .map_err(|e| query_error(&format!("{}.{}", self.baseline_schema, table), e))?;

        Ok(row.map(|row| {
            columns
                .iter()
                .enumerate()
                .map(|(i, column)| (column.name.clone(), row.get::<_, Option<String>>(i)))
                .collect()
        }))
    }

    async fn apply_baseline_writes(
        &self,
        table: &str,
        columns: &[ColumnDescriptor],
        writes: &[BaselineWrite<'_>],
    ) -> Result<WriteOutcome, WarehouseError> {
        let target = format!("{}.{}", self.baseline_schema, table);
        let mut client = self.connect().await?;

        // Dropping the transaction without commit rolls it back
        let mut transaction = client
            .transaction()
            .await
            .map_err(|e| query_error(&target, e))?;

        let upsert_sql = sql::upsert(&self.baseline_schema, table, columns);
        let update_sql = sql::update(&self.baseline_schema, table, columns);
        let update_columns: Vec<&ColumnDescriptor> = columns.iter().filter(|c| c.name != factsync_core::ID_COLUMN).collect();

        let mut outcome = WriteOutcome::default();

        for write in writes {
            let record = write.record;
            let savepoint = transaction
                .transaction()
                .await
                .map_err(|e| query_error(&target, e))?;

            let result = match (write.kind, &update_sql) {
                (WriteKind::Upsert, _) => {
                    let values = text_values(record, columns.iter());
                    let params: Vec<&(dyn ToSql + Sync)> =
                        values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
                    savepoint.execute(upsert_sql.as_str(), &params).await.map(Some)
                }
                (WriteKind::Update, Some(update_sql)) => {
                    let values = text_values(record, update_columns.iter().copied());
                    let mut params: Vec<&(dyn ToSql + Sync)> =
                        values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
                    params.push(&record.id);
                    savepoint.execute(update_sql.as_str(), &params).await.map(Some)
                }
                // Only the id column: nothing to update
                (WriteKind::Update, None) => Ok(None),
            };

            let result = result.map_err(|e| e.to_string()).and_then(|affected| match affected {
                Some(rows) => check_affected(write.kind, record.id, rows),
                None => Ok(()),
            });

            match result {
                Ok(()) => {
                    savepoint.commit().await.map_err(|e| query_error(&target, e))?;
                    outcome.applied += 1;
                }
                Err(error) => {
                    savepoint.rollback().await.map_err(|e| query_error(&target, e))?;
                    tracing::warn!(table = %target, record_id = record.id, error = %error, "Baseline write failed");
                    outcome.failures.push(RecordFailure {
                        record_id: record.id,
                        error,
                    });
                }
            }
        }

        transaction.commit().await.map_err(|e| query_error(&target, e))?;
        Ok(outcome)
    }
}
