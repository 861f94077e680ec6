//! Warehouse access for change detection and baseline sync
//!
//! A warehouse holds two copies of each tracked table: a staging schema with
//! recently changed rows and a baseline schema with the last synchronized
//! snapshot. This crate introspects staging columns, scans staging rows
//! against the baseline and writes rows back to the baseline.
//!
//! ## Features
//!
//! - `postgres` - PostgreSQL support (default)
//! - `tls` - TLS connections to PostgreSQL
//!
//! ## Example
//!
//! ```rust,ignore
//! use factsync_catalog::{PostgresWarehouse, Warehouse, TimestampColumns};
//!
//! let warehouse = PostgresWarehouse::new(&config.warehouse)?;
//! let columns = warehouse.describe_columns("companies").await?;
//! let records = warehouse
//!     .fetch_staging_records("companies", &columns, &TimestampColumns::default())
//!     .await?;
//! ```

pub mod adapter;
pub mod mock;
pub mod sql;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use adapter::{
    BaselineWrite, RecordFailure, TimestampColumns, Warehouse, WarehouseError, WriteKind, WriteOutcome,
};
pub use mock::MockWarehouse;

#[cfg(feature = "postgres")]
pub use postgres::PostgresWarehouse;
