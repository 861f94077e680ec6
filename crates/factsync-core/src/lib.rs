//! FactSync Core
//!
//! Core domain model shared by the catalog, engine and CLI crates.
//! The report schema is versioned - never rename its fields.

pub mod schema;
pub mod equality;
pub mod record;
pub mod impact;
pub mod dictionary;
pub mod report;
pub mod config;

pub use schema::{ColumnDescriptor, DeclaredType, find_column};
pub use equality::{values_differ, TRUTHY_TOKENS};
pub use record::{ChangeSet, ChangeType, Row, StagingRecord, ID_COLUMN};
pub use impact::{ImpactMap, TargetColumn, FULL_REBUILD_MARKER};
pub use dictionary::{ColumnSpec, DictionaryError, ImpactDictionary};
pub use report::{
    RecordAnalysis, ReportVersion, RunReport, RunStatus, SkippedTable, TableAnalysis, TableSync,
};
pub use config::{Config, ConfigError, DbtConfig, DetectionMode, PipelineConfig, WarehouseConfig};
