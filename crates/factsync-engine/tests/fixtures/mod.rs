//! Test fixtures for pipeline integration tests
//!
//! The companies layout matches the built-in impact dictionary, so the
//! scenarios below exercise real mappings.

#![allow(dead_code)]

use factsync_catalog::MockWarehouse;
use factsync_core::{ColumnDescriptor, PipelineConfig};
use factsync_engine::{ModelRunner, RebuildError};
use std::sync::Mutex;

/// Columns of the companies table
pub fn companies_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::new("id", "integer", 1).with_nullable(false),
        ColumnDescriptor::new("name", "character varying", 2),
        ColumnDescriptor::new("email", "character varying", 3),
        ColumnDescriptor::new("phone", "character varying", 4),
        ColumnDescriptor::new("gst_no", "character varying", 5),
        ColumnDescriptor::new("address", "text", 6),
        ColumnDescriptor::new("category", "character varying", 7),
        ColumnDescriptor::new("is_verified", "boolean", 8),
        ColumnDescriptor::new("misc", "numeric", 9),
        ColumnDescriptor::new("created_at", "timestamp without time zone", 10),
        ColumnDescriptor::new("updated_at", "timestamp without time zone", 11),
    ]
}

/// Non-metadata columns of the companies table, in ordinal order
pub const COMPANY_DATA_COLUMNS: [&str; 9] = [
    "id", "name", "email", "phone", "gst_no", "address", "category", "is_verified", "misc",
];

/// Columns of a table the impact dictionary knows nothing about
pub fn users_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::new("id", "bigint", 1).with_nullable(false),
        ColumnDescriptor::new("first_name", "text", 2),
        ColumnDescriptor::new("created_at", "timestamp without time zone", 3),
        ColumnDescriptor::new("updated_at", "timestamp without time zone", 4),
    ]
}

/// Columns of the tags table
pub fn tags_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::new("id", "bigint", 1).with_nullable(false),
        ColumnDescriptor::new("name", "text", 2),
    ]
}

/// A company row as `(column, value)` pairs
///
/// `is_verified` and `misc` are written the way staging exports them; the
/// baseline variants differ only in representation.
pub fn company(id: &'static str, email: &'static str, baseline: bool) -> Vec<(&'static str, Option<&'static str>)> {
    vec![
        ("id", Some(id)),
        ("name", Some("Acme Industrial")),
        ("email", Some(email)),
        ("phone", Some("+91 22 5555 0100")),
        ("gst_no", None),
        ("address", Some("Plot 4, MIDC")),
        ("category", Some("manufacturer")),
        ("is_verified", Some(if baseline { "true" } else { "t" })),
        ("misc", Some(if baseline { "4.50" } else { "4.5" })),
        ("created_at", Some("2024-01-01 09:00:00")),
        ("updated_at", Some(if baseline { "2024-01-01 09:00:00" } else { "2024-05-01 09:00:00" })),
    ]
}

/// Empty warehouse with the companies, users and tags tables
pub async fn warehouse() -> MockWarehouse {
    let warehouse = MockWarehouse::new();
    warehouse.add_table("companies", companies_columns()).await;
    warehouse.add_table("users", users_columns()).await;
    warehouse.add_table("tags", tags_columns()).await;
    warehouse
}

/// Pipeline settings scanning only the given tables
pub fn pipeline_config(tables: &[&str]) -> PipelineConfig {
    PipelineConfig {
        tables: tables.iter().map(|t| t.to_string()).collect(),
        ..PipelineConfig::default()
    }
}

/// Model runner that fails the listed artifacts and records every call
#[derive(Default)]
pub struct ScriptedRunner {
    failing: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(artifacts: &[&str]) -> Self {
        Self {
            failing: artifacts.iter().map(|a| a.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Artifacts rebuilt so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl ModelRunner for ScriptedRunner {
    async fn run_model(&self, artifact: &str) -> Result<(), RebuildError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(artifact.to_string());
        }

        if self.failing.iter().any(|a| a == artifact) {
            return Err(RebuildError::Failed {
                artifact: artifact.to_string(),
                status: "exit status: 1".to_string(),
                diagnostics: vec![format!("Database Error in model {}", artifact)],
            });
        }

        Ok(())
    }
}
