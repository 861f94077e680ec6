//! Test fixtures for warehouse integration tests
//!
//! Column layouts modeled on the tracked source tables: an id primary key,
//! business columns of the three comparison families, and the row
//! timestamps that drive scan order.

#![allow(dead_code)]

use factsync_catalog::MockWarehouse;
use factsync_core::ColumnDescriptor;

/// Columns of the companies table
pub fn companies_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::new("id", "integer", 1).with_nullable(false).with_sql_type("int4"),
        ColumnDescriptor::new("name", "character varying", 2).with_sql_type("varchar"),
        ColumnDescriptor::new("display_name", "character varying", 3).with_sql_type("varchar"),
        ColumnDescriptor::new("email", "character varying", 4).with_sql_type("varchar"),
        ColumnDescriptor::new("is_verified", "boolean", 5).with_sql_type("bool"),
        ColumnDescriptor::new("credit_limit", "numeric", 6).with_sql_type("numeric"),
        ColumnDescriptor::new("created_at", "timestamp without time zone", 7).with_sql_type("timestamp"),
        ColumnDescriptor::new("updated_at", "timestamp without time zone", 8).with_sql_type("timestamp"),
    ]
}

/// Columns of the tags table (no timestamps)
pub fn tags_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::new("id", "bigint", 1).with_nullable(false).with_sql_type("int8"),
        ColumnDescriptor::new("name", "text", 2).with_sql_type("text"),
    ]
}

/// A warehouse with one existing and one new company in staging
///
/// Company 1 exists in the baseline with a different email; company 2 is
/// only in staging and was updated more recently.
pub async fn companies_warehouse() -> MockWarehouse {
    let warehouse = MockWarehouse::new();
    warehouse.add_table("companies", companies_columns()).await;

    warehouse
        .add_baseline_row("companies", &[
            ("id", Some("1")),
            ("name", Some("Acme")),
            ("email", Some("old@acme.test")),
            ("is_verified", Some("true")),
            ("credit_limit", Some("1000.00")),
            ("created_at", Some("2024-01-01 00:00:00")),
            ("updated_at", Some("2024-01-01 00:00:00")),
        ])
        .await;

    warehouse
        .add_staging_row("companies", &[
            ("id", Some("1")),
            ("name", Some("Acme")),
            ("email", Some("new@acme.test")),
            ("is_verified", Some("t")),
            ("credit_limit", Some("1000")),
            ("created_at", Some("2024-01-01 00:00:00")),
            ("updated_at", Some("2024-02-01 00:00:00")),
        ])
        .await;
    warehouse
        .add_staging_row("companies", &[
            ("id", Some("2")),
            ("name", Some("Globex")),
            ("email", Some("hello@globex.test")),
            ("created_at", Some("2024-03-01 00:00:00")),
            ("updated_at", Some("2024-03-01 00:00:00")),
        ])
        .await;

    warehouse
}
