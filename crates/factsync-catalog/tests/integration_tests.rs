//! Integration tests for warehouses
//!
//! Mock warehouse tests run everywhere. Tests against a live PostgreSQL are
//! marked with `#[ignore]` and can be run with `cargo test -- --ignored`.
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all non-ignored tests (no database required)
//! cargo test -p factsync-catalog --test integration_tests
//!
//! # Run PostgreSQL integration tests
//! PGHOST=localhost \
//! PGPORT=5432 \
//! PGDATABASE=mydb \
//! PGUSER=user \
//! PGPASSWORD=pass \
//! cargo test -p factsync-catalog --test integration_tests -- --ignored
//! ```

mod fixtures;

use factsync_catalog::{
    BaselineWrite, MockWarehouse, TimestampColumns, Warehouse, WarehouseError, WriteKind,
};
use factsync_core::{ChangeType, DeclaredType};
use pretty_assertions::assert_eq;

// =============================================================================
// Helper Functions
// =============================================================================

/// Check if PostgreSQL credentials are available
fn has_postgres_credentials() -> bool {
    std::env::var("PGHOST").is_ok() || std::env::var("FACTSYNC_DATABASE_URL").is_ok()
}

// =============================================================================
// Mock Warehouse Tests (No database required)
// =============================================================================

#[tokio::test]
async fn test_mock_describe_columns_in_ordinal_order() {
    let warehouse = MockWarehouse::new();
    let mut columns = fixtures::companies_columns();
    columns.reverse();
    warehouse.add_table("companies", columns).await;

    let described = warehouse.describe_columns("companies").await.unwrap();

    assert_eq!(described.len(), 8);
    assert_eq!(described[0].name, "id");
    assert_eq!(described[4].declared_type, DeclaredType::Boolean);
    assert_eq!(described[5].declared_type, DeclaredType::Numeric);
    assert_eq!(described[7].name, "updated_at");
}

#[tokio::test]
async fn test_mock_staging_scan_flags_new_records() {
    let warehouse = fixtures::companies_warehouse().await;
    let columns = fixtures::companies_columns();

    let records = warehouse
        .fetch_staging_records("companies", &columns, &TimestampColumns::default())
        .await
        .unwrap();

    // Most recently updated first
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, 2);
    assert!(records[0].is_new_record);
    assert_eq!(records[0].change_type(), ChangeType::Insert);
    assert_eq!(records[1].id, 1);
    assert!(!records[1].is_new_record);
    assert_eq!(records[1].timestamp_hint, Some(ChangeType::Update));
    assert_eq!(records[1].value("email"), Some("new@acme.test"));
}

#[tokio::test]
async fn test_mock_baseline_lookup() {
    let warehouse = fixtures::companies_warehouse().await;
    let columns = fixtures::companies_columns();

    let existing = warehouse.fetch_baseline_row("companies", 1, &columns).await.unwrap();
    assert_eq!(
        existing.and_then(|row| row.get("email").cloned().flatten()),
        Some("old@acme.test".to_string())
    );

    let missing = warehouse.fetch_baseline_row("companies", 2, &columns).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_mock_table_without_timestamps_is_scanned() {
    let warehouse = MockWarehouse::new();
    warehouse.add_table("tags", fixtures::tags_columns()).await;
    warehouse.add_staging_row("tags", &[("id", Some("7")), ("name", Some("steel"))]).await;

    let records = warehouse
        .fetch_staging_records("tags", &fixtures::tags_columns(), &TimestampColumns::default())
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].timestamp_hint, None);
    assert!(records[0].is_new_record);
}

#[tokio::test]
async fn test_mock_introspection_error() {
    let warehouse = fixtures::companies_warehouse().await;
    warehouse
        .add_introspection_error(
            "companies",
            WarehouseError::PermissionDenied("staging.companies".to_string()),
        )
        .await;

    let result = warehouse.describe_columns("companies").await;
    assert!(matches!(result, Err(WarehouseError::PermissionDenied(_))));
}

#[tokio::test]
async fn test_mock_upsert_and_update() {
    let warehouse = fixtures::companies_warehouse().await;
    let columns = fixtures::companies_columns();
    let records = warehouse
        .fetch_staging_records("companies", &columns, &TimestampColumns::default())
        .await
        .unwrap();

    let writes: Vec<BaselineWrite<'_>> = records
        .iter()
        .map(|record| BaselineWrite {
            kind: if record.is_new_record { WriteKind::Upsert } else { WriteKind::Update },
            record,
        })
        .collect();

    let outcome = warehouse.apply_baseline_writes("companies", &columns, &writes).await.unwrap();

    assert_eq!(outcome.applied, 2);
    assert!(outcome.failures.is_empty());
    assert_eq!(warehouse.baseline_len("companies").await, 2);

    let updated = warehouse.baseline_row("companies", 1).await.unwrap();
    assert_eq!(updated.get("email").cloned().flatten(), Some("new@acme.test".to_string()));

    let inserted = warehouse.baseline_row("companies", 2).await.unwrap();
    assert_eq!(inserted.get("name").cloned().flatten(), Some("Globex".to_string()));
    assert_eq!(inserted.get("credit_limit").cloned().flatten(), None);

    let kinds: Vec<WriteKind> = warehouse.write_log().await.into_iter().map(|(_, _, k)| k).collect();
    assert_eq!(kinds, vec![WriteKind::Upsert, WriteKind::Update]);
}

#[tokio::test]
async fn test_mock_connection_failure() {
    let warehouse = MockWarehouse::new().with_connection_failure();

    let err = warehouse
        .fetch_staging_records("companies", &fixtures::companies_columns(), &TimestampColumns::default())
        .await
        .unwrap_err();
    assert!(err.is_connectivity());
}

// =============================================================================
// PostgreSQL Integration Tests (require a database)
// =============================================================================

#[tokio::test]
#[ignore]
async fn test_postgres_connection() {
    if !has_postgres_credentials() {
        eprintln!("Skipping PostgreSQL test: no credentials available");
        eprintln!("Set PGHOST, PGPORT, PGDATABASE, PGUSER, and PGPASSWORD");
        return;
    }

    #[cfg(feature = "postgres")]
    {
        use factsync_catalog::PostgresWarehouse;
        use factsync_core::WarehouseConfig;

        let mut config = WarehouseConfig::default();
        config.apply_env_overrides(|key| std::env::var(key).ok());

        let warehouse = PostgresWarehouse::new(&config).expect("Invalid PostgreSQL configuration");
        warehouse.test_connection().await.expect("Connection test failed");

        println!("PostgreSQL connection successful to {}:{}", config.host, config.port);
    }
}

#[tokio::test]
#[ignore]
async fn test_postgres_describe_staging_table() {
    if !has_postgres_credentials() {
        return;
    }

    #[cfg(feature = "postgres")]
    {
        use factsync_catalog::PostgresWarehouse;
        use factsync_core::WarehouseConfig;

        let mut config = WarehouseConfig::default();
        config.apply_env_overrides(|key| std::env::var(key).ok());
        let table = std::env::var("FACTSYNC_TEST_TABLE").unwrap_or_else(|_| "companies".to_string());

        let warehouse = PostgresWarehouse::new(&config).expect("Invalid PostgreSQL configuration");
        let columns = warehouse
            .describe_columns(&table)
            .await
            .expect("Failed to describe staging table");

        assert!(!columns.is_empty());
        println!("Fetched {} columns from staging.{}:", columns.len(), table);
        for col in &columns {
            println!("  {} ({})", col.name, col.declared_type);
        }
    }
}
