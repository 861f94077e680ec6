//! Baseline synchronization after rebuilds
//!
//! New records are upserted, existing ones updated by id. A failing record
//! does not stop the others and the batch is committed once per table, so a
//! table reported as failed may still have most of its rows written.

use factsync_catalog::{BaselineWrite, Warehouse, WriteKind};
use factsync_core::{ChangeType, ColumnDescriptor, TableSync};

use crate::detector::AnalyzedRecord;

/// Writes analyzed staging records back to the baseline
pub struct BaselineSynchronizer<'a> {
    warehouse: &'a dyn Warehouse,
}

impl<'a> BaselineSynchronizer<'a> {
    pub fn new(warehouse: &'a dyn Warehouse) -> Self {
        Self { warehouse }
    }

    fn write_kind(record: &AnalyzedRecord) -> WriteKind {
        match record.change_set.change_type {
            ChangeType::Insert => WriteKind::Upsert,
            ChangeType::Update => WriteKind::Update,
        }
    }

    /// Sync one table; succeeds only if every record was written
    pub async fn sync_baseline(
        &self,
        table: &str,
        columns: &[ColumnDescriptor],
        records: &[AnalyzedRecord],
    ) -> TableSync {
        if records.is_empty() {
            return TableSync {
                table: table.to_string(),
                applied: 0,
                failed: 0,
                error: None,
            };
        }

        let writes: Vec<BaselineWrite<'_>> = records
            .iter()
            .map(|r| BaselineWrite {
                kind: Self::write_kind(r),
                record: &r.record,
            })
            .collect();

        match self.warehouse.apply_baseline_writes(table, columns, &writes).await {
            Ok(outcome) => {
                for failure in &outcome.failures {
                    tracing::warn!(table, record_id = failure.record_id, error = %failure.error, "Record sync failed");
                }

                if outcome.failures.is_empty() {
                    tracing::info!(table, records = outcome.applied, "Baseline synced");
                } else {
                    tracing::warn!(
                        table,
                        applied = outcome.applied,
                        failed = outcome.failures.len(),
                        "Baseline partially synced"
                    );
                }

                TableSync {
                    table: table.to_string(),
                    applied: outcome.applied,
                    failed: outcome.failures.len(),
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(table, error = %e, "Baseline sync failed");
                TableSync {
                    table: table.to_string(),
                    applied: 0,
                    failed: records.len(),
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use factsync_catalog::mock::row;
    use factsync_catalog::MockWarehouse;
    use factsync_core::{ChangeSet, StagingRecord};

    fn columns() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("id", "integer", 1),
            ColumnDescriptor::new("name", "text", 2),
        ]
    }

    fn analyzed(id: i64, change_type: ChangeType, name: &str) -> AnalyzedRecord {
        let id_text = id.to_string();
        let record = StagingRecord::new(
            "tags",
            id,
            row(&[("id", Some(id_text.as_str())), ("name", Some(name))]),
            change_type == ChangeType::Insert,
        );
        AnalyzedRecord {
            change_set: ChangeSet {
                source_table: "tags".to_string(),
                record_id: id,
                change_type,
                changed_columns: vec!["name".to_string()],
            },
            record,
            assumed: false,
        }
    }

    #[tokio::test]
    async fn inserts_and_updates() {
        let warehouse = MockWarehouse::new();
        warehouse.add_table("tags", columns()).await;
        warehouse.add_baseline_row("tags", &[("id", Some("1")), ("name", Some("old"))]).await;

        let synchronizer = BaselineSynchronizer::new(&warehouse);
        let records = vec![
            analyzed(1, ChangeType::Update, "new"),
            analyzed(2, ChangeType::Insert, "fresh"),
        ];

        let sync = synchronizer.sync_baseline("tags", &columns(), &records).await;

        assert!(sync.succeeded());
        assert_eq!(sync.applied, 2);
        assert_eq!(
            warehouse.baseline_row("tags", 1).await.unwrap().get("name").cloned().flatten(),
            Some("new".to_string())
        );
        assert!(warehouse.baseline_row("tags", 2).await.is_some());
        let kinds: Vec<WriteKind> = warehouse.write_log().await.into_iter().map(|(_, _, k)| k).collect();
        assert_eq!(kinds, vec![WriteKind::Update, WriteKind::Upsert]);
    }

    #[tokio::test]
    async fn failed_batch_marks_every_record_failed() {
        let warehouse = MockWarehouse::new();
        warehouse.add_table("tags", columns()).await;
        let synchronizer = BaselineSynchronizer::new(&warehouse);
        let records = vec![analyzed(1, ChangeType::Insert, "a")];

        // Unknown table: nothing reaches commit
        let sync = synchronizer.sync_baseline("labels", &columns(), &records).await;

        assert!(!sync.succeeded());
        assert_eq!(sync.failed, 1);
        assert!(sync.error.unwrap().contains("labels"));
    }

    #[tokio::test]
    async fn empty_batch_touches_nothing() {
        let warehouse = MockWarehouse::new().with_connection_failure();
        let synchronizer = BaselineSynchronizer::new(&warehouse);

        let sync = synchronizer.sync_baseline("tags", &columns(), &[]).await;

        assert!(sync.succeeded());
        assert_eq!(sync.applied, 0);
    }
}
