//! Change detection between staging rows and their baseline counterparts
//!
//! One detector covers both detection modes:
//! - `precise-column-diff` compares every non-metadata column of an existing
//!   record against the baseline row using typed equality
//! - `dictionary-assumed-columns` skips the comparison and assumes every
//!   dictionary-mapped column of the table changed, or every non-metadata
//!   column when the dictionary maps none of them
//!
//! In both modes a record with no baseline row counts as new, and all of its
//! non-metadata columns count as changed.

use factsync_catalog::{TimestampColumns, Warehouse, WarehouseError};
use factsync_core::{
    values_differ, ChangeSet, ChangeType, ColumnDescriptor, DetectionMode, ImpactDictionary,
    PipelineConfig, StagingRecord,
};

/// A staging record together with the changes found in it
#[derive(Debug, Clone)]
pub struct AnalyzedRecord {
    pub record: StagingRecord,
    pub change_set: ChangeSet,

    /// Changed columns were assumed, not compared against the baseline
    pub assumed: bool,
}

impl AnalyzedRecord {
    /// True when a comparison found the record identical to its baseline row
    pub fn is_unchanged(&self) -> bool {
        !self.assumed && self.change_set.is_empty()
    }
}

/// Finds changed staging records and the columns that changed in them
pub struct ChangeDetector<'a> {
    warehouse: &'a dyn Warehouse,
    dictionary: &'a ImpactDictionary,
    config: &'a PipelineConfig,
}

impl<'a> ChangeDetector<'a> {
    pub fn new(
        warehouse: &'a dyn Warehouse,
        dictionary: &'a ImpactDictionary,
        config: &'a PipelineConfig,
    ) -> Self {
        Self {
            warehouse,
            dictionary,
            config,
        }
    }

    pub fn mode(&self) -> DetectionMode {
        self.config.detection_mode
    }

    fn timestamp_columns(&self) -> TimestampColumns {
        TimestampColumns {
            created: self.config.created_column.clone(),
            updated: self.config.updated_column.clone(),
        }
    }

    /// Every staging record of a table, most recently updated first
    ///
    /// Records are classified new or existing by baseline presence. When the
    /// timestamp heuristic disagrees it is logged and otherwise ignored.
    pub async fn find_changed_records(
        &self,
        table: &str,
        columns: &[ColumnDescriptor],
    ) -> Result<Vec<StagingRecord>, WarehouseError> {
        let records = self
            .warehouse
            .fetch_staging_records(table, columns, &self.timestamp_columns())
            .await?;

        for record in records.iter().filter(|r| r.signals_disagree()) {
            tracing::debug!(
                table,
                record_id = record.id,
                classified = %record.change_type(),
                "Timestamp heuristic disagrees with baseline presence"
            );
        }

        tracing::debug!(table, records = records.len(), "Fetched staging records");
        Ok(records)
    }

    /// Columns of `columns` that are compared at all
    fn comparable<'c>(&'c self, columns: &'c [ColumnDescriptor]) -> impl Iterator<Item = &'c ColumnDescriptor> + 'c {
        columns.iter().filter(move |c| !self.config.is_metadata_column(&c.name))
    }

    /// Names of every non-metadata column
    fn all_comparable(&self, columns: &[ColumnDescriptor]) -> Vec<String> {
        self.comparable(columns).map(|c| c.name.clone()).collect()
    }

    /// Changed column names of one record, in column order
    ///
    /// Returns the change type alongside: an existing record whose baseline
    /// row vanished since the scan is treated as new.
    pub async fn compare_columns(
        &self,
        table: &str,
        record: &StagingRecord,
        columns: &[ColumnDescriptor],
    ) -> Result<(ChangeType, Vec<String>), WarehouseError> {
        if record.is_new_record {
            return Ok((ChangeType::Insert, self.all_comparable(columns)));
        }

        match self.config.detection_mode {
            DetectionMode::DictionaryAssumedColumns => {
                let mapped = self.dictionary.mapped_columns(table);
                let assumed = if mapped.is_empty() {
                    self.all_comparable(columns)
                } else {
                    mapped.into_iter().map(str::to_string).collect()
                };
                Ok((ChangeType::Update, assumed))
            }
            DetectionMode::PreciseColumnDiff => {
                let baseline = self
                    .warehouse
                    .fetch_baseline_row(table, record.id, columns)
                    .await?;

                let Some(baseline) = baseline else {
                    tracing::debug!(table, record_id = record.id, "Baseline row disappeared, treating as new");
                    return Ok((ChangeType::Insert, self.all_comparable(columns)));
                };

                let changed = self
                    .comparable(columns)
                    .filter(|c| {
                        let staged = record.value(&c.name);
                        let current = baseline.get(&c.name).and_then(|v| v.as_deref());
                        values_differ(c.declared_type, staged, current)
                    })
                    .map(|c| c.name.clone())
                    .collect();

                Ok((ChangeType::Update, changed))
            }
        }
    }

    /// Analyze one record into its change set
    pub async fn analyze(
        &self,
        table: &str,
        record: StagingRecord,
        columns: &[ColumnDescriptor],
    ) -> Result<AnalyzedRecord, WarehouseError> {
        let (change_type, changed_columns) = self.compare_columns(table, &record, columns).await?;
        let assumed = !record.is_new_record && self.mode() == DetectionMode::DictionaryAssumedColumns;

        let change_set = ChangeSet {
            source_table: table.to_string(),
            record_id: record.id,
            change_type,
            changed_columns,
        };

        Ok(AnalyzedRecord {
            record,
            change_set,
            assumed,
        })
    }
}
