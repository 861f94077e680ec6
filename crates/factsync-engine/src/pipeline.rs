//! Pipeline orchestration
//!
//! A run is a single pass over the configured tables:
//!
//! 1. Scan each table: introspect, detect, diff and resolve impact
//! 2. Rebuild every impacted artifact, if any
//! 3. Sync the baseline of every scanned table with changed records
//! 4. Emit the run report
//!
//! A table that cannot be scanned is skipped. Rebuild and sync failures are
//! recorded in the report and never stop the run.

use factsync_catalog::{Warehouse, WarehouseError};
use factsync_core::{
    ColumnDescriptor, ImpactDictionary, ImpactMap, PipelineConfig, RecordAnalysis, RunReport,
    SkippedTable, TableAnalysis,
};
use std::time::Instant;

use crate::detector::{AnalyzedRecord, ChangeDetector};
use crate::rebuild::{ModelRunner, RebuildDispatcher};
use crate::resolver::ImpactResolver;
use crate::sync::BaselineSynchronizer;

/// Why a table was skipped
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Introspection of {table} failed: {source}")]
    Introspection {
        table: String,
        #[source]
        source: WarehouseError,
    },

    #[error("Change detection on {table} failed: {source}")]
    Detection {
        table: String,
        #[source]
        source: WarehouseError,
    },
}

impl ScanError {
    pub fn table(&self) -> &str {
        match self {
            Self::Introspection { table, .. } | Self::Detection { table, .. } => table,
        }
    }

    /// True when the warehouse itself was unreachable
    pub fn is_connectivity(&self) -> bool {
        match self {
            Self::Introspection { source, .. } | Self::Detection { source, .. } => source.is_connectivity(),
        }
    }
}

/// Result of scanning one table
#[derive(Debug, Clone)]
pub struct TableScan {
    pub table: String,

    /// Introspected staging columns
    pub columns: Vec<ColumnDescriptor>,

    /// Records with at least one changed column, in scan order
    pub changed: Vec<AnalyzedRecord>,

    /// Report detail; `analysis.changes[i]` describes `changed[i]`
    pub analysis: TableAnalysis,

    /// Union of the impact of every changed record
    pub impact: ImpactMap,
}

impl TableScan {
    /// Number of changed columns over all records
    pub fn changes_detected(&self) -> usize {
        self.changed.iter().map(|r| r.change_set.changed_columns.len()).sum()
    }
}

/// Sequences detection, rebuild and sync over the configured tables
pub struct Pipeline<'a> {
    warehouse: &'a dyn Warehouse,
    runner: &'a dyn ModelRunner,
    dictionary: &'a ImpactDictionary,
    config: &'a PipelineConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        warehouse: &'a dyn Warehouse,
        runner: &'a dyn ModelRunner,
        dictionary: &'a ImpactDictionary,
        config: &'a PipelineConfig,
    ) -> Self {
        Self {
            warehouse,
            runner,
            dictionary,
            config,
        }
    }

    /// Detect changes in one table and resolve their impact
    ///
    /// Read-only: nothing is rebuilt or written.
    pub async fn scan_table(&self, table: &str) -> Result<TableScan, ScanError> {
        let detector = ChangeDetector::new(self.warehouse, self.dictionary, self.config);
        let resolver = ImpactResolver::new(self.dictionary);

        let columns = self
            .warehouse
            .describe_columns(table)
            .await
            .map_err(|source| ScanError::Introspection {
                table: table.to_string(),
                source,
            })?;

        let detection_error = |source: WarehouseError| ScanError::Detection {
            table: table.to_string(),
            source,
        };

        let records = detector
            .find_changed_records(table, &columns)
            .await
            .map_err(detection_error)?;

        let mut analysis = TableAnalysis {
            table: table.to_string(),
            records_analyzed: records.len(),
            columns_per_record: columns.len(),
            changes: Vec::new(),
        };
        let mut changed = Vec::new();
        let mut impact = ImpactMap::new();

        for record in records {
            let analyzed = detector
                .analyze(table, record, &columns)
                .await
                .map_err(detection_error)?;

            if analyzed.is_unchanged() {
                tracing::debug!(table, record_id = analyzed.record.id, "No changes");
                continue;
            }

            let record_impact = resolver.resolve_change_set(&analyzed.change_set, detector.mode());
            tracing::debug!(
                table,
                record_id = analyzed.record.id,
                change_type = %analyzed.change_set.change_type,
                changed = ?analyzed.change_set.changed_columns,
                artifacts = record_impact.len(),
                "Record changed"
            );

            analysis.changes.push(RecordAnalysis {
                record_id: analyzed.record.id,
                change_type: analyzed.change_set.change_type,
                timestamp_hint: analyzed.record.timestamp_hint,
                changed_columns: analyzed.change_set.changed_columns.clone(),
                targeted_artifacts: record_impact.artifacts().map(str::to_string).collect(),
            });
            impact.merge(record_impact);
            changed.push(analyzed);
        }

        if !changed.is_empty() && !self.dictionary.has_table(table) {
            tracing::info!(table, "No impact dictionary entry, changes only sync the baseline");
        }

        tracing::info!(
            table,
            records = analysis.records_analyzed,
            changed = changed.len(),
            artifacts = impact.len(),
            "Scanned"
        );

        Ok(TableScan {
            table: table.to_string(),
            columns,
            changed,
            analysis,
            impact,
        })
    }

    /// Run the full pipeline and return its report
    pub async fn run(&self) -> RunReport {
        let start = Instant::now();
        let mut report = RunReport::new(self.config.detection_mode);

        if let Err(e) = self.warehouse.test_connection().await {
            tracing::warn!(warehouse = self.warehouse.name(), error = %e, "Warehouse unreachable, nothing processed");
            report.connection_error = Some(e.to_string());
            return report.finish(start.elapsed().as_secs_f64());
        }

        tracing::info!(
            tables = self.config.tables.len(),
            mode = %self.config.detection_mode,
            "Scanning tables"
        );

        let mut scans = Vec::new();
        for table in &self.config.tables {
            match self.scan_table(table).await {
                Ok(scan) => {
                    report.records_analyzed += scan.analysis.records_analyzed;
                    report.columns_compared += scan.analysis.records_analyzed * scan.columns.len();
                    report.changes_detected += scan.changes_detected();
                    report.impact.merge(scan.impact.clone());
                    report.tables.push(scan.analysis.clone());
                    scans.push(scan);
                }
                Err(e) => {
                    if e.is_connectivity() {
                        tracing::warn!(table = %table, error = %e, "Warehouse connection lost, skipping table");
                    } else {
                        tracing::warn!(table = %table, error = %e, "Skipping table");
                    }
                    report.skipped_tables.push(SkippedTable {
                        table: e.table().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if report.impact.is_empty() {
            tracing::info!("No impacted artifacts, skipping rebuilds");
        } else {
            tracing::info!(artifacts = report.impact.len(), "Rebuilding impacted artifacts");
            let dispatcher = RebuildDispatcher::new(self.runner);

            for outcome in dispatcher.dispatch(&report.impact).await {
                match outcome.error {
                    None => report.artifacts_succeeded.push(outcome.artifact),
                    Some(error) => {
                        report.rebuild_diagnostics.insert(outcome.artifact.clone(), error.diagnostics());
                        report.artifacts_failed.push(outcome.artifact);
                    }
                }
            }
        }

        let synchronizer = BaselineSynchronizer::new(self.warehouse);
        for scan in scans.iter().filter(|s| !s.changed.is_empty()) {
            let sync = synchronizer.sync_baseline(&scan.table, &scan.columns, &scan.changed).await;
            report.add_sync(sync);
        }

        let report = report.finish(start.elapsed().as_secs_f64());
        tracing::info!(
            status = %report.status,
            duration_seconds = report.duration_seconds,
            artifacts_failed = report.artifacts_failed.len(),
            sync_failed = report.sync_failed.len(),
            "Run complete"
        );
        report
    }
}
