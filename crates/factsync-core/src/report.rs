//! Run report schema (stable v1)
//!
//! This schema is STABLE and VERSIONED.
//! Breaking changes require a new version.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::DetectionMode;
use crate::impact::ImpactMap;
use crate::record::ChangeType;

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Overall outcome of a run
///
/// There is no failed state: every stage degrades to partial results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// No rebuild and no sync failed
    Success,

    /// At least one rebuild or sync failed
    PartialSuccess,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::PartialSuccess => write!(f, "partial_success"),
        }
    }
}

/// Per-record analysis detail, kept only for records that changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordAnalysis {
    pub record_id: i64,
    pub change_type: ChangeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_hint: Option<ChangeType>,
    pub changed_columns: Vec<String>,
    pub targeted_artifacts: Vec<String>,
}

/// Per-table analysis detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableAnalysis {
    pub table: String,
    pub records_analyzed: usize,
    pub columns_per_record: usize,
    pub changes: Vec<RecordAnalysis>,
}

/// A table that was not scanned this run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedTable {
    pub table: String,
    pub reason: String,
}

/// Outcome of syncing one table's baseline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSync {
    pub table: String,
    pub applied: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TableSync {
    /// True when every record was written and committed
    pub fn succeeded(&self) -> bool {
        self.failed == 0 && self.error.is_none()
    }
}

/// Run report (report.json v1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Schema version
    pub version: ReportVersion,

    /// Timestamp (ISO 8601) of report creation
    pub timestamp: String,

    /// Overall status
    pub status: RunStatus,

    /// Detection strategy used
    pub detection_mode: DetectionMode,

    /// Wall-clock duration of the run
    pub duration_seconds: f64,

    /// Staging records examined
    pub records_analyzed: usize,

    /// Column comparisons performed (columns per record, summed)
    pub columns_compared: usize,

    /// Changed columns found, summed over records
    pub changes_detected: usize,

    /// Artifacts rebuilt successfully
    pub artifacts_succeeded: Vec<String>,

    /// Artifacts whose rebuild failed
    pub artifacts_failed: Vec<String>,

    /// Diagnostic lines captured from failed rebuilds
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rebuild_diagnostics: BTreeMap<String, Vec<String>>,

    /// Tables whose baseline sync succeeded
    pub sync_succeeded: Vec<String>,

    /// Tables whose baseline sync failed (some writes may have been applied)
    pub sync_failed: Vec<String>,

    /// Per-table sync detail
    #[serde(default)]
    pub sync_details: Vec<TableSync>,

    /// Artifact → impacted target columns
    pub impact: ImpactMap,

    /// Per-table analysis detail
    #[serde(default)]
    pub tables: Vec<TableAnalysis>,

    /// Tables skipped because introspection or detection failed
    #[serde(default)]
    pub skipped_tables: Vec<SkippedTable>,

    /// Set when the warehouse was unreachable at startup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_error: Option<String>,
}

impl RunReport {
    /// Create a new empty report
    pub fn new(detection_mode: DetectionMode) -> Self {
        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            status: RunStatus::Success,
            detection_mode,
            duration_seconds: 0.0,
            records_analyzed: 0,
            columns_compared: 0,
            changes_detected: 0,
            artifacts_succeeded: Vec::new(),
            artifacts_failed: Vec::new(),
            rebuild_diagnostics: BTreeMap::new(),
            sync_succeeded: Vec::new(),
            sync_failed: Vec::new(),
            sync_details: Vec::new(),
            impact: ImpactMap::new(),
            tables: Vec::new(),
            skipped_tables: Vec::new(),
            connection_error: None,
        }
    }

    /// Record a table sync outcome in the success or failure list
    pub fn add_sync(&mut self, sync: TableSync) {
        if sync.succeeded() {
            self.sync_succeeded.push(sync.table.clone());
        } else {
            self.sync_failed.push(sync.table.clone());
        }
        self.sync_details.push(sync);
    }

    /// Set duration and derive the final status
    pub fn finish(mut self, duration_seconds: f64) -> Self {
        self.duration_seconds = duration_seconds;
        self.status = if self.artifacts_failed.is_empty() && self.sync_failed.is_empty() {
            RunStatus::Success
        } else {
            RunStatus::PartialSuccess
        };
        self
    }

    /// Check if the run completed without failures
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report_is_success() {
        let report = RunReport::new(DetectionMode::PreciseColumnDiff).finish(0.5);
        assert_eq!(report.version, ReportVersion::CURRENT);
        assert_eq!(report.status, RunStatus::Success);
        assert!(report.is_success());
    }

    #[test]
    fn failed_artifact_is_partial_success() {
        let mut report = RunReport::new(DetectionMode::PreciseColumnDiff);
        report.artifacts_succeeded.push("fact_vendor".to_string());
        report.artifacts_failed.push("fact_financial".to_string());

        let report = report.finish(1.0);
        assert_eq!(report.status, RunStatus::PartialSuccess);
    }

    #[test]
    fn failed_sync_is_partial_success() {
        let mut report = RunReport::new(DetectionMode::PreciseColumnDiff);
        report.add_sync(TableSync {
            table: "companies".to_string(),
            applied: 9,
            failed: 1,
            error: None,
        });
        report.add_sync(TableSync {
            table: "tags".to_string(),
            applied: 2,
            failed: 0,
            error: None,
        });

        assert_eq!(report.sync_failed, vec!["companies"]);
        assert_eq!(report.sync_succeeded, vec!["tags"]);
        assert_eq!(report.finish(0.0).status, RunStatus::PartialSuccess);
    }

    #[test]
    fn report_serialization() {
        let report = RunReport::new(DetectionMode::DictionaryAssumedColumns).finish(0.0);
        let json = report.to_json().unwrap();
        assert!(json.contains("\"status\": \"success\""));
        assert!(json.contains("\"detection_mode\": \"dictionary-assumed-columns\""));
        assert!(!json.contains("connection_error"));
    }
}
