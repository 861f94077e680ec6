//! FactSync engine - change detection and impact propagation
//!
//! This crate implements the pipeline stages:
//! - Change detection with typed column equality
//! - Impact resolution through the impact dictionary
//! - Rebuild dispatch to dbt
//! - Baseline synchronization
//! - Orchestration into a run report

pub mod detector;
pub mod resolver;
pub mod rebuild;
pub mod sync;
pub mod pipeline;

pub use detector::{AnalyzedRecord, ChangeDetector};
pub use resolver::ImpactResolver;
pub use rebuild::{DbtRunner, ModelRunner, RebuildDispatcher, RebuildError, RebuildOutcome};
pub use sync::BaselineSynchronizer;
pub use pipeline::{Pipeline, ScanError, TableScan};
