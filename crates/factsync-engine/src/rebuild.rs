//! Rebuild dispatch: one dbt run per impacted artifact
//!
//! Failures never abort the dispatch. Each artifact's outcome is collected
//! and the remaining artifacts are still rebuilt.

use factsync_core::{DbtConfig, ImpactMap};
use std::process::Stdio;
use std::time::Duration;

/// Keywords marking a diagnostic line in build tool stderr
const FAILURE_KEYWORDS: [&str; 3] = ["error", "fail", "exception"];

/// Diagnostic lines kept per failed artifact
const MAX_DIAGNOSTIC_LINES: usize = 2;

/// Errors from rebuilding one artifact
#[derive(Debug, Clone, thiserror::Error)]
pub enum RebuildError {
    #[error("Failed to start {command}: {message}")]
    Spawn { command: String, message: String },

    #[error("Rebuild of {artifact} timed out after {seconds}s")]
    Timeout { artifact: String, seconds: u64 },

    #[error("Rebuild of {artifact} failed with {status}")]
    Failed {
        artifact: String,
        status: String,
        diagnostics: Vec<String>,
    },
}

impl RebuildError {
    /// Stderr lines worth showing for this failure
    pub fn diagnostics(&self) -> Vec<String> {
        match self {
            Self::Failed { diagnostics, .. } => diagnostics.clone(),
            other => vec![other.to_string()],
        }
    }
}

/// Runs the build for a single named artifact
#[async_trait::async_trait]
pub trait ModelRunner: Send + Sync {
    /// Rebuild exactly one artifact; `Ok` iff the build tool succeeded
    async fn run_model(&self, artifact: &str) -> Result<(), RebuildError>;
}

/// Invokes `dbt run --select <artifact>` without a shell
#[derive(Debug, Clone)]
pub struct DbtRunner {
    config: DbtConfig,
}

impl DbtRunner {
    pub fn new(config: DbtConfig) -> Self {
        Self { config }
    }

    /// Arguments passed to the executable for one artifact
    pub fn command_args(&self, artifact: &str) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--select".to_string(),
            artifact.to_string(),
            "--target".to_string(),
            self.config.target.clone(),
        ];

        if let Some(dir) = &self.config.project_dir {
            args.push("--project-dir".to_string());
            args.push(dir.display().to_string());
        }
        if let Some(dir) = &self.config.profiles_dir {
            args.push("--profiles-dir".to_string());
            args.push(dir.display().to_string());
        }

        args
    }
}

#[async_trait::async_trait]
impl ModelRunner for DbtRunner {
    async fn run_model(&self, artifact: &str) -> Result<(), RebuildError> {
        let args = self.command_args(artifact);
        tracing::debug!(executable = %self.config.executable, ?args, "Running dbt");

        let output = tokio::process::Command::new(&self.config.executable)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match self.config.timeout_secs {
            Some(seconds) => tokio::time::timeout(Duration::from_secs(seconds), output)
                .await
                .map_err(|_| RebuildError::Timeout {
                    artifact: artifact.to_string(),
                    seconds,
                })?,
            None => output.await,
        }
        .map_err(|e| RebuildError::Spawn {
            command: self.config.executable.clone(),
            message: e.to_string(),
        })?;

        if output.status.success() {
            return Ok(());
        }

        Err(RebuildError::Failed {
            artifact: artifact.to_string(),
            status: output.status.to_string(),
            diagnostics: failure_lines(&String::from_utf8_lossy(&output.stderr)),
        })
    }
}

/// The last few stderr lines mentioning a failure keyword
pub fn failure_lines(stderr: &str) -> Vec<String> {
    let matching: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| {
            let lower = line.to_lowercase();
            FAILURE_KEYWORDS.iter().any(|k| lower.contains(k))
        })
        .collect();

    let skip = matching.len().saturating_sub(MAX_DIAGNOSTIC_LINES);
    matching[skip..].iter().map(|line| line.to_string()).collect()
}

/// Outcome of rebuilding one artifact
#[derive(Debug, Clone)]
pub struct RebuildOutcome {
    pub artifact: String,
    pub error: Option<RebuildError>,
}

impl RebuildOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Rebuilds impacted artifacts one at a time
pub struct RebuildDispatcher<'a> {
    runner: &'a dyn ModelRunner,
}

impl<'a> RebuildDispatcher<'a> {
    pub fn new(runner: &'a dyn ModelRunner) -> Self {
        Self { runner }
    }

    /// Rebuild one artifact, converting any failure into the outcome
    pub async fn rebuild(&self, artifact: &str) -> RebuildOutcome {
        match self.runner.run_model(artifact).await {
            Ok(()) => {
                tracing::info!(artifact, "Rebuilt");
                RebuildOutcome {
                    artifact: artifact.to_string(),
                    error: None,
                }
            }
            Err(error) => {
                tracing::warn!(artifact, error = %error, "Rebuild failed");
                RebuildOutcome {
                    artifact: artifact.to_string(),
                    error: Some(error),
                }
            }
        }
    }

    /// Rebuild every artifact of the impact map, in name order
    pub async fn dispatch(&self, impact: &ImpactMap) -> Vec<RebuildOutcome> {
        let mut outcomes = Vec::with_capacity(impact.len());
        for artifact in impact.artifacts() {
            outcomes.push(self.rebuild(artifact).await);
        }
        outcomes
    }
}
