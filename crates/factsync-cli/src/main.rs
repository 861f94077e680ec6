use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use factsync_catalog::{PostgresWarehouse, Warehouse};
use factsync_core::{Config, ImpactDictionary, RunReport};
use factsync_engine::{DbtRunner, ImpactResolver, Pipeline};

/// Staged values longer than this are cut in `analyze` output
const MAX_VALUE_CHARS: usize = 50;

/// FactSync - column-level change detection and targeted fact table rebuilds
#[derive(Parser)]
#[command(name = "factsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: factsync.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect changes, rebuild impacted fact tables and sync the baseline
    Run {
        /// Write the JSON report to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show per-record changes of one table without rebuilding or writing
    Analyze {
        /// Source table to analyze
        table: String,
    },

    /// Test the warehouse connection and show dictionary coverage
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::discover(cli.config.as_deref()).context("Failed to load configuration")?;
    config.warehouse.apply_env_overrides(|key| std::env::var(key).ok());

    let dictionary = config
        .load_dictionary()
        .context("Failed to load impact dictionary")?;
    tracing::debug!(
        dictionary = ?config.dictionary,
        mapped_tables = dictionary.tables().count(),
        "Impact dictionary loaded"
    );

    if cli.verbose {
        eprintln!(
            "{} {} mode, {} tables",
            "Using".cyan(),
            config.pipeline.detection_mode,
            config.pipeline.tables.len()
        );
    }

    let ok = match cli.command {
        Commands::Run { output } => run_command(&config, &dictionary, output.as_deref()).await?,
        Commands::Analyze { table } => analyze_command(&config, &dictionary, &table).await?,
        Commands::Check => check_command(&config, &dictionary).await?,
    };

    if !ok {
        std::process::exit(1);
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` wins over `--verbose`
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn connect(config: &Config) -> Result<PostgresWarehouse> {
    PostgresWarehouse::new(&config.warehouse).context("Invalid warehouse configuration")
}

/// Run command - full pipeline
async fn run_command(config: &Config, dictionary: &ImpactDictionary, output: Option<&Path>) -> Result<bool> {
    let warehouse = connect(config)?;
    let runner = DbtRunner::new(config.dbt.clone());

    let report = Pipeline::new(&warehouse, &runner, dictionary, &config.pipeline)
        .run()
        .await;

    eprint!("{}", run_summary(&report));

    match output {
        Some(path) => {
            report
                .save_to_file(path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            eprintln!("{} {}", "Report saved to:".green(), path.display());
        }
        None => println!("{}", report.to_json()?),
    }

    Ok(report.connection_error.is_none() && report.is_success())
}

/// Analyze command - single-table debug mode
async fn analyze_command(config: &Config, dictionary: &ImpactDictionary, table: &str) -> Result<bool> {
    let warehouse = connect(config)?;
    warehouse
        .test_connection()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to warehouse: {}", e))?;

    let runner = DbtRunner::new(config.dbt.clone());
    let pipeline = Pipeline::new(&warehouse, &runner, dictionary, &config.pipeline);
    let resolver = ImpactResolver::new(dictionary);

    let scan = pipeline.scan_table(table).await?;

    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{} {}", "Change analysis:".bold().bright_blue(), table.bold());
    println!("{}", "=".repeat(60).bright_blue());
    println!();
    println!("Columns:          {}", scan.columns.len());
    println!("Records analyzed: {}", scan.analysis.records_analyzed);
    println!("Records changed:  {}", scan.changed.len());

    for analyzed in &scan.changed {
        let change_set = &analyzed.change_set;
        println!();
        print!(
            "{} {} ({})",
            "Record".bold(),
            change_set.record_id,
            change_set.change_type.to_string().yellow()
        );
        match analyzed.record.timestamp_hint {
            Some(hint) if hint != change_set.change_type => {
                println!(" {}", format!("timestamps suggest {}", hint).dimmed())
            }
            _ => println!(),
        }

        println!("  Changed columns ({}):", change_set.changed_columns.len());
        for column in &change_set.changed_columns {
            let value = analyzed.record.value(column).map(truncate).unwrap_or_else(|| "NULL".to_string());
            println!("    {} = {}", column.cyan(), value);
        }

        let impact = resolver.resolve_change_set(change_set, config.pipeline.detection_mode);
        if impact.is_empty() {
            println!("  {}", "No mapped artifacts".dimmed());
        } else {
            println!("  Targets:");
            for (artifact, targets) in impact.iter() {
                let columns: Vec<String> = targets.iter().map(|t| t.to_string()).collect();
                println!("    {} → {}", artifact.green(), columns.join(", "));
            }
        }
    }

    if !scan.impact.is_empty() {
        println!();
        println!("{}", "Artifacts that would be rebuilt:".bold());
        for artifact in scan.impact.artifacts() {
            println!("  {}", artifact);
        }
    }

    Ok(true)
}

/// Check command - connectivity and dictionary coverage
async fn check_command(config: &Config, dictionary: &ImpactDictionary) -> Result<bool> {
    let warehouse = connect(config)?;

    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "FactSync Check".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    let connected = match warehouse.test_connection().await {
        Ok(()) => {
            println!(
                "{} {} ({} → {})",
                "✓".green(),
                warehouse.name(),
                config.warehouse.staging_schema,
                config.warehouse.baseline_schema
            );
            true
        }
        Err(e) => {
            println!("{} {}", "✗ Connection failed:".red(), e);
            false
        }
    };

    println!();
    println!("{}", "Dictionary coverage:".bold());
    for table in &config.pipeline.tables {
        if dictionary.has_table(table) {
            let artifacts: Vec<&str> = dictionary.artifacts_for_table(table).into_iter().collect();
            println!(
                "  {} {} - {} columns → {}",
                "✓".green(),
                table,
                dictionary.mapped_columns(table).len(),
                artifacts.join(", ")
            );
        } else {
            println!("  {} {} - {}", "-".yellow(), table, "no mappings, baseline sync only".dimmed());
        }
    }

    let unscanned: Vec<&str> = dictionary
        .tables()
        .filter(|t| !config.pipeline.tables.iter().any(|c| c == t))
        .collect();
    if !unscanned.is_empty() {
        println!();
        println!("{} {}", "Mapped but not scanned:".yellow(), unscanned.join(", "));
    }

    Ok(connected)
}

/// Human-readable run summary; stdout is reserved for the JSON report
fn run_summary(report: &RunReport) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = write_run_summary(&mut out, report);
    out
}

fn write_run_summary(out: &mut String, report: &RunReport) -> std::fmt::Result {
    writeln!(out, "\n{}", "=".repeat(60).bright_blue())?;
    writeln!(out, "{}", "FactSync Run Report".bold().bright_blue())?;
    writeln!(out, "{}", "=".repeat(60).bright_blue())?;
    writeln!(out)?;

    if let Some(error) = &report.connection_error {
        writeln!(out, "{} {}", "✗ Warehouse unreachable:".red().bold(), error)?;
        return writeln!(out);
    }

    let status = if report.is_success() {
        report.status.to_string().green().bold()
    } else {
        report.status.to_string().yellow().bold()
    };
    writeln!(out, "Status:           {}", status)?;
    writeln!(out, "Duration:         {:.2}s", report.duration_seconds)?;
    writeln!(out, "Records analyzed: {}", report.records_analyzed)?;
    writeln!(out, "Columns compared: {}", report.columns_compared)?;
    writeln!(out, "Changes detected: {}", report.changes_detected)?;
    writeln!(out)?;

    writeln!(out, "{}", "Rebuilds:".bold())?;
    if report.impact.is_empty() {
        writeln!(out, "  {}", "No impacted artifacts".dimmed())?;
    }
    for artifact in &report.artifacts_succeeded {
        writeln!(out, "  {} {}", "✓".green(), artifact)?;
    }
    for artifact in &report.artifacts_failed {
        writeln!(out, "  {} {}", "✗".red(), artifact)?;
        for line in report.rebuild_diagnostics.get(artifact).into_iter().flatten() {
            writeln!(out, "      {}", line.dimmed())?;
        }
    }
    writeln!(out)?;

    writeln!(out, "{}", "Baseline sync:".bold())?;
    for sync in &report.sync_details {
        if sync.succeeded() {
            writeln!(out, "  {} {} ({} records)", "✓".green(), sync.table, sync.applied)?;
        } else {
            let reason = sync
                .error
                .clone()
                .unwrap_or_else(|| format!("{} of {} records failed", sync.failed, sync.applied + sync.failed));
            writeln!(out, "  {} {} - {}", "✗".red(), sync.table, reason)?;
        }
    }

    if !report.skipped_tables.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", "Skipped tables:".yellow().bold())?;
        for skipped in &report.skipped_tables {
            writeln!(out, "  {} - {}", skipped.table, skipped.reason)?;
        }
    }
    writeln!(out)
}

/// Cut a value to `MAX_VALUE_CHARS` characters
fn truncate(value: &str) -> String {
    if value.chars().count() <= MAX_VALUE_CHARS {
        return value.to_string();
    }
    let cut: String = value.chars().take(MAX_VALUE_CHARS).collect();
    format!("{}...", cut)
}
