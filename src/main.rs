//! CLI entry point for the ride fare analyzer.
//!
//! Provides subcommands for running the full clean → enhance → summarize
//! pipeline, rebuilding the report from a persisted enhanced table, and
//! inspecting the effective cleaning rules.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fare_analyzer::config::CleaningRules;
use fare_analyzer::pipeline::{OutputPaths, rebuild_report, run};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "fare_analyzer")]
#[command(about = "Clean, enrich and summarize a ride fare CSV", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline on a raw ride CSV (optionally .gz)
    Run {
        /// Raw ride table
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Destination of the cleaned table
        #[arg(long, default_value = "Data/cleaned/rides_cleaned.csv")]
        cleaned: PathBuf,

        /// Destination of the enhanced table
        #[arg(long, default_value = "Data/enhanced/rides_enhanced.csv")]
        enhanced: PathBuf,

        /// Destination of the text report
        #[arg(short, long, default_value = "Documents/analysis_report.txt")]
        report: PathBuf,

        /// Optional: also write summary statistics as JSON
        #[arg(long)]
        summary_json: Option<PathBuf>,

        /// Optional: JSON file overriding the cleaning thresholds
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Rebuild the report from a previously written enhanced table
    Report {
        /// Enhanced table produced by `run`
        #[arg(value_name = "ENHANCED_CSV")]
        enhanced: PathBuf,

        /// Destination of the text report
        #[arg(short, long, default_value = "Documents/analysis_report.txt")]
        output: PathBuf,

        /// Optional: also write summary statistics as JSON
        #[arg(long)]
        summary_json: Option<PathBuf>,
    },
    /// Print the effective cleaning rules as JSON
    CheckConfig {
        /// Optional: JSON file overriding the cleaning thresholds
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let _log_guard = init_logging()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            input,
            cleaned,
            enhanced,
            report,
            summary_json,
            config,
        } => {
            let rules = CleaningRules::load_or_default(config.as_deref())
                .context("Failed to load cleaning rules")?;
            let outputs = OutputPaths {
                cleaned,
                enhanced,
                report,
                summary_json,
            };

            let summary = run(&input, &rules, &outputs)
                .with_context(|| format!("Analysis of {} failed", input.display()))?;

            let stats = &summary.statistics;
            info!(
                raw = summary.raw_records,
                cleaned = stats.record_count,
                rejected = summary.rejections.total(),
                mean_fare = %format!("{:.2}", stats.fare.mean),
                outlier_pct = %format!("{:.1}", stats.outliers.percent),
                "Analysis complete"
            );
            for path in &summary.written {
                info!(path = %path.display(), "Artifact");
            }
        }
        Commands::Report {
            enhanced,
            output,
            summary_json,
        } => {
            let stats = rebuild_report(&enhanced, &output, summary_json.as_deref())
                .with_context(|| format!("Report rebuild from {} failed", enhanced.display()))?;
            info!(
                records = stats.record_count,
                report = %output.display(),
                "Report rebuilt"
            );
        }
        Commands::CheckConfig { config } => {
            let rules = CleaningRules::load_or_default(config.as_deref())
                .context("Failed to load cleaning rules")?;
            println!("{}", serde_json::to_string_pretty(&rules)?);
        }
    }

    Ok(())
}

/// Logging setup: colored stderr + JSON rolling log file.
///
/// The returned guard must live until exit so the file writer flushes.
fn init_logging() -> Result<WorkerGuard> {
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/fare_analyzer.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("fare_analyzer.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    Ok(guard)
}
