//! The clean → enhance → summarize pipeline and its end-to-end runners.
//!
//! Each stage takes an explicit input collection and returns a new one;
//! nothing is shared or mutated between stages. Outputs are staged and only
//! committed once every stage has succeeded.

pub mod clean;
pub mod enhance;
pub mod types;
pub mod utility;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::CleaningRules;
use crate::error::Result;
use crate::output::OutputStage;
use crate::parser::{read_enhanced_records, read_raw_records};
use crate::report::render_report;
use crate::stats::{SummaryStatistics, summarize};
use clean::{CleanOutcome, RejectionCounts, clean};
use enhance::enhance;

/// Where a full run writes its artifacts.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPaths {
    pub cleaned: PathBuf,
    pub enhanced: PathBuf,
    pub report: PathBuf,
    pub summary_json: Option<PathBuf>,
}

/// What a completed run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub raw_records: usize,
    pub rejections: RejectionCounts,
    pub statistics: SummaryStatistics,
    pub written: Vec<PathBuf>,
}

/// Machine-readable companion to the text report.
#[derive(Debug, Serialize)]
pub struct SummaryDocument<'a> {
    pub generated_at: DateTime<Utc>,
    pub source: String,
    pub raw_records: Option<usize>,
    pub rejections: Option<&'a RejectionCounts>,
    pub summary: &'a SummaryStatistics,
}

/// Runs the whole pipeline on `input` and writes every artifact in `outputs`.
///
/// # Errors
///
/// Input errors abort before anything is staged. Output errors abort before
/// any staged file is renamed into place, except when a rename itself fails
/// part-way through the commit.
#[tracing::instrument(skip_all, fields(input = %input.display()))]
pub fn run(input: &Path, rules: &CleaningRules, outputs: &OutputPaths) -> Result<RunSummary> {
    let raw = read_raw_records(input)?;
    let CleanOutcome {
        records: cleaned,
        rejections,
    } = clean(&raw, rules)?;
    let enhanced = enhance(&cleaned);
    let statistics = summarize(&enhanced);

    let report = render_report(&statistics, Some(&rejections));

    let mut stage = OutputStage::new();
    stage.stage_table(&outputs.cleaned, &cleaned)?;
    stage.stage_table(&outputs.enhanced, &enhanced)?;
    stage.stage_text(&outputs.report, &report)?;
    if let Some(path) = &outputs.summary_json {
        let document = SummaryDocument {
            generated_at: Utc::now(),
            source: input.display().to_string(),
            raw_records: Some(raw.len()),
            rejections: Some(&rejections),
            summary: &statistics,
        };
        stage.stage_json(path, &document)?;
    }
    let written = stage.commit()?;

    info!(
        raw = raw.len(),
        cleaned = cleaned.len(),
        rejected = rejections.total(),
        outputs = written.len(),
        "Pipeline run complete"
    );

    Ok(RunSummary {
        raw_records: raw.len(),
        rejections,
        statistics,
        written,
    })
}

/// Rebuilds the report (and optionally the JSON summary) from a persisted
/// enhanced table, without re-reading the raw input.
#[tracing::instrument(skip_all, fields(enhanced = %enhanced_path.display()))]
pub fn rebuild_report(
    enhanced_path: &Path,
    report_path: &Path,
    summary_json: Option<&Path>,
) -> Result<SummaryStatistics> {
    let enhanced = read_enhanced_records(enhanced_path)?;
    let statistics = summarize(&enhanced);

    let mut stage = OutputStage::new();
    stage.stage_text(report_path, &render_report(&statistics, None))?;
    if let Some(path) = summary_json {
        let document = SummaryDocument {
            generated_at: Utc::now(),
            source: enhanced_path.display().to_string(),
            raw_records: None,
            rejections: None,
            summary: &statistics,
        };
        stage.stage_json(path, &document)?;
    }
    stage.commit()?;

    Ok(statistics)
}
