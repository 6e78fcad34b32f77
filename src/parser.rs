//! CSV ingestion for raw ride tables and persisted enhanced tables.

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use csv::StringRecord;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::pipeline::types::{EnhancedRecord, RawRecord};

/// Columns a raw ride table must declare in its header.
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "fare_amount",
    "pickup_datetime",
    "pickup_longitude",
    "pickup_latitude",
    "dropoff_longitude",
    "dropoff_latitude",
    "passenger_count",
];

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f %z", "%Y-%m-%d %H:%M:%S%.f%z"];
const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"];

/// Parses a pickup timestamp, keeping its offset.
///
/// Accepts RFC 3339, `2009-06-15 17:26:21 +0000`, and the dataset's native
/// `2009-06-15 17:26:21 UTC`. A timestamp with no zone is taken as UTC.
/// Returns `None` for anything else.
pub fn parse_pickup_datetime(raw: &str) -> Option<DateTime<FixedOffset>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }

    let naive = s
        .strip_suffix("UTC")
        .or_else(|| s.strip_suffix('Z'))
        .unwrap_or(s)
        .trim_end();
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .map(|dt| dt.and_utc().fixed_offset())
}

/// Opens `path` for reading, gunzipping transparently when it ends in `.gz`.
fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).map_err(|source| PipelineError::Input {
        path: path.to_path_buf(),
        source,
    })?;

    let is_gzip = path.extension().and_then(|e| e.to_str()) == Some("gz");
    debug!(path = %path.display(), is_gzip, "Opened input");

    if is_gzip {
        Ok(Box::new(GzDecoder::new(BufReader::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn csv_reader(path: &Path) -> Result<csv::Reader<Box<dyn Read>>> {
    Ok(csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(open_input(path)?))
}

fn csv_error(path: &Path) -> impl Fn(csv::Error) -> PipelineError + '_ {
    move |source| PipelineError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

/// Reads every row of a raw ride table.
///
/// Rows whose fields fail to parse are kept with those fields missing. A field
/// that is not valid UTF-8 is read as empty, so it only fails the check that
/// looks at that field.
///
/// # Errors
///
/// [`PipelineError::Input`] / [`PipelineError::Csv`] if the file cannot be
/// read, [`PipelineError::MissingColumns`] if the header lacks a required
/// column, and [`PipelineError::EmptyInput`] if there are no data rows.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn read_raw_records(path: &Path) -> Result<Vec<RawRecord>> {
    let mut rdr = csv_reader(path)?;

    let headers = rdr.headers().map_err(csv_error(path))?.clone();
    if headers.is_empty() {
        return Err(PipelineError::EmptyInput(path.display().to_string()));
    }

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !headers.iter().any(|h| h == **c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::MissingColumns {
            path: path.to_path_buf(),
            missing,
        });
    }

    let mut rows = Vec::new();
    let mut undecodable_fields = 0usize;

    for result in rdr.byte_records() {
        let bytes = result.map_err(csv_error(path))?;

        let mut record = StringRecord::with_capacity(bytes.as_slice().len(), headers.len());
        for field in &bytes {
            match std::str::from_utf8(field) {
                Ok(text) => record.push_field(text),
                Err(_) => {
                    undecodable_fields += 1;
                    record.push_field("");
                }
            }
        }

        // short rows: missing trailing fields read as empty
        while record.len() < headers.len() {
            record.push_field("");
        }

        match record.deserialize::<RawRecord>(Some(&headers)) {
            Ok(raw) => rows.push(raw),
            Err(e) => {
                warn!(error = %e, "Undeserializable row kept as empty record");
                rows.push(RawRecord::default());
            }
        }
    }

    if rows.is_empty() {
        return Err(PipelineError::EmptyInput(path.display().to_string()));
    }
    if undecodable_fields > 0 {
        warn!(fields = undecodable_fields, "Non UTF-8 fields read as missing");
    }

    info!(rows = rows.len(), "Raw records loaded");
    Ok(rows)
}

/// Reads a previously written enhanced table.
///
/// Unlike raw ingestion, this is strict: the file was produced by this crate,
/// so any malformed row is a [`PipelineError::Csv`]. A table with a header and
/// no rows (every ride rejected) reads as empty.
///
/// # Errors
///
/// [`PipelineError::EmptyInput`] if the file has no header at all.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn read_enhanced_records(path: &Path) -> Result<Vec<EnhancedRecord>> {
    let mut rdr = csv_reader(path)?;
    if rdr.headers().map_err(csv_error(path))?.is_empty() {
        return Err(PipelineError::EmptyInput(path.display().to_string()));
    }

    let rows = rdr
        .deserialize::<EnhancedRecord>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(csv_error(path))?;

    info!(rows = rows.len(), "Enhanced records loaded");
    Ok(rows)
}
