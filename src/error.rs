//! Error types for the analysis pipeline.
//!
//! Record-level validation failures are not errors; they are counted by
//! [`crate::pipeline::clean::RejectionCounts`]. Everything here is fatal to a run.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to read input {path}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("input {0} contains no ride records")]
    EmptyInput(String),

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("input {path} is missing required columns: {}", .missing.join(", "))]
    MissingColumns { path: PathBuf, missing: Vec<String> },

    #[error("invalid config {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("failed to write output {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// True for failures that happened before any output was attempted.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            PipelineError::Input { .. }
                | PipelineError::EmptyInput(_)
                | PipelineError::Csv { .. }
                | PipelineError::MissingColumns { .. }
                | PipelineError::Config { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
