//! Output persistence for the run's tables and report.
//!
//! Every artifact is first written to a temporary file next to its
//! destination. Only [`OutputStage::commit`] renames them into place, so an
//! aborted run leaves no half-written file under a final name.

use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::pipeline::types::TableRow;

/// Artifacts written to temporary files and waiting to be moved into place.
#[derive(Default)]
pub struct OutputStage {
    pending: Vec<(PathBuf, NamedTempFile)>,
}

impl OutputStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages `rows` as a CSV table. The header row is always written, even
    /// when `rows` is empty.
    pub fn stage_table<T: TableRow>(&mut self, path: &Path, rows: &[T]) -> Result<()> {
        let mut temp = temp_file_for(path)?;
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(&mut temp);
            writer
                .write_record(T::COLUMNS)
                .map_err(|e| output_error(path, e.into()))?;
            for row in rows {
                writer
                    .serialize(row)
                    .map_err(|e| output_error(path, e.into()))?;
            }
            writer.flush().map_err(|e| output_error(path, e))?;
        }
        debug!(path = %path.display(), rows = rows.len(), "Staged CSV table");
        self.push(path, temp)
    }

    pub fn stage_text(&mut self, path: &Path, text: &str) -> Result<()> {
        let mut temp = temp_file_for(path)?;
        temp.write_all(text.as_bytes())
            .map_err(|e| output_error(path, e))?;
        debug!(path = %path.display(), bytes = text.len(), "Staged text");
        self.push(path, temp)
    }

    /// Stages `value` as pretty-printed JSON.
    pub fn stage_json<T: Serialize>(&mut self, path: &Path, value: &T) -> Result<()> {
        let mut temp = temp_file_for(path)?;
        serde_json::to_writer_pretty(&mut temp, value)
            .map_err(|e| output_error(path, e.into()))?;
        temp.write_all(b"\n").map_err(|e| output_error(path, e))?;
        self.push(path, temp)
    }

    /// Moves every staged file to its destination, in staging order.
    pub fn commit(self) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.pending.len());
        for (path, temp) in self.pending {
            temp.persist(&path)
                .map_err(|e| output_error(&path, e.error))?;
            info!(path = %path.display(), "Output written");
            written.push(path);
        }
        Ok(written)
    }

    fn push(&mut self, path: &Path, temp: NamedTempFile) -> Result<()> {
        temp.as_file()
            .sync_all()
            .map_err(|e| output_error(path, e))?;
        self.pending.push((path.to_path_buf(), temp));
        Ok(())
    }
}

/// Creates the destination directory and a temporary file inside it, so the
/// final rename never crosses filesystems.
fn temp_file_for(path: &Path) -> Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| output_error(path, e))?;
    NamedTempFile::new_in(dir).map_err(|e| output_error(path, e))
}

fn output_error(path: &Path, source: std::io::Error) -> PipelineError {
    PipelineError::Output {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use std::fs;

    #[derive(Serialize)]
    struct Row {
        name: &'static str,
        value: f64,
    }

    impl TableRow for Row {
        const COLUMNS: &'static [&'static str] = &["name", "value"];
    }

    fn write_table(path: &Path, rows: &[Row]) -> Result<Vec<PathBuf>> {
        let mut stage = OutputStage::new();
        stage.stage_table(path, rows)?;
        stage.commit()
    }

    fn rows() -> Vec<Row> {
        vec![
            Row {
                name: "a",
                value: 1.5,
            },
            Row {
                name: "b",
                value: 2.0,
            },
        ]
    }

    #[test]
    fn test_write_table_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.csv");

        write_table(&path, &rows()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines, vec!["name,value", "a,1.5", "b,2.0"]);
    }

    #[test]
    fn test_empty_table_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.csv");

        write_table(&path, &[]).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "name,value\n");
    }

    #[test]
    fn test_write_table_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Data").join("cleaned").join("rides.csv");

        write_table(&path, &rows()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_nothing_visible_before_commit() {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("table.csv");
        let report = dir.path().join("report.txt");

        let mut stage = OutputStage::new();
        stage.stage_table(&table, &rows()).unwrap();
        stage.stage_text(&report, "hello\n").unwrap();
        assert!(!table.exists());
        assert!(!report.exists());

        let written = stage.commit().unwrap();
        assert_eq!(written, vec![table.clone(), report.clone()]);
        assert_eq!(fs::read_to_string(&report).unwrap(), "hello\n");
    }

    #[test]
    fn test_dropped_stage_leaves_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("table.csv");

        {
            let mut stage = OutputStage::new();
            stage.stage_table(&table, &rows()).unwrap();
        }

        assert!(!table.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_commit_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        fs::write(&path, "old").unwrap();

        let mut stage = OutputStage::new();
        stage.stage_text(&path, "new").unwrap();
        stage.commit().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_stage_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");

        let mut stage = OutputStage::new();
        stage.stage_json(&path, &rows()[0]).unwrap();
        stage.commit().unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["name"], "a");
        assert_eq!(value["value"], 1.5);
    }

    #[test]
    fn test_unwritable_destination_is_output_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, "").unwrap();

        let err = write_table(&blocker.join("table.csv"), &rows()).unwrap_err();
        assert!(matches!(err, PipelineError::Output { .. }));
    }
}
