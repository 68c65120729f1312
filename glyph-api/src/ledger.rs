//! Result ledger
//!
//! Every successful inference is appended as one row of `results.csv`:
//!
//! ```text
//! img_name,model_used,result_inferred,user_feedback
//! raw-img-1.png,lr,A,
//! raw-img-2.png,rnn,a or t?,correct
//! ```
//!
//! Column names and order are read by downstream tooling and must not change.
//! Artifact ids come from the current row count, so they are dense and follow
//! row order as long as a single writer mutates the file (see
//! [`crate::pipeline::InferencePipeline`], which serializes writers).
//!
//! The ledger is plain blocking file I/O; async callers go through
//! `spawn_blocking`.

use csv::{ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

use glyph_common::BackendKind;

/// Fixed ledger header
pub const HEADER: [&str; 4] = ["img_name", "model_used", "result_inferred", "user_feedback"];

const IMG_NAME_COLUMN: &str = "img_name";
const FEEDBACK_COLUMN: &str = "user_feedback";

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ledger CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The file exists but lacks a required column
    #[error("Malformed ledger: {0}")]
    Malformed(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// One ledger row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceResult {
    /// Artifact filename, e.g. `raw-img-3.png`
    pub img_name: String,
    /// Backend kind as written in the ledger (`lr`, `cnn`, `rnn`)
    pub model_used: String,
    /// Label returned by the backend
    pub result_inferred: String,
    /// Empty until feedback is recorded
    #[serde(default)]
    pub user_feedback: String,
}

impl InferenceResult {
    /// Fresh row with empty feedback
    pub fn new(img_name: impl Into<String>, kind: BackendKind, label: impl Into<String>) -> Self {
        Self {
            img_name: img_name.into(),
            model_used: kind.as_str().to_string(),
            result_inferred: label.into(),
            user_feedback: String::new(),
        }
    }

    fn to_record(&self) -> [&str; 4] {
        [
            &self.img_name,
            &self.model_used,
            &self.result_inferred,
            &self.user_feedback,
        ]
    }
}

/// CSV-backed ledger of inference results
#[derive(Debug, Clone)]
pub struct ResultLedger {
    path: PathBuf,
}

impl ResultLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file with the fixed header when it is absent or empty
    pub fn ensure_header(&self) -> LedgerResult<()> {
        let is_empty = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };
        if !is_empty {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = self.writer_builder().from_path(&self.path)?;
        writer.write_record(HEADER)?;
        writer.flush()?;

        tracing::info!(path = %self.path.display(), "Created result ledger");
        Ok(())
    }

    /// Number of data rows; a missing file counts as empty
    pub fn row_count(&self) -> LedgerResult<u64> {
        if !self.path.exists() {
            return Ok(0);
        }

        let mut reader = self.reader_builder().from_path(&self.path)?;
        let mut count = 0;
        for record in reader.records() {
            record?;
            count += 1;
        }
        Ok(count)
    }

    /// Identifier for the next artifact: data-row count + 1
    ///
    /// Recomputed from the file on every call, so rows added or removed
    /// externally are picked up.
    pub fn next_artifact_id(&self) -> LedgerResult<u64> {
        Ok(self.row_count()? + 1)
    }

    /// Append one row; the feedback column is always written empty
    pub fn append(&self, row: &InferenceResult) -> LedgerResult<()> {
        self.ensure_header()?;

        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = self.writer_builder().from_writer(file);
        let fresh = InferenceResult {
            user_feedback: String::new(),
            ..row.clone()
        };
        writer.write_record(fresh.to_record())?;
        writer.flush()?;
        Ok(())
    }

    /// All rows in file order
    pub fn rows(&self) -> LedgerResult<Vec<InferenceResult>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = self.reader_builder().from_path(&self.path)?;
        reader
            .deserialize()
            .collect::<Result<Vec<InferenceResult>, csv::Error>>()
            .map_err(LedgerError::from)
    }

    /// Set `user_feedback` on every row whose `img_name` matches
    ///
    /// The whole file is read, updated in memory and written to a fresh
    /// temporary file that then replaces the ledger. Returns the number of
    /// rows updated; an unknown `img_name` updates nothing and is not an error.
    /// Callers serialize rewrites (see [`crate::pipeline::InferencePipeline`]).
    pub fn apply_feedback(&self, img_name: &str, feedback: &str) -> LedgerResult<usize> {
        self.ensure_header()?;

        let mut reader = self.reader_builder().from_path(&self.path)?;
        let headers = reader.headers()?.clone();
        let name_col = column(&headers, IMG_NAME_COLUMN)?;
        let feedback_col = column(&headers, FEEDBACK_COLUMN)?;

        let mut rows: Vec<StringRecord> = Vec::new();
        let mut matched = 0;
        for record in reader.records() {
            let record = record?;
            if record.get(name_col) == Some(img_name) {
                rows.push(with_field(&record, feedback_col, feedback));
                matched += 1;
            } else {
                rows.push(record);
            }
        }

        // Unique sibling temp file, renamed over the ledger once complete
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = self.writer_builder().from_writer(tmp.as_file_mut());
            writer.write_record(&headers)?;
            for row in &rows {
                writer.write_record(row)?;
            }
            writer.flush()?;
        }
        tmp.persist(&self.path).map_err(|e| LedgerError::Io(e.error))?;

        Ok(matched)
    }

    fn reader_builder(&self) -> ReaderBuilder {
        let mut builder = ReaderBuilder::new();
        builder.has_headers(true).flexible(true);
        builder
    }

    fn writer_builder(&self) -> WriterBuilder {
        let mut builder = WriterBuilder::new();
        builder
            .has_headers(false)
            .flexible(true)
            .terminator(Terminator::CRLF);
        builder
    }
}

fn column(headers: &StringRecord, name: &str) -> LedgerResult<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| LedgerError::Malformed(format!("missing column '{}'", name)))
}

/// Copy of `record` with field `index` replaced, padding short rows
fn with_field(record: &StringRecord, index: usize, value: &str) -> StringRecord {
    let mut fields: Vec<&str> = record.iter().collect();
    if fields.len() <= index {
        fields.resize(index + 1, "");
    }
    fields[index] = value;
    StringRecord::from(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ledger_in(dir: &TempDir) -> ResultLedger {
        ResultLedger::new(dir.path().join("results.csv"))
    }

    #[test]
    fn test_header_written_once() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = ledger_in(&temp_dir);

        ledger.ensure_header().unwrap();
        ledger.ensure_header().unwrap();

        let content = std::fs::read_to_string(ledger.path()).unwrap();
        assert_eq!(content, "img_name,model_used,result_inferred,user_feedback\r\n");
    }

    #[test]
    fn test_empty_file_gets_header() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = ledger_in(&temp_dir);
        std::fs::write(ledger.path(), "").unwrap();

        ledger.ensure_header().unwrap();
        assert!(std::fs::read_to_string(ledger.path())
            .unwrap()
            .starts_with("img_name,"));
    }

    #[test]
    fn test_next_id_counts_rows() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = ledger_in(&temp_dir);
        assert_eq!(ledger.next_artifact_id().unwrap(), 1);

        ledger.ensure_header().unwrap();
        assert_eq!(ledger.next_artifact_id().unwrap(), 1);

        for n in 1..=3 {
            let name = format!("raw-img-{}.png", n);
            ledger
                .append(&InferenceResult::new(name, BackendKind::Lr, "A"))
                .unwrap();
        }
        assert_eq!(ledger.next_artifact_id().unwrap(), 4);
    }

    #[test]
    fn test_append_clears_feedback() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = ledger_in(&temp_dir);
        let mut row = InferenceResult::new("raw-img-1.png", BackendKind::Rnn, "a or t?");
        row.user_feedback = "stale".to_string();

        ledger.append(&row).unwrap();

        let rows = ledger.rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].model_used, "rnn");
        assert_eq!(rows[0].result_inferred, "a or t?");
        assert_eq!(rows[0].user_feedback, "");
    }

    #[test]
    fn test_quoting_of_free_text() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = ledger_in(&temp_dir);
        ledger
            .append(&InferenceResult::new("raw-img-1.png", BackendKind::Cnn, "B"))
            .unwrap();

        ledger
            .apply_feedback("raw-img-1.png", "wrong, it was \"8\"")
            .unwrap();

        let content = std::fs::read_to_string(ledger.path()).unwrap();
        assert!(content.contains("\"wrong, it was \"\"8\"\"\""));
        assert_eq!(ledger.rows().unwrap()[0].user_feedback, "wrong, it was \"8\"");
    }

    #[test]
    fn test_rewrite_leaves_only_ledger() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = ledger_in(&temp_dir);
        ledger
            .append(&InferenceResult::new("raw-img-1.png", BackendKind::Lr, "A"))
            .unwrap();

        ledger.apply_feedback("raw-img-1.png", "correct").unwrap();
        ledger.apply_feedback("raw-img-1.png", "incorrect").unwrap();

        let names: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("results.csv")]);
    }

    #[test]
    fn test_missing_column_is_malformed() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = ledger_in(&temp_dir);
        std::fs::write(ledger.path(), "name,label\r\nx,y\r\n").unwrap();

        assert!(matches!(
            ledger.apply_feedback("x", "ok"),
            Err(LedgerError::Malformed(_))
        ));
    }

    #[test]
    fn test_short_rows_are_padded() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = ledger_in(&temp_dir);
        std::fs::write(
            ledger.path(),
            "img_name,model_used,result_inferred,user_feedback\r\nraw-img-1.png,lr,A\r\n",
        )
        .unwrap();

        assert_eq!(ledger.apply_feedback("raw-img-1.png", "ok").unwrap(), 1);
        assert_eq!(ledger.rows().unwrap()[0].user_feedback, "ok");
    }
}
