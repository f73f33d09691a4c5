//! Row-budgeted chunk writer.
//!
//! Pulls rows from a [`RowSource`] and writes them into a sequence of CSV
//! part files, each holding at most `max_rows` data rows. The header row,
//! when enabled, is repeated at the top of every part and never counts
//! against the budget. Rows are written in source order; none are skipped
//! or duplicated across a rollover.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::RowBudget;
use crate::error::AppError;
use crate::source::{Row, RowSource};
use crate::streaming::atomic_writer::{display_name, AtomicCsvWriter};
use crate::streaming::naming::{sanitize_base_name, NamingScheme};
use crate::validation::{validate_required_columns, OutputSchema};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for a chunking run.
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Maximum data rows per part (excluding header).
    pub max_rows: RowBudget,
    /// Write the header row at the top of every part.
    pub include_header: bool,
    /// Require `item`, `loc`, `locpriority` before writing anything.
    pub validate_columns: bool,
    /// Part naming policy.
    pub naming: NamingScheme,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_rows: RowBudget::default(),
            include_header: true,
            validate_columns: true,
            naming: NamingScheme::AlwaysNumbered,
        }
    }
}

impl ChunkConfig {
    /// Sets the max_rows limit.
    pub fn max_rows(mut self, max_rows: RowBudget) -> Self {
        self.max_rows = max_rows;
        self
    }

    /// Enables or disables the header row.
    pub fn include_header(mut self, include_header: bool) -> Self {
        self.include_header = include_header;
        self
    }

    /// Enables or disables the required-column check.
    pub fn validate_columns(mut self, validate_columns: bool) -> Self {
        self.validate_columns = validate_columns;
        self
    }

    /// Sets the naming scheme.
    pub fn naming(mut self, naming: NamingScheme) -> Self {
        self.naming = naming;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Observer
// ─────────────────────────────────────────────────────────────────────────────

/// Receives human-readable log lines and advisory progress from a run.
///
/// Callbacks are invoked synchronously on the thread driving the run.
pub trait ChunkObserver: Send + Sync {
    /// Called with a display-ready message, e.g. `Writing: TEST_001.csv`.
    fn on_log(&self, _message: &str) {}

    /// Called with a percentage in `0..=100`.
    fn on_progress(&self, _percent: u8) {}
}

// ─────────────────────────────────────────────────────────────────────────────
// Result
// ─────────────────────────────────────────────────────────────────────────────

/// Summary of a completed chunking run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkSummary {
    /// Number of part files left on disk.
    pub files_written: u32,
    /// Total data rows written (excluding headers).
    pub rows_written: u64,
    /// Sanitized base name used for the part files.
    pub base_name: String,
    /// Row budget the run used.
    pub max_rows: u64,
    /// Whether every part starts with a header row.
    pub include_header: bool,
    /// Final paths of the part files, in part order.
    pub paths: Vec<PathBuf>,
    /// Data rows in each part (parallel to `paths`).
    pub rows_per_file: Vec<u64>,
}

// ─────────────────────────────────────────────────────────────────────────────
// ChunkWriter
// ─────────────────────────────────────────────────────────────────────────────

/// Drives a row source into budgeted part files.
#[derive(Clone, Default)]
pub struct ChunkWriter {
    config: ChunkConfig,
    observer: Option<Arc<dyn ChunkObserver>>,
    cancel: Option<CancellationToken>,
}

impl std::fmt::Debug for ChunkWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkWriter")
            .field("config", &self.config)
            .field("observer", &self.observer.is_some())
            .field("cancel", &self.cancel.is_some())
            .finish()
    }
}

impl ChunkWriter {
    pub fn new(config: ChunkConfig) -> Self {
        Self {
            config,
            observer: None,
            cancel: None,
        }
    }

    /// Registers a log/progress observer.
    pub fn with_observer(mut self, observer: Arc<dyn ChunkObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Registers a token checked once per row.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Writes every row of `source` into parts under `output_dir`.
    ///
    /// # Errors
    ///
    /// - `AppError::Config` - `output_dir` does not exist
    /// - `AppError::Schema` - no columns, or required columns missing while
    ///   validation is enabled; raised before any file is created
    /// - `AppError::Capacity` - the naming scheme cannot hold another part
    /// - `AppError::Io` - a part could not be created, written or persisted
    /// - `AppError::Cancelled` - the cancellation token fired
    /// - any error raised by the source while reading
    ///
    /// Parts completed before an error stay on disk. The part in progress is
    /// kept when it holds at least one row and its last write succeeded, so
    /// the files on disk always end on a whole record.
    pub fn run<S: RowSource>(
        &self,
        mut source: S,
        output_dir: &Path,
        base_name: &str,
    ) -> Result<ChunkSummary, AppError> {
        if !output_dir.is_dir() {
            return Err(AppError::Config(format!(
                "Output folder not found: {}",
                output_dir.display()
            )));
        }

        let base_name = sanitize_base_name(base_name);

        if self.config.validate_columns && !source.columns().is_empty() {
            validate_required_columns(source.columns())?;
        }
        let schema = OutputSchema::resolve(source.columns(), source.column_order())?;

        self.progress(0);

        let mut session = ChunkSession::new(self, output_dir, base_name, schema);
        let outcome = session.open_next().and_then(|_| self.drain(&mut source, &mut session));

        match outcome {
            Ok(()) => {
                let summary = session.finalize()?;
                self.progress(100);
                Ok(summary)
            }
            Err(err) => {
                session.abort();
                Err(err)
            }
        }
    }

    /// Pulls rows until the source is exhausted.
    fn drain<S: RowSource>(
        &self,
        source: &mut S,
        session: &mut ChunkSession<'_>,
    ) -> Result<(), AppError> {
        loop {
            if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
                return Err(AppError::Cancelled);
            }

            match source.next_row()? {
                Some(row) => session.write_row(row)?,
                None => return Ok(()),
            }
        }
    }

    pub(crate) fn log(&self, message: &str) {
        if let Some(observer) = &self.observer {
            observer.on_log(message);
        }
    }

    fn progress(&self, percent: u8) {
        if let Some(observer) = &self.observer {
            observer.on_progress(percent.min(100));
        }
    }
}

/// Runs `source` through a [`ChunkWriter`] built from `config`.
pub fn run<S: RowSource>(
    source: S,
    output_dir: &Path,
    base_name: &str,
    config: ChunkConfig,
) -> Result<ChunkSummary, AppError> {
    ChunkWriter::new(config).run(source, output_dir, base_name)
}

// ─────────────────────────────────────────────────────────────────────────────
// ChunkSession
// ─────────────────────────────────────────────────────────────────────────────

/// In-progress state of one run. Exactly one part is open at a time.
struct ChunkSession<'w> {
    writer: &'w ChunkWriter,
    output_dir: PathBuf,
    base_name: String,
    schema: OutputSchema,
    /// 1-based index of the open part; 0 before the first part is opened.
    part_index: u32,
    current: Option<AtomicCsvWriter>,
    rows_in_part: u64,
    total_rows: u64,
    /// Persisted parts and their row counts.
    completed: Vec<(PathBuf, u64)>,
}

impl<'w> ChunkSession<'w> {
    fn new(
        writer: &'w ChunkWriter,
        output_dir: &Path,
        base_name: String,
        schema: OutputSchema,
    ) -> Self {
        Self {
            writer,
            output_dir: output_dir.to_path_buf(),
            base_name,
            schema,
            part_index: 0,
            current: None,
            rows_in_part: 0,
            total_rows: 0,
            completed: Vec::new(),
        }
    }

    fn config(&self) -> &ChunkConfig {
        self.writer.config()
    }

    /// Closes the open part (if any) and opens the next one.
    fn open_next(&mut self) -> Result<(), AppError> {
        let naming = self.config().naming;
        let next_index = self.part_index + 1;

        if let Some(max_parts) = naming.max_parts() {
            if next_index > max_parts {
                return Err(AppError::Capacity(format!(
                    "Result exceeds {} rows. This mode writes at most {} files of up to {} rows each.",
                    u64::from(max_parts) * self.config().max_rows.get(),
                    max_parts,
                    self.config().max_rows
                )));
            }
        }

        // Earlier parts are named as if `next_index` parts exist, which is
        // what promotes an implicit first part to `_001`.
        self.close_current(next_index)?;

        let path = naming.part_path(&self.output_dir, &self.base_name, next_index, next_index);
        let mut part = AtomicCsvWriter::new(&path)?;
        if self.config().include_header {
            part.write_record(self.schema.columns())?;
        }

        let message = format!("Writing: {}", display_name(&path));
        info!(part = next_index, path = %path.display(), "{}", message);
        self.writer.log(&message);

        self.part_index = next_index;
        self.rows_in_part = 0;
        self.current = Some(part);
        Ok(())
    }

    /// Writes one row, rolling over first if the open part is full.
    fn write_row(&mut self, row: Row) -> Result<(), AppError> {
        if self.current.is_none() || self.rows_in_part >= self.config().max_rows.get() {
            self.open_next()?;
        }

        let part = self
            .current
            .as_mut()
            .ok_or_else(|| AppError::Internal("No open output part".to_string()))?;
        if let Err(err) = part.write_record(self.schema.project(&row)) {
            // A failed write may leave a torn record behind.
            self.current = None;
            return Err(err);
        }

        self.rows_in_part += 1;
        self.total_rows += 1;
        Ok(())
    }

    /// Persists the open part, naming it for a run of `total_parts` parts.
    fn close_current(&mut self, total_parts: u32) -> Result<(), AppError> {
        let Some(part) = self.current.take() else {
            return Ok(());
        };

        let path = self.config().naming.part_path(
            &self.output_dir,
            &self.base_name,
            self.part_index,
            total_parts,
        );
        let path = if path == part.final_path() {
            part.finish()?
        } else {
            part.finish_as(&path)?
        };

        info!(
            part = self.part_index,
            rows = self.rows_in_part,
            path = %path.display(),
            "Completed part"
        );
        self.completed.push((path, self.rows_in_part));

        if self.part_index == 1 && total_parts > 1 {
            self.remove_unnumbered_first_part()?;
        }
        Ok(())
    }

    /// Removes `<base>.csv` once the first part has been promoted to `_001`.
    ///
    /// Only applies to schemes that name a lone first part differently.
    fn remove_unnumbered_first_part(&self) -> Result<(), AppError> {
        let naming = self.config().naming;
        let unnumbered = naming.part_path(&self.output_dir, &self.base_name, 1, 1);
        let promoted = naming.part_path(&self.output_dir, &self.base_name, 1, 2);
        if unnumbered == promoted {
            return Ok(());
        }

        match std::fs::remove_file(&unnumbered) {
            Ok(()) => {
                info!(path = %unnumbered.display(), "Removed superseded single-part file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Io(format!(
                "Failed to remove {}: {}",
                display_name(&unnumbered),
                e
            ))),
        }
    }

    /// Closes the last part and reports the run.
    ///
    /// With zero rows written nothing is persisted and any file already at
    /// the first part's path is removed.
    fn finalize(mut self) -> Result<ChunkSummary, AppError> {
        if self.total_rows == 0 {
            self.current = None;
            self.remove_first_part();
        } else {
            self.close_current(self.part_index)?;
        }

        let (paths, rows_per_file): (Vec<PathBuf>, Vec<u64>) =
            std::mem::take(&mut self.completed).into_iter().unzip();

        info!(
            files = paths.len(),
            rows = self.total_rows,
            base_name = %self.base_name,
            "Chunking complete"
        );

        Ok(ChunkSummary {
            files_written: paths.len() as u32,
            rows_written: self.total_rows,
            base_name: self.base_name.clone(),
            max_rows: self.config().max_rows.get(),
            include_header: self.config().include_header,
            paths,
            rows_per_file,
        })
    }

    /// Keeps the open part after a failed run if it holds whole records.
    fn abort(&mut self) {
        if self.current.is_none() || self.rows_in_part == 0 {
            self.current = None;
            return;
        }

        if let Err(close_err) = self.close_current(self.part_index) {
            warn!(error = %close_err, "Failed to keep partial output part");
        }
    }

    /// Best-effort removal of the first part's final path.
    fn remove_first_part(&self) {
        let first = self
            .config()
            .naming
            .part_path(&self.output_dir, &self.base_name, 1, 1);

        match std::fs::remove_file(&first) {
            Ok(()) => info!(path = %first.display(), "Removed empty output file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %first.display(), error = %e, "Failed to remove empty output file"),
        }
    }
}
