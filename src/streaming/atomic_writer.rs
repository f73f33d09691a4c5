//! Atomic CSV part writer with automatic cleanup on failure.
//!
//! Writes to a hidden temporary file in the same directory as the
//! destination, then syncs it and atomically moves it into place on
//! `finish()`. If dropped before finishing, the temporary file is removed.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use csv::{Terminator, Writer, WriterBuilder};
use tempfile::NamedTempFile;

use crate::error::AppError;

/// An atomic CSV writer for one output part.
///
/// Nothing appears under the destination name until `finish()` or
/// `finish_as()` succeeds. Records are written with CRLF terminators.
pub struct AtomicCsvWriter {
    writer: Writer<BufWriter<NamedTempFile>>,
    final_path: PathBuf,
}

impl AtomicCsvWriter {
    /// Creates a new atomic CSV writer targeting the specified path.
    ///
    /// The temporary file is created in the same directory as `final_path`
    /// so the final move never crosses filesystems.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the parent directory cannot be determined
    /// or the temporary file cannot be created.
    pub fn new(final_path: impl AsRef<Path>) -> Result<Self, AppError> {
        let final_path = final_path.as_ref().to_path_buf();

        let parent_dir = final_path.parent().ok_or_else(|| {
            AppError::Io(format!(
                "Cannot determine parent directory for: {}",
                final_path.display()
            ))
        })?;

        let temp_file = tempfile::Builder::new()
            .prefix(".rowsplit-")
            .suffix(".part")
            .tempfile_in(parent_dir)
            .map_err(|e| AppError::Io(format!("Failed to create output file: {}", e)))?;

        let csv_writer = WriterBuilder::new()
            .has_headers(false)
            .terminator(Terminator::CRLF)
            .from_writer(BufWriter::new(temp_file));

        Ok(Self {
            writer: csv_writer,
            final_path,
        })
    }

    /// The path this part will be persisted to by `finish()`.
    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Writes one record.
    pub fn write_record<I, T>(&mut self, record: I) -> Result<(), AppError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.writer.write_record(record).map_err(|e| {
            AppError::Io(format!(
                "Failed to write to {}: {}",
                display_name(&self.final_path),
                e
            ))
        })
    }

    /// Flushes, syncs and atomically persists to the path given at creation.
    pub fn finish(self) -> Result<PathBuf, AppError> {
        let final_path = self.final_path.clone();
        self.finish_as(final_path)
    }

    /// Flushes, syncs and atomically persists to `path` instead.
    ///
    /// Any existing file at `path` is replaced. On error the temporary file
    /// is cleaned up automatically.
    pub fn finish_as(self, path: impl AsRef<Path>) -> Result<PathBuf, AppError> {
        let path = path.as_ref().to_path_buf();

        // Flush the CSV writer and get the BufWriter
        let buf_writer = self.writer.into_inner().map_err(|e| {
            AppError::Io(format!("Failed to flush CSV writer: {}", e.error()))
        })?;

        // Flush the BufWriter and get the NamedTempFile
        let mut named_temp = buf_writer
            .into_inner()
            .map_err(|e| AppError::Io(format!("Failed to flush buffer: {}", e.error())))?;

        named_temp
            .flush()
            .and_then(|_| named_temp.as_file().sync_all())
            .map_err(|e| AppError::Io(format!("Failed to sync output file: {}", e)))?;

        named_temp.persist(&path).map_err(|e| {
            AppError::Io(format!(
                "Failed to persist file to {}: {}",
                path.display(),
                e.error
            ))
        })?;

        Ok(path)
    }
}

/// File name component for messages, falling back to the full path.
pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_successful_write_uses_crlf() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let final_path = temp_dir.path().join("output.csv");

        let mut writer = AtomicCsvWriter::new(&final_path).expect("Failed to create writer");
        writer.write_record(["item", "loc"]).expect("Failed to write header");
        writer.write_record(["A", "L1"]).expect("Failed to write record");

        // Not visible before finish
        assert!(!final_path.exists());

        let result_path = writer.finish().expect("Failed to finish");
        assert_eq!(result_path, final_path);

        let content = fs::read_to_string(&final_path).expect("Failed to read file");
        assert_eq!(content, "item,loc\r\nA,L1\r\n");
    }

    #[test]
    fn test_drop_cleanup() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let final_path = temp_dir.path().join("output.csv");

        {
            let mut writer = AtomicCsvWriter::new(&final_path).expect("Failed to create writer");
            writer.write_record(["Header"]).expect("Failed to write");
            // Writer is dropped here without calling finish()
        }

        let entries_after: Vec<_> = fs::read_dir(temp_dir.path())
            .expect("Failed to read dir")
            .collect();
        assert!(
            entries_after.is_empty(),
            "Directory should be empty after drop (temp file cleaned up)"
        );
    }

    #[test]
    fn test_finish_as_moves_to_other_name() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let first = temp_dir.path().join("TEST.csv");
        let renamed = temp_dir.path().join("TEST_001.csv");

        let mut writer = AtomicCsvWriter::new(&first).expect("Failed to create writer");
        writer.write_record(["A"]).expect("Failed to write");
        writer.finish_as(&renamed).expect("Failed to finish");

        assert!(!first.exists());
        assert_eq!(fs::read_to_string(&renamed).unwrap(), "A\r\n");
    }

    #[test]
    fn test_overwrite_behavior() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let final_path = temp_dir.path().join("output.csv");
        fs::write(&final_path, "OLD_CONTENT").expect("Failed to write dummy file");

        let mut writer = AtomicCsvWriter::new(&final_path).expect("Failed to create writer");
        writer.write_record(["NEW"]).expect("Failed to write");
        writer.finish().expect("Failed to finish");

        let content = fs::read_to_string(&final_path).expect("Failed to read file");
        assert_eq!(content, "NEW\r\n");
    }

    #[test]
    fn test_special_characters_are_quoted() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let final_path = temp_dir.path().join("complex.csv");

        let mut writer = AtomicCsvWriter::new(&final_path).expect("Failed to create writer");
        writer
            .write_record(["Contains, comma", "Has \"quotes\"", "Multi\nline"])
            .expect("Failed to write record");
        writer.finish().expect("Failed to finish");

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(&final_path)
            .expect("Failed to open reader");
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(&record[0], "Contains, comma");
        assert_eq!(&record[1], "Has \"quotes\"");
        assert_eq!(&record[2], "Multi\nline");
    }

    #[cfg(unix)]
    #[test]
    fn test_invalid_parent_directory() {
        let result = AtomicCsvWriter::new("/");
        assert!(matches!(result, Err(AppError::Io(_))));
    }
}
