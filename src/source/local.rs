//! Row source over a local delimited-text file.
//!
//! Uses the `csv` crate so quoted fields with embedded commas and newlines are
//! read as single records. A leading UTF-8 byte-order mark is skipped and the
//! header names are trimmed of surrounding whitespace.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::info;

use crate::error::AppError;
use crate::source::{Row, RowSource};

/// UTF-8 BOM bytes.
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Lazily reads rows from a CSV file whose first record is the header.
pub struct LocalCsvSource {
    reader: csv::Reader<BufReader<File>>,
    columns: Vec<String>,
    record: StringRecord,
}

impl std::fmt::Debug for LocalCsvSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCsvSource")
            .field("columns", &self.columns)
            .finish()
    }
}

impl LocalCsvSource {
    /// Opens `path` and reads its header record.
    ///
    /// # Errors
    ///
    /// - `AppError::FileNotFound` - `path` does not exist
    /// - `AppError::Schema` - the header record is missing or blank
    /// - `AppError::NotUtf8` / `AppError::CsvInvalid` - the header cannot be decoded
    pub fn open(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            return Err(AppError::FileNotFound(path.to_path_buf()));
        }

        let file = File::open(path)
            .map_err(|e| AppError::Io(format!("Failed to open input file: {}", e)))?;
        let mut buf_reader = BufReader::new(file);
        skip_bom(&mut buf_reader)?;

        // Ragged records are tolerated; the output schema pads or drops fields.
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::Headers)
            .from_reader(buf_reader);

        let columns: Vec<String> = reader
            .headers()
            .map_err(map_csv_error)?
            .iter()
            .map(|name| name.to_string())
            .collect();

        if columns.iter().all(|name| name.is_empty()) {
            return Err(AppError::Schema(
                "Input CSV appears to have no header/columns.".to_string(),
            ));
        }

        info!(
            path = %path.display(),
            columns = columns.len(),
            "Opened input CSV"
        );

        Ok(Self {
            reader,
            columns,
            record: StringRecord::new(),
        })
    }
}

impl RowSource for LocalCsvSource {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Row>, AppError> {
        let has_record = self
            .reader
            .read_record(&mut self.record)
            .map_err(map_csv_error)?;

        if !has_record {
            return Ok(None);
        }

        Ok(Some(Row::new(
            self.record.iter().map(|f| Some(f.to_string())).collect(),
        )))
    }
}

/// Consumes a UTF-8 byte-order mark at the start of the stream, if present.
fn skip_bom(reader: &mut BufReader<File>) -> Result<(), AppError> {
    let has_bom = reader
        .fill_buf()
        .map_err(|e| AppError::Io(format!("Failed to read input file: {}", e)))?
        .starts_with(UTF8_BOM);

    if has_bom {
        reader.consume(UTF8_BOM.len());
    }
    Ok(())
}

/// Maps a CSV read failure onto the error taxonomy.
fn map_csv_error(err: csv::Error) -> AppError {
    match err.kind() {
        csv::ErrorKind::Utf8 { .. } => AppError::NotUtf8,
        csv::ErrorKind::Io(e) => AppError::Io(format!("Failed to read input file: {}", e)),
        _ => AppError::CsvInvalid(err.to_string()),
    }
}
