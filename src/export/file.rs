//! Local CSV export.

use tracing::info;

use crate::error::AppError;
use crate::export::{ensure_output_dir, join_error, FileExportRequest};
use crate::source::LocalCsvSource;
use crate::streaming::{ChunkSummary, ChunkWriter};

/// Splits a local CSV file into parts on the calling thread.
///
/// # Errors
///
/// - `AppError::FileNotFound` - the input does not exist
/// - `AppError::Config` - the output folder does not exist
/// - anything [`ChunkWriter::run`] returns
pub fn export_csv_file_blocking(
    writer: &ChunkWriter,
    request: &FileExportRequest,
) -> Result<ChunkSummary, AppError> {
    ensure_output_dir(&request.output_dir)?;

    let source = LocalCsvSource::open(&request.input_path)?;
    let summary = writer.run(source, &request.output_dir, &request.base_name)?;

    info!(
        files = summary.files_written,
        rows = summary.rows_written,
        "CSV export complete"
    );
    Ok(summary)
}

/// Splits a local CSV file into parts on a blocking worker thread.
pub async fn export_csv_file(
    writer: ChunkWriter,
    request: FileExportRequest,
) -> Result<ChunkSummary, AppError> {
    tokio::task::spawn_blocking(move || export_csv_file_blocking(&writer, &request))
        .await
        .map_err(join_error)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RowBudget;
    use crate::streaming::ChunkConfig;
    use std::fs;
    use tempfile::TempDir;

    fn write_input(dir: &TempDir, rows: usize) -> std::path::PathBuf {
        let path = dir.path().join("input.csv");
        let mut content = String::from("item,loc,locpriority\n");
        for i in 0..rows {
            content.push_str(&format!("SKU{},L{},{}\n", i, i, i % 3 + 1));
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_export_csv_file_splits_input() {
        let input_dir = TempDir::new().unwrap();
        let output_dir = TempDir::new().unwrap();
        let input_path = write_input(&input_dir, 5);

        let writer = ChunkWriter::new(ChunkConfig::default().max_rows(RowBudget::new(2).unwrap()));
        let request = FileExportRequest {
            input_path,
            output_dir: output_dir.path().to_path_buf(),
            base_name: "TEST".to_string(),
        };

        let summary = export_csv_file(writer, request).await.unwrap();
        assert_eq!(summary.files_written, 3);
        assert_eq!(summary.rows_written, 5);
        assert_eq!(summary.rows_per_file, vec![2, 2, 1]);

        let last = fs::read_to_string(output_dir.path().join("TEST_003.csv")).unwrap();
        assert_eq!(last, "item,loc,locpriority\r\nSKU4,L4,2\r\n");
    }

    #[tokio::test]
    async fn test_export_csv_file_missing_input() {
        let output_dir = TempDir::new().unwrap();
        let request = FileExportRequest {
            input_path: output_dir.path().join("nope.csv"),
            output_dir: output_dir.path().to_path_buf(),
            base_name: "TEST".to_string(),
        };

        let result = export_csv_file(ChunkWriter::default(), request).await;
        assert!(matches!(result, Err(AppError::FileNotFound(_))));
    }

    #[test]
    fn test_missing_output_dir_checked_before_input() {
        let dir = TempDir::new().unwrap();
        let request = FileExportRequest {
            input_path: dir.path().join("nope.csv"),
            output_dir: dir.path().join("missing"),
            base_name: "TEST".to_string(),
        };

        let result = export_csv_file_blocking(&ChunkWriter::default(), &request);
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
