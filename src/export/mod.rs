//! Export orchestration.
//!
//! Validates an export request, builds the matching row source and runs the
//! blocking chunk writer off the async runtime.
//!
//! - `file`: local CSV input
//! - `query`: warehouse query results

mod file;
mod query;

pub use file::{export_csv_file, export_csv_file_blocking};
pub use query::{export_from_cursor, export_query};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::task::JoinError;

use crate::error::AppError;
use crate::streaming::DEFAULT_BASE_NAME;

// ─────────────────────────────────────────────────────────────────────────────
// Request Types
// ─────────────────────────────────────────────────────────────────────────────

/// Request to split a local CSV file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileExportRequest {
    /// Path to the input CSV.
    pub input_path: PathBuf,
    /// Existing folder receiving the parts.
    pub output_dir: PathBuf,
    /// Base name for part files; sanitized before use.
    #[serde(default = "default_base_name")]
    pub base_name: String,
}

/// Request to export warehouse query results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryExportRequest {
    /// SQL text. Never logged.
    pub query: String,
    /// Existing folder receiving the parts.
    pub output_dir: PathBuf,
    /// Base name for part files; sanitized before use.
    #[serde(default = "default_base_name")]
    pub base_name: String,
}

fn default_base_name() -> String {
    DEFAULT_BASE_NAME.to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Fails with a configuration error unless `dir` is an existing folder.
pub(crate) fn ensure_output_dir(dir: &Path) -> Result<(), AppError> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(AppError::Config(format!(
            "Output folder not found: {}",
            dir.display()
        )))
    }
}

/// Maps a failed blocking task to an internal error.
pub(crate) fn join_error(e: JoinError) -> AppError {
    AppError::Internal(format!("Export task failed: {}", e))
}
