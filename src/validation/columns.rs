//! Required-column checks and the output column layout.
//!
//! The output schema is resolved once per run from the source column list.
//! Each output column remembers the index of the source field it is read
//! from, so rows are projected positionally without per-row name lookups.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::source::Row;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Columns every input must carry, matched case-insensitively.
pub const REQUIRED_COLUMNS: [&str; 3] = ["item", "loc", "locpriority"];

// ─────────────────────────────────────────────────────────────────────────────
// Public Types
// ─────────────────────────────────────────────────────────────────────────────

/// How output columns are ordered relative to the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnOrder {
    /// Keep the source order for every column.
    #[default]
    Preserve,
    /// `item`, `loc`, `locpriority` first, then the rest in source order.
    RequiredFirst,
}

/// The fixed column layout written into every output part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSchema {
    columns: Vec<String>,
    /// Source field index for each output column.
    projection: Vec<usize>,
}

impl OutputSchema {
    /// Resolves the output layout for `source_columns` under `order`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Schema` when `source_columns` is empty.
    pub fn resolve(source_columns: &[String], order: ColumnOrder) -> Result<Self, AppError> {
        if source_columns.is_empty() {
            return Err(AppError::Schema(
                "Input appears to have no header/columns.".to_string(),
            ));
        }

        let projection: Vec<usize> = match order {
            ColumnOrder::Preserve => (0..source_columns.len()).collect(),
            ColumnOrder::RequiredFirst => {
                let mut picked: Vec<usize> = REQUIRED_COLUMNS
                    .iter()
                    .filter_map(|required| find_column(source_columns, required))
                    .collect();
                for idx in 0..source_columns.len() {
                    if !picked.contains(&idx) {
                        picked.push(idx);
                    }
                }
                picked
            }
        };

        let columns = projection
            .iter()
            .map(|&idx| source_columns[idx].clone())
            .collect();

        Ok(Self {
            columns,
            projection,
        })
    }

    /// Output column names in write order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Projects a source row onto the output layout.
    ///
    /// Fields missing from a short row and null values come out as empty
    /// strings; fields beyond the source schema are dropped.
    pub fn project<'a>(&'a self, row: &'a Row) -> impl Iterator<Item = &'a str> + 'a {
        self.projection
            .iter()
            .map(move |&idx| row.field(idx).unwrap_or(""))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Fails with `AppError::Schema` unless every required column is present.
pub fn validate_required_columns(columns: &[String]) -> Result<(), AppError> {
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|required| find_column(columns, required).is_none())
        .collect();

    if missing.is_empty() {
        return Ok(());
    }

    Err(AppError::Schema(format!(
        "Input is missing required column(s): {}. Required: {}.",
        missing.join(", "),
        REQUIRED_COLUMNS.join(", ")
    )))
}

/// Index of the first column whose lowercase name equals `name`.
fn find_column(columns: &[String], name: &str) -> Option<usize> {
    columns.iter().position(|c| c.to_lowercase() == name)
}
