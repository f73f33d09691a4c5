//! Bounded configuration values shared by the chunker and the export front ends.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Upper bound on data rows per output file.
pub const MAX_ROWS_PER_FILE: u64 = 60_000;

/// Rows pulled from a warehouse cursor per fetch call.
pub const DEFAULT_FETCH_BATCH_SIZE: usize = 10_000;

/// Maximum number of data rows written into a single output file.
///
/// The header row, when enabled, never counts against the budget.
/// Always within `1..=MAX_ROWS_PER_FILE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct RowBudget(u64);

impl RowBudget {
    /// Creates a budget, rejecting values outside `1..=60000`.
    pub fn new(rows: u64) -> Result<Self, AppError> {
        if rows == 0 || rows > MAX_ROWS_PER_FILE {
            return Err(AppError::Config(format!(
                "Rows per file must be between 1 and {}, got {}",
                MAX_ROWS_PER_FILE, rows
            )));
        }
        Ok(Self(rows))
    }

    /// Returns the budget as a row count.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl Default for RowBudget {
    fn default() -> Self {
        Self(MAX_ROWS_PER_FILE)
    }
}

impl TryFrom<u64> for RowBudget {
    type Error = AppError;

    fn try_from(rows: u64) -> Result<Self, Self::Error> {
        Self::new(rows)
    }
}

impl From<RowBudget> for u64 {
    fn from(budget: RowBudget) -> Self {
        budget.0
    }
}

impl fmt::Display for RowBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_bounds() {
        assert!(RowBudget::new(0).is_err());
        assert_eq!(RowBudget::new(1).unwrap().get(), 1);
        assert_eq!(RowBudget::new(60_000).unwrap().get(), 60_000);
        assert!(matches!(RowBudget::new(60_001), Err(AppError::Config(_))));
    }

    #[test]
    fn test_budget_default_is_cap() {
        assert_eq!(RowBudget::default().get(), MAX_ROWS_PER_FILE);
    }

    #[test]
    fn test_budget_deserialize_validates() {
        let ok: RowBudget = serde_json::from_str("500").unwrap();
        assert_eq!(ok.get(), 500);

        let err = serde_json::from_str::<RowBudget>("70000");
        assert!(err.is_err());
    }
}
