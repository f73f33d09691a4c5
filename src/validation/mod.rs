//! Column validation for chunked exports.
//!
//! Checks that inputs carry the required columns and resolves the fixed
//! output layout that every part file is written with.

pub mod columns;

pub use columns::{validate_required_columns, ColumnOrder, OutputSchema, REQUIRED_COLUMNS};
