//! Row sources feeding the chunk writer.
//!
//! A row source reports its column list once, up front, and then yields rows
//! lazily until it is exhausted. Rows are positional: field `i` belongs to
//! column `i` of the reported schema.

mod local;
mod remote;

pub use local::LocalCsvSource;
pub use remote::{QueryCursor, RemoteQuerySource};

use crate::error::AppError;
use crate::validation::ColumnOrder;

// ─────────────────────────────────────────────────────────────────────────────
// Row
// ─────────────────────────────────────────────────────────────────────────────

/// One record as ordered, nullable text fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    fields: Vec<Option<String>>,
}

impl Row {
    /// Creates a row from positional fields.
    pub fn new(fields: Vec<Option<String>>) -> Self {
        Self { fields }
    }

    /// Creates a row of non-null fields.
    pub fn from_strings<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(|f| Some(f.into())).collect(),
        }
    }

    /// Returns field `idx`, or `None` when it is null or past the end.
    pub fn field(&self, idx: usize) -> Option<&str> {
        self.fields.get(idx).and_then(|f| f.as_deref())
    }

    /// Number of fields in the row.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RowSource
// ─────────────────────────────────────────────────────────────────────────────

/// A finite, ordered stream of rows with a fixed column list.
pub trait RowSource {
    /// Column names in source order. Empty when no schema is available.
    fn columns(&self) -> &[String];

    /// Output ordering this source asks the writer to apply.
    fn column_order(&self) -> ColumnOrder {
        ColumnOrder::Preserve
    }

    /// Pulls the next row, or `None` once the source is exhausted.
    fn next_row(&mut self) -> Result<Option<Row>, AppError>;
}

impl<S: RowSource + ?Sized> RowSource for &mut S {
    fn columns(&self) -> &[String] {
        (**self).columns()
    }

    fn column_order(&self) -> ColumnOrder {
        (**self).column_order()
    }

    fn next_row(&mut self) -> Result<Option<Row>, AppError> {
        (**self).next_row()
    }
}
