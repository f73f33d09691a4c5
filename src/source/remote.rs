//! Row source draining a warehouse query cursor in fixed-size batches.
//!
//! The cursor is held by a guard that closes it when the source is dropped,
//! whether the run finished, failed, or was abandoned midway.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};

use tracing::debug;

use crate::config::DEFAULT_FETCH_BATCH_SIZE;
use crate::error::{AppError, ErrorKind};
use crate::source::{Row, RowSource};
use crate::validation::ColumnOrder;

// ─────────────────────────────────────────────────────────────────────────────
// QueryCursor
// ─────────────────────────────────────────────────────────────────────────────

/// A blocking, forward-only query cursor over an authenticated session.
///
/// Implementations own whatever session handle they need; `close` releases
/// both the cursor and the session and must tolerate being called on a
/// cursor that never executed.
pub trait QueryCursor {
    /// Executes `query` and returns the result column names in order.
    fn execute(&mut self, query: &str) -> Result<Vec<String>, AppError>;

    /// Returns up to `size` rows; an empty batch means the result is drained.
    fn fetch_many(&mut self, size: usize) -> Result<Vec<Row>, AppError>;

    /// Releases the cursor and its session. Best-effort, never fails.
    fn close(&mut self);
}

/// Closes the wrapped cursor on drop.
struct CursorGuard<C: QueryCursor>(C);

impl<C: QueryCursor> Deref for CursorGuard<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.0
    }
}

impl<C: QueryCursor> DerefMut for CursorGuard<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.0
    }
}

impl<C: QueryCursor> Drop for CursorGuard<C> {
    fn drop(&mut self) {
        self.0.close();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RemoteQuerySource
// ─────────────────────────────────────────────────────────────────────────────

/// Lazily pulls query results from a [`QueryCursor`].
///
/// Output ordering is forced to required-columns-first.
pub struct RemoteQuerySource<C: QueryCursor> {
    cursor: CursorGuard<C>,
    columns: Vec<String>,
    buffer: VecDeque<Row>,
    batch_size: usize,
    exhausted: bool,
    batches: u64,
}

impl<C: QueryCursor> RemoteQuerySource<C> {
    /// Executes `query` on `cursor` with the default batch size.
    pub fn open(cursor: C, query: &str) -> Result<Self, AppError> {
        Self::open_with_batch_size(cursor, query, DEFAULT_FETCH_BATCH_SIZE)
    }

    /// Executes `query` on `cursor`, pulling `batch_size` rows per fetch.
    ///
    /// The cursor is closed before returning an error.
    ///
    /// # Errors
    ///
    /// - `AppError::Config` - the query is blank or `batch_size` is zero
    /// - `AppError::Schema` - the result has no columns
    /// - `AppError::Upstream` (or a more specific upstream error) - execution failed
    pub fn open_with_batch_size(
        cursor: C,
        query: &str,
        batch_size: usize,
    ) -> Result<Self, AppError> {
        let mut cursor = CursorGuard(cursor);

        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Config("Query is empty.".to_string()));
        }
        if batch_size == 0 {
            return Err(AppError::Config(
                "Fetch batch size must be at least 1".to_string(),
            ));
        }

        let columns = cursor.execute(query).map_err(wrap_upstream)?;
        if columns.is_empty() {
            return Err(AppError::Schema("Query returned no columns.".to_string()));
        }

        Ok(Self {
            cursor,
            columns,
            buffer: VecDeque::new(),
            batch_size,
            exhausted: false,
            batches: 0,
        })
    }
}

impl<C: QueryCursor> RowSource for RemoteQuerySource<C> {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn column_order(&self) -> ColumnOrder {
        ColumnOrder::RequiredFirst
    }

    fn next_row(&mut self) -> Result<Option<Row>, AppError> {
        if self.buffer.is_empty() && !self.exhausted {
            let batch = self
                .cursor
                .fetch_many(self.batch_size)
                .map_err(wrap_upstream)?;

            if batch.is_empty() {
                self.exhausted = true;
            } else {
                self.batches += 1;
                debug!(batch = self.batches, rows = batch.len(), "Fetched result batch");
                self.buffer.extend(batch);
            }
        }

        Ok(self.buffer.pop_front())
    }
}

/// Keeps upstream-class errors as they are and wraps everything else.
fn wrap_upstream(err: AppError) -> AppError {
    match err.kind() {
        ErrorKind::Upstream | ErrorKind::Cancelled => err,
        _ => AppError::Upstream(err.to_string()),
    }
}
