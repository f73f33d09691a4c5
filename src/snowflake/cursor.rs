//! Blocking [`QueryCursor`] over the statements API.
//!
//! The chunk writer pulls rows synchronously, so this adapter drives the
//! async [`StatementClient`] through a runtime handle. It must be used from a
//! blocking thread (`spawn_blocking`), never from inside an async task.

use std::collections::VecDeque;

use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::snowflake::statements::StatementClient;
use crate::source::{QueryCursor, Row};

/// Cursor over the partitions of one statement result.
pub struct SqlApiCursor {
    client: StatementClient,
    runtime: Handle,
    /// Handle of the executing or executed statement.
    statement: Option<String>,
    pending: VecDeque<Row>,
    partition_count: usize,
    next_partition: usize,
    /// All partitions were handed out; nothing is left to cancel.
    drained: bool,
}

impl SqlApiCursor {
    /// Creates a cursor that runs requests on `runtime`.
    pub fn new(client: StatementClient, runtime: Handle) -> Self {
        Self {
            client,
            runtime,
            statement: None,
            pending: VecDeque::new(),
            partition_count: 0,
            next_partition: 0,
            drained: false,
        }
    }

    fn has_more_partitions(&self) -> bool {
        self.next_partition < self.partition_count
    }
}

impl QueryCursor for SqlApiCursor {
    fn execute(&mut self, query: &str) -> Result<Vec<String>, AppError> {
        let mut assigned = None;
        let result = self
            .runtime
            .block_on(self.client.execute(query, |h| assigned = Some(h.to_string())));

        let executed = match result {
            Ok(executed) => executed,
            Err(e) => {
                // Keep the handle so close() can cancel it.
                self.statement = assigned;
                return Err(e);
            }
        };
        self.statement = Some(executed.handle);

        self.pending = executed.first_partition.into();
        self.partition_count = executed.partition_count;
        self.next_partition = 1;
        self.drained = self.pending.is_empty() && !self.has_more_partitions();
        Ok(executed.columns)
    }

    fn fetch_many(&mut self, size: usize) -> Result<Vec<Row>, AppError> {
        let Some(handle) = self.statement.clone() else {
            return Ok(Vec::new());
        };

        while self.pending.len() < size && self.has_more_partitions() {
            let partition = self.next_partition;
            let rows = self
                .runtime
                .block_on(self.client.fetch_partition(&handle, partition))?;
            debug!(partition, rows = rows.len(), "Fetched result partition");
            self.pending.extend(rows);
            self.next_partition += 1;
        }

        let take = size.min(self.pending.len());
        let batch: Vec<Row> = self.pending.drain(..take).collect();

        if self.pending.is_empty() && !self.has_more_partitions() {
            self.drained = true;
        }
        Ok(batch)
    }

    fn close(&mut self) {
        let Some(handle) = self.statement.take() else {
            return;
        };
        self.pending.clear();

        if self.drained {
            return;
        }

        if let Err(e) = self.runtime.block_on(self.client.cancel(&handle)) {
            warn!("Failed to cancel statement: {}", e);
        }
    }
}
