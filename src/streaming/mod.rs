//! Streaming utilities for splitting row streams into bounded CSV parts.
//!
//! This module provides the row-budgeted chunk writer, part file naming, and
//! atomic part writing with automatic cleanup on failure.

mod atomic_writer;
mod chunk_writer;
mod naming;

pub use atomic_writer::AtomicCsvWriter;
pub use chunk_writer::{run, ChunkConfig, ChunkObserver, ChunkSummary, ChunkWriter};
pub use naming::{sanitize_base_name, NamingScheme, DEFAULT_BASE_NAME};
