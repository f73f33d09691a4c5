//! Split CSV files and warehouse query results into bounded, numbered CSV parts.
//!
//! Rows are pulled one at a time from a [`source::RowSource`] and written by
//! the [`streaming::ChunkWriter`] into parts of at most 60,000 data rows,
//! with the header repeated at the top of every part.

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod snowflake;
pub mod source;
pub mod streaming;
pub mod validation;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub use config::{RowBudget, MAX_ROWS_PER_FILE};
pub use error::{AppError, ErrorKind, ErrorPresentation};
pub use export::{export_csv_file, export_query, FileExportRequest, QueryExportRequest};
pub use streaming::{ChunkConfig, ChunkObserver, ChunkSummary, ChunkWriter, NamingScheme};

/// Initialize tracing for the CLI.
///
/// Uses `RUST_LOG` environment variable for filtering, defaulting to `info` level.
/// Output goes to stderr so stdout stays free for the run summary.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();
}
