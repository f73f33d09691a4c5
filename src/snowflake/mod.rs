//! Warehouse access over the SQL statements REST API.
//!
//! - `session`: connection settings and token handling
//! - `statements`: async client for submit, poll, partition fetch and cancel
//! - `cursor`: blocking cursor adapter used by the remote row source

mod cursor;
mod session;
mod statements;

pub use cursor::SqlApiCursor;
pub use session::{SessionConfig, TokenType, DEFAULT_POLL_INTERVAL, DEFAULT_STATEMENT_TIMEOUT_SECS};
pub use statements::{ExecutedStatement, StatementClient};
