//! Command-line arguments for the `rowsplit` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use secrecy::SecretString;
use url::Url;

use crate::config::{RowBudget, DEFAULT_FETCH_BATCH_SIZE, MAX_ROWS_PER_FILE};
use crate::error::AppError;
use crate::export::{FileExportRequest, QueryExportRequest};
use crate::snowflake::{SessionConfig, TokenType, DEFAULT_STATEMENT_TIMEOUT_SECS};
use crate::streaming::{ChunkConfig, NamingScheme, DEFAULT_BASE_NAME};

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Split a local CSV file into numbered parts
    File(FileArgs),
    /// Run a warehouse query and split its result into numbered parts
    Query(QueryArgs),
}

/// Options shared by every export.
#[derive(Args, Debug, Clone)]
pub struct ChunkArgs {
    /// Folder receiving the part files (must exist)
    #[arg(short, long)]
    pub output_dir: PathBuf,

    /// Base name for part files
    #[arg(short, long, default_value = DEFAULT_BASE_NAME)]
    pub base_name: String,

    /// Maximum data rows per file, header excluded
    #[arg(long, default_value_t = MAX_ROWS_PER_FILE)]
    pub max_rows: u64,

    /// Do not write a header row
    #[arg(long)]
    pub no_header: bool,

    /// Skip the item/loc/locpriority column check
    #[arg(long)]
    pub no_validate: bool,

    /// Part naming scheme
    #[arg(long, value_enum, default_value_t = NamingArg::Numbered)]
    pub naming: NamingArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingArg {
    /// Always `<base>_001.csv`, `<base>_002.csv`, ...
    Numbered,
    /// `<base>.csv` for one part, at most two parts
    ImplicitFirst,
}

impl From<NamingArg> for NamingScheme {
    fn from(arg: NamingArg) -> Self {
        match arg {
            NamingArg::Numbered => NamingScheme::AlwaysNumbered,
            NamingArg::ImplicitFirst => NamingScheme::ImplicitFirst,
        }
    }
}

impl ChunkArgs {
    /// Builds the chunker configuration, validating the row budget.
    pub fn chunk_config(&self) -> Result<ChunkConfig, AppError> {
        Ok(ChunkConfig::default()
            .max_rows(RowBudget::new(self.max_rows)?)
            .include_header(!self.no_header)
            .validate_columns(!self.no_validate)
            .naming(self.naming.into()))
    }
}

#[derive(Args, Debug)]
pub struct FileArgs {
    /// Input CSV file
    pub input: PathBuf,

    #[command(flatten)]
    pub chunk: ChunkArgs,
}

impl FileArgs {
    pub fn request(&self) -> FileExportRequest {
        FileExportRequest {
            input_path: self.input.clone(),
            output_dir: self.chunk.output_dir.clone(),
            base_name: self.chunk.base_name.clone(),
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenTypeArg {
    Oauth,
    KeypairJwt,
}

impl From<TokenTypeArg> for TokenType {
    fn from(arg: TokenTypeArg) -> Self {
        match arg {
            TokenTypeArg::Oauth => TokenType::Oauth,
            TokenTypeArg::KeypairJwt => TokenType::KeypairJwt,
        }
    }
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// SQL query text
    #[arg(short, long, conflicts_with = "query_file", required_unless_present = "query_file")]
    pub query: Option<String>,

    /// File containing the SQL query
    #[arg(long)]
    pub query_file: Option<PathBuf>,

    /// Account URL, e.g. https://myorg-myaccount.snowflakecomputing.com
    #[arg(long, env = "ROWSPLIT_ACCOUNT_URL")]
    pub account_url: Url,

    /// Login e-mail the token was issued to
    #[arg(long, env = "ROWSPLIT_USER")]
    pub user: String,

    /// Bearer token
    #[arg(long, env = "ROWSPLIT_TOKEN", hide_env_values = true)]
    pub token: String,

    #[arg(long, value_enum, default_value_t = TokenTypeArg::Oauth)]
    pub token_type: TokenTypeArg,

    #[arg(long)]
    pub warehouse: Option<String>,

    #[arg(long)]
    pub role: Option<String>,

    #[arg(long)]
    pub database: Option<String>,

    #[arg(long)]
    pub schema: Option<String>,

    /// Server-side statement timeout in seconds
    #[arg(long, default_value_t = DEFAULT_STATEMENT_TIMEOUT_SECS)]
    pub statement_timeout: u64,

    /// Rows pulled per fetch
    #[arg(long, default_value_t = DEFAULT_FETCH_BATCH_SIZE)]
    pub fetch_batch_size: usize,

    #[command(flatten)]
    pub chunk: ChunkArgs,
}

impl QueryArgs {
    /// Builds session settings. The token moves into a `SecretString`.
    pub fn session(&self) -> SessionConfig {
        let mut session = SessionConfig::new(
            self.account_url.clone(),
            self.user.clone(),
            SecretString::from(self.token.clone()),
        );
        session.token_type = self.token_type.into();
        session.warehouse = self.warehouse.clone();
        session.role = self.role.clone();
        session.database = self.database.clone();
        session.schema = self.schema.clone();
        session.statement_timeout_secs = self.statement_timeout;
        session.fetch_batch_size = self.fetch_batch_size;
        session
    }

    /// Builds the export request, reading the query file if one was given.
    pub fn request(&self) -> Result<QueryExportRequest, AppError> {
        let query = match (&self.query, &self.query_file) {
            (Some(query), _) => query.clone(),
            (None, Some(path)) => std::fs::read_to_string(path).map_err(|e| {
                AppError::Config(format!(
                    "Failed to read query file {}: {}",
                    path.display(),
                    e
                ))
            })?,
            (None, None) => String::new(),
        };

        Ok(QueryExportRequest {
            query,
            output_dir: self.chunk.output_dir.clone(),
            base_name: self.chunk.base_name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_file_defaults() {
        let args = CliArgs::try_parse_from(["rowsplit", "file", "in.csv", "-o", "out"]).unwrap();
        let Command::File(file) = args.command else {
            panic!("expected file subcommand");
        };

        let config = file.chunk.chunk_config().unwrap();
        assert_eq!(config.max_rows.get(), 60_000);
        assert!(config.include_header);
        assert!(config.validate_columns);
        assert_eq!(config.naming, NamingScheme::AlwaysNumbered);
        assert_eq!(file.request().base_name, DEFAULT_BASE_NAME);
    }

    #[test]
    fn test_file_flags() {
        let args = CliArgs::try_parse_from([
            "rowsplit",
            "file",
            "in.csv",
            "-o",
            "out",
            "--max-rows",
            "10",
            "--no-header",
            "--no-validate",
            "--naming",
            "implicit-first",
        ])
        .unwrap();
        let Command::File(file) = args.command else {
            panic!("expected file subcommand");
        };

        let config = file.chunk.chunk_config().unwrap();
        assert_eq!(config.max_rows.get(), 10);
        assert!(!config.include_header);
        assert!(!config.validate_columns);
        assert_eq!(config.naming, NamingScheme::ImplicitFirst);
    }

    #[test]
    fn test_max_rows_out_of_range() {
        let args = CliArgs::try_parse_from([
            "rowsplit", "file", "in.csv", "-o", "out", "--max-rows", "60001",
        ])
        .unwrap();
        let Command::File(file) = args.command else {
            panic!("expected file subcommand");
        };
        assert!(matches!(file.chunk.chunk_config(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_query_session() {
        let args = CliArgs::try_parse_from([
            "rowsplit",
            "query",
            "-q",
            "select 1",
            "-o",
            "out",
            "--account-url",
            "https://acme.snowflakecomputing.com",
            "--user",
            "name@example.com",
            "--token",
            "tok",
            "--warehouse",
            "WH",
        ])
        .unwrap();
        let Command::Query(query) = args.command else {
            panic!("expected query subcommand");
        };

        let session = query.session();
        assert_eq!(session.token.expose_secret(), "tok");
        assert_eq!(session.warehouse.as_deref(), Some("WH"));
        assert!(session.validate().is_ok());
        assert_eq!(query.request().unwrap().query, "select 1");
    }
}
