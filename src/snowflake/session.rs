//! Session settings for the warehouse SQL statements API.
//!
//! The bearer token is wrapped in `SecretString` so it never shows up in
//! `Debug` output or logs. Acquiring the token (browser SSO, key-pair JWT,
//! OAuth) is the caller's job; this crate only uses an already-issued one.

use std::fmt;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::DEFAULT_FETCH_BATCH_SIZE;
use crate::error::AppError;

/// Default server-side statement timeout in seconds.
pub const DEFAULT_STATEMENT_TIMEOUT_SECS: u64 = 3_600;

/// Default interval between status polls for long-running statements.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Kind of bearer token presented to the statements API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    #[default]
    Oauth,
    KeypairJwt,
}

impl TokenType {
    /// Value of the `X-Snowflake-Authorization-Token-Type` header.
    pub fn header_value(self) -> &'static str {
        match self {
            TokenType::Oauth => "OAUTH",
            TokenType::KeypairJwt => "KEYPAIR_JWT",
        }
    }
}

/// Connection settings for one authenticated warehouse session.
#[derive(Clone)]
pub struct SessionConfig {
    /// Account URL, e.g. `https://myorg-myaccount.snowflakecomputing.com`.
    pub account_url: Url,
    /// Login e-mail of the user the token was issued to.
    pub user: String,
    /// Bearer token (wrapped for security).
    pub token: SecretString,
    pub token_type: TokenType,
    pub warehouse: Option<String>,
    pub role: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    /// Server-side statement timeout in seconds.
    pub statement_timeout_secs: u64,
    /// HTTP request timeout.
    pub request_timeout: Duration,
    /// Interval between status polls while a statement is still running.
    pub poll_interval: Duration,
    /// Rows handed to the chunk writer per fetch.
    pub fetch_batch_size: usize,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("account_url", &self.account_url.as_str())
            .field("user", &self.user)
            .field("token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("warehouse", &self.warehouse)
            .field("role", &self.role)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("statement_timeout_secs", &self.statement_timeout_secs)
            .field("request_timeout", &self.request_timeout)
            .field("poll_interval", &self.poll_interval)
            .field("fetch_batch_size", &self.fetch_batch_size)
            .finish()
    }
}

impl SessionConfig {
    /// Creates settings with defaults for everything but the identity.
    pub fn new(account_url: Url, user: impl Into<String>, token: SecretString) -> Self {
        Self {
            account_url,
            user: user.into().trim().to_string(),
            token,
            token_type: TokenType::default(),
            warehouse: None,
            role: None,
            database: None,
            schema: None,
            statement_timeout_secs: DEFAULT_STATEMENT_TIMEOUT_SECS,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            poll_interval: DEFAULT_POLL_INTERVAL,
            fetch_batch_size: DEFAULT_FETCH_BATCH_SIZE,
        }
    }

    /// Checks the settings before any network traffic.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for a malformed e-mail, a non-HTTP account
    /// URL, or a zero batch size.
    pub fn validate(&self) -> Result<(), AppError> {
        if !is_valid_email(&self.user) {
            return Err(AppError::Config(
                "Enter a valid email address (e.g., name@example.com).".to_string(),
            ));
        }

        if !matches!(self.account_url.scheme(), "https" | "http") {
            return Err(AppError::Config(format!(
                "Account URL must use https, got {}",
                self.account_url.scheme()
            )));
        }

        if self.fetch_batch_size == 0 {
            return Err(AppError::Config(
                "Fetch batch size must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Minimal syntactic check: a non-empty local part and domain around one `@`.
fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(user: &str) -> SessionConfig {
        SessionConfig::new(
            Url::parse("https://acme.snowflakecomputing.com").unwrap(),
            user,
            SecretString::from("secret-token".to_string()),
        )
    }

    #[test]
    fn test_valid_email_accepted() {
        assert!(config(" name@example.com ").validate().is_ok());
    }

    #[test]
    fn test_invalid_emails_rejected() {
        for user in ["", "name", "@example.com", "name@", "a@b@c", "na me@example.com"] {
            assert!(
                matches!(config(user).validate(), Err(AppError::Config(_))),
                "{:?} should be rejected",
                user
            );
        }
    }

    #[test]
    fn test_non_http_url_rejected() {
        let mut cfg = config("name@example.com");
        cfg.account_url = Url::parse("ftp://acme.example.com").unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_token() {
        let debug = format!("{:?}", config("name@example.com"));
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("secret-token"));
    }

    #[test]
    fn test_token_type_headers() {
        assert_eq!(TokenType::Oauth.header_value(), "OAUTH");
        assert_eq!(TokenType::KeypairJwt.header_value(), "KEYPAIR_JWT");
    }
}
