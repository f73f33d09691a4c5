//! Client for the warehouse SQL statements REST API.
//!
//! This module provides functionality to:
//! - Submit a statement and wait for it to finish (polling on HTTP 202)
//! - Read the result column list from the result set metadata
//! - Fetch result partitions one at a time
//! - Cancel a statement (best-effort)
//!
//! # Security
//!
//! - Statement text is never logged
//! - Auth headers and tokens are never logged
//! - Only HTTP method, path, and status codes are logged

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::error::AppError;
use crate::snowflake::session::SessionConfig;
use crate::source::Row;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Path of the statements endpoint.
const STATEMENTS_PATH: &str = "/api/v2/statements";

/// Header naming the kind of bearer token.
const TOKEN_TYPE_HEADER: &str = "x-snowflake-authorization-token-type";

/// User agent string for all API requests.
const CLIENT_USER_AGENT: &str = concat!("rowsplit/", env!("CARGO_PKG_VERSION"));

/// Extra time allowed on top of the server-side timeout before giving up.
const POLL_GRACE: Duration = Duration::from_secs(30);

// ─────────────────────────────────────────────────────────────────────────────
// Public Types
// ─────────────────────────────────────────────────────────────────────────────

/// A statement that finished executing.
#[derive(Debug, Clone)]
pub struct ExecutedStatement {
    /// Server handle used to fetch further partitions.
    pub handle: String,
    /// Result column names in order.
    pub columns: Vec<String>,
    /// Number of result partitions (at least 1 when rows exist).
    pub partition_count: usize,
    /// Rows of partition 0, returned inline with the submit response.
    pub first_partition: Vec<Row>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal Wire Types
// ─────────────────────────────────────────────────────────────────────────────

/// Request body for submitting a statement.
#[derive(Debug, Serialize)]
struct SubmitStatementRequest<'a> {
    statement: &'a str,
    timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    warehouse: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<&'a str>,
}

/// Body of submit, status and partition responses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireStatementResponse {
    #[serde(default)]
    statement_handle: Option<String>,
    #[serde(default)]
    result_set_meta_data: Option<WireResultSetMetaData>,
    #[serde(default)]
    data: Option<Vec<Vec<serde_json::Value>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResultSetMetaData {
    #[serde(default)]
    row_type: Vec<WireColumn>,
    #[serde(default)]
    partition_info: Vec<WirePartitionInfo>,
}

#[derive(Debug, Deserialize)]
struct WireColumn {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
struct WirePartitionInfo {
    row_count: u64,
}

/// Error body returned by the API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireApiError {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// StatementClient
// ─────────────────────────────────────────────────────────────────────────────

/// Async client for one warehouse session.
#[derive(Clone)]
pub struct StatementClient {
    /// Shared HTTP client.
    client: Arc<Client>,
    /// Session settings, including the bearer token.
    session: Arc<SessionConfig>,
}

impl StatementClient {
    /// Creates a client for `session`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the settings are invalid and
    /// `AppError::Internal` if the HTTP client cannot be built.
    pub fn new(session: SessionConfig) -> Result<Self, AppError> {
        session.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            TOKEN_TYPE_HEADER,
            HeaderValue::from_static(session.token_type.header_value()),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(session.request_timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
            session: Arc::new(session),
        })
    }

    /// The session this client talks to.
    pub fn session(&self) -> &SessionConfig {
        &self.session
    }

    /// Submits `statement` and waits until it has finished executing.
    ///
    /// `on_handle` is called as soon as the server assigns a handle, so a
    /// caller can cancel a statement whose wait fails midway.
    ///
    /// # Errors
    ///
    /// - `AppError::NotAuthenticated` - the token was rejected
    /// - `AppError::RateLimited` - too many requests
    /// - `AppError::ConnectionFailed` - network error
    /// - `AppError::Upstream` - the statement failed or timed out
    pub async fn execute(
        &self,
        statement: &str,
        mut on_handle: impl FnMut(&str),
    ) -> Result<ExecutedStatement, AppError> {
        let url = self.build_url(STATEMENTS_PATH)?;
        let body = SubmitStatementRequest {
            statement,
            timeout: self.session.statement_timeout_secs,
            warehouse: self.session.warehouse.as_deref(),
            role: self.session.role.as_deref(),
            database: self.session.database.as_deref(),
            schema: self.session.schema.as_deref(),
        };

        info!("[SQL] POST {} (submitting statement)", STATEMENTS_PATH);

        let response = self
            .client
            .post(url)
            .bearer_auth(self.session.token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ConnectionFailed(format!("Statement submit failed: {}", e)))?;

        let status = response.status();
        info!("[SQL] POST {} -> {}", STATEMENTS_PATH, status.as_u16());

        let mut wire = self.read_response(response, status).await?;
        let handle = wire
            .statement_handle
            .clone()
            .ok_or_else(|| AppError::Upstream("Response is missing a statement handle".into()))?;
        on_handle(&handle);

        if status == StatusCode::ACCEPTED {
            wire = self.wait_for_completion(&handle).await?;
        }

        let meta = wire.result_set_meta_data.unwrap_or(WireResultSetMetaData {
            row_type: Vec::new(),
            partition_info: Vec::new(),
        });
        let columns: Vec<String> = meta.row_type.into_iter().map(|c| c.name).collect();
        let first_partition = wire.data.map(convert_rows).unwrap_or_default();

        info!(
            "[SQL] Statement {} complete: {} columns, {} partitions",
            redact_handle(&handle),
            columns.len(),
            meta.partition_info.len()
        );

        Ok(ExecutedStatement {
            handle,
            columns,
            partition_count: meta.partition_info.len(),
            first_partition,
        })
    }

    /// Fetches result partition `partition` of a finished statement.
    pub async fn fetch_partition(&self, handle: &str, partition: usize) -> Result<Vec<Row>, AppError> {
        let mut url = self.build_statement_url(handle)?;
        url.query_pairs_mut()
            .append_pair("partition", &partition.to_string());

        debug!(
            "[SQL] GET {}/{}?partition={}",
            STATEMENTS_PATH,
            redact_handle(handle),
            partition
        );

        let response = self
            .client
            .get(url)
            .bearer_auth(self.session.token.expose_secret())
            .send()
            .await
            .map_err(|e| AppError::ConnectionFailed(format!("Partition fetch failed: {}", e)))?;

        let status = response.status();
        let wire = self.read_response(response, status).await?;
        Ok(wire.data.map(convert_rows).unwrap_or_default())
    }

    /// Cancels a statement (best-effort).
    ///
    /// The statement may already have finished or failed.
    pub async fn cancel(&self, handle: &str) -> Result<(), AppError> {
        let url = self.build_url(&format!("{}/{}/cancel", STATEMENTS_PATH, handle))?;

        info!(
            "[SQL] POST {}/{}/cancel (cancelling)",
            STATEMENTS_PATH,
            redact_handle(handle)
        );

        let response = self
            .client
            .post(url)
            .bearer_auth(self.session.token.expose_secret())
            .send()
            .await
            .map_err(|e| AppError::ConnectionFailed(format!("Statement cancel failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.parse_error_response(response, status).await);
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Polling
    // ─────────────────────────────────────────────────────────────────────────

    /// Polls the statement status until the server stops answering 202.
    async fn wait_for_completion(&self, handle: &str) -> Result<WireStatementResponse, AppError> {
        let deadline = Instant::now()
            + Duration::from_secs(self.session.statement_timeout_secs)
            + POLL_GRACE;

        loop {
            tokio::time::sleep(self.session.poll_interval).await;

            if Instant::now() > deadline {
                return Err(AppError::Upstream(
                    "Timed out waiting for the query to finish".to_string(),
                ));
            }

            let url = self.build_statement_url(handle)?;
            let response = self
                .client
                .get(url)
                .bearer_auth(self.session.token.expose_secret())
                .send()
                .await
                .map_err(|e| AppError::ConnectionFailed(format!("Status poll failed: {}", e)))?;

            let status = response.status();
            debug!(
                "[SQL] GET {}/{} -> {}",
                STATEMENTS_PATH,
                redact_handle(handle),
                status.as_u16()
            );

            let wire = self.read_response(response, status).await?;
            if status != StatusCode::ACCEPTED {
                return Ok(wire);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // URL Builders
    // ─────────────────────────────────────────────────────────────────────────

    fn build_url(&self, path: &str) -> Result<Url, AppError> {
        self.session
            .account_url
            .join(path)
            .map_err(|e| AppError::Config(format!("Failed to build API URL: {}", e)))
    }

    /// Builds `/api/v2/statements/{handle}`.
    fn build_statement_url(&self, handle: &str) -> Result<Url, AppError> {
        self.build_url(&format!("{}/{}", STATEMENTS_PATH, handle))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Error Handling
    // ─────────────────────────────────────────────────────────────────────────

    /// Decodes a success body or maps a failure status to an error.
    async fn read_response(
        &self,
        response: reqwest::Response,
        status: StatusCode,
    ) -> Result<WireStatementResponse, AppError> {
        if !status.is_success() {
            return Err(self.parse_error_response(response, status).await);
        }

        response
            .json::<WireStatementResponse>()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse statement response: {}", e)))
    }

    /// Parses an error response and maps to the appropriate AppError.
    async fn parse_error_response(&self, response: reqwest::Response, status: StatusCode) -> AppError {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return AppError::NotAuthenticated;
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            return AppError::RateLimited {
                retry_after_secs: retry_after,
            };
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("Unable to read error body"));

        if let Ok(error) = serde_json::from_str::<WireApiError>(&body) {
            return match error.code {
                Some(code) => AppError::Upstream(format!("[{}] {}", code, error.message)),
                None => AppError::Upstream(error.message),
            };
        }

        AppError::Upstream(format!(
            "HTTP {} - {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown error")
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helper Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Converts JSON result rows into positional text rows.
///
/// Values arrive as strings or null; anything else is rendered as JSON text.
fn convert_rows(data: Vec<Vec<serde_json::Value>>) -> Vec<Row> {
    data.into_iter()
        .map(|fields| {
            Row::new(
                fields
                    .into_iter()
                    .map(|value| match value {
                        serde_json::Value::Null => None,
                        serde_json::Value::String(s) => Some(s),
                        other => Some(other.to_string()),
                    })
                    .collect(),
            )
        })
        .collect()
}

/// Redacts a statement handle for logging (shows first 8 chars).
fn redact_handle(handle: &str) -> String {
    match handle.char_indices().nth(8) {
        Some((idx, _)) => format!("{}...", &handle[..idx]),
        None => handle.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
