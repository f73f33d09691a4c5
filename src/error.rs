use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Patterns (lowercase) that indicate sensitive data not safe for UI display.
/// Used by `contains_sensitive()` for case-insensitive matching.
pub(crate) const SENSITIVE_PATTERNS: &[&str] = &[
    "bearer ",
    "authorization:",
    "access_token",
    "token=",
    "password",
    "private_key",
];

/// Returns true if the message contains any sensitive pattern (case-insensitive).
fn contains_sensitive(msg: &str) -> bool {
    let lower = msg.to_ascii_lowercase();
    SENSITIVE_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Sanitizes a message for display.
/// If sensitive content is detected, returns the fallback instead.
fn sanitize_message(msg: &str, fallback: &str) -> String {
    if contains_sensitive(msg) {
        fallback.into()
    } else {
        msg.to_string()
    }
}

/// User-friendly error presentation for a front end or terminal.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPresentation {
    pub title: String,
    pub message: String,
    pub action: Option<String>,
}

/// Coarse classification of an [`AppError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad paths, bad row-budget bounds, invalid request fields.
    Configuration,
    /// Missing header, missing required columns, empty result schema.
    Schema,
    /// More output parts than the naming scheme allows.
    Capacity,
    /// Filesystem create/write/rename/delete failures and unreadable input.
    Io,
    /// Query execution, authentication or connection failures from the warehouse.
    Upstream,
    /// The run was cancelled by the caller.
    Cancelled,
    /// Anything else.
    Internal,
}

/// Application-wide error type.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Configuration ─────────────────────────────────────────────────────────
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Input file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    // ── Schema / capacity ─────────────────────────────────────────────────────
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Capacity exceeded: {0}")]
    Capacity(String),

    // ── File / CSV ────────────────────────────────────────────────────────────
    #[error("I/O error: {0}")]
    Io(String),

    #[error("File is not valid UTF-8")]
    NotUtf8,

    #[error("Invalid CSV: {0}")]
    CsvInvalid(String),

    // ── Warehouse ─────────────────────────────────────────────────────────────
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Export failed: {0}")]
    Upstream(String),

    // ── Control ───────────────────────────────────────────────────────────────
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the taxonomy class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Config(_) | AppError::FileNotFound(_) => ErrorKind::Configuration,
            AppError::Schema(_) => ErrorKind::Schema,
            AppError::Capacity(_) => ErrorKind::Capacity,
            AppError::Io(_) | AppError::NotUtf8 | AppError::CsvInvalid(_) => ErrorKind::Io,
            AppError::NotAuthenticated
            | AppError::RateLimited { .. }
            | AppError::ConnectionFailed(_)
            | AppError::Upstream(_) => ErrorKind::Upstream,
            AppError::Cancelled => ErrorKind::Cancelled,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Converts the error into a user-friendly presentation suitable for display.
    /// Never leaks secrets, tokens, or credentials.
    pub fn to_presentation(&self) -> ErrorPresentation {
        match self {
            // ── Configuration ─────────────────────────────────────────────────
            AppError::Config(msg) => ErrorPresentation {
                title: "Invalid Settings".into(),
                message: sanitize_message(msg, "The export settings are not valid."),
                action: Some("Correct the settings and try again".into()),
            },

            AppError::FileNotFound(path) => ErrorPresentation {
                title: "File Not Found".into(),
                message: format!("Input file not found: {}", path.display()),
                action: Some("Choose an existing input file".into()),
            },

            // ── Schema / capacity ─────────────────────────────────────────────
            AppError::Schema(msg) => ErrorPresentation {
                title: "Unexpected Columns".into(),
                message: msg.clone(),
                action: Some("Check that the input has the item, loc and locpriority columns".into()),
            },

            AppError::Capacity(msg) => ErrorPresentation {
                title: "Too Many Rows".into(),
                message: msg.clone(),
                action: Some("Use numbered output to allow more than two files".into()),
            },

            // ── File / CSV ────────────────────────────────────────────────────
            AppError::Io(msg) => ErrorPresentation {
                title: "File Error".into(),
                message: msg.clone(),
                action: Some("Check folder permissions and free disk space".into()),
            },

            AppError::NotUtf8 => ErrorPresentation {
                title: "Invalid File Encoding".into(),
                message: "The file must be UTF-8 encoded. Please re-save your file with UTF-8 encoding.".into(),
                action: Some("Convert file to UTF-8".into()),
            },

            AppError::CsvInvalid(msg) => ErrorPresentation {
                title: "Invalid CSV".into(),
                message: format!("The CSV file has a formatting problem: {}", msg),
                action: Some("Fix the CSV file and try again".into()),
            },

            // ── Warehouse ─────────────────────────────────────────────────────
            AppError::NotAuthenticated => ErrorPresentation {
                title: "Not Logged In".into(),
                message: "The warehouse rejected the session credentials.".into(),
                action: Some("Log in again and retry".into()),
            },

            AppError::RateLimited { retry_after_secs } => {
                let wait_msg = match retry_after_secs {
                    Some(secs) => format!("Please wait {} seconds before trying again.", secs),
                    None => "Please wait a moment before trying again.".into(),
                };
                ErrorPresentation {
                    title: "Too Many Requests".into(),
                    message: format!("The warehouse is limiting requests. {}", wait_msg),
                    action: Some("Wait and retry".into()),
                }
            }

            AppError::ConnectionFailed(_) => ErrorPresentation {
                title: "Connection Failed".into(),
                message: "Could not connect to the warehouse. Please check your network connection.".into(),
                action: Some("Check network and retry".into()),
            },

            AppError::Upstream(msg) => ErrorPresentation {
                title: "Query Failed".into(),
                message: sanitize_message(msg, "The warehouse query failed."),
                action: Some("Review the query and try again".into()),
            },

            // ── Control ───────────────────────────────────────────────────────
            AppError::Cancelled => ErrorPresentation {
                title: "Cancelled".into(),
                message: "The operation was cancelled.".into(),
                action: None,
            },

            AppError::Internal(_) => ErrorPresentation {
                title: "Unexpected Error".into(),
                message: "Something went wrong. Please try again.".into(),
                action: Some("Try again".into()),
            },
        }
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_presentation().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Returns all AppError variants for exhaustive testing.
    fn all_variants() -> Vec<AppError> {
        vec![
            AppError::Config("row budget out of range".into()),
            AppError::FileNotFound(PathBuf::from("/missing/in.csv")),
            AppError::Schema("missing loc".into()),
            AppError::Capacity("third file required".into()),
            AppError::Io("disk full".into()),
            AppError::NotUtf8,
            AppError::CsvInvalid("unterminated quote".into()),
            AppError::NotAuthenticated,
            AppError::RateLimited { retry_after_secs: Some(30) },
            AppError::RateLimited { retry_after_secs: None },
            AppError::ConnectionFailed("timeout".into()),
            AppError::Upstream("SQL compilation error".into()),
            AppError::Cancelled,
            AppError::Internal("something broke".into()),
        ]
    }

    #[test]
    fn all_variants_have_nonempty_title_and_message() {
        for variant in all_variants() {
            let presentation = variant.to_presentation();
            assert!(
                !presentation.title.trim().is_empty(),
                "Empty title for {:?}",
                variant
            );
            assert!(
                !presentation.message.trim().is_empty(),
                "Empty message for {:?}",
                variant
            );
        }
    }

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(AppError::Config("x".into()).kind(), ErrorKind::Configuration);
        assert_eq!(
            AppError::FileNotFound(PathBuf::from("a.csv")).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(AppError::Schema("x".into()).kind(), ErrorKind::Schema);
        assert_eq!(AppError::Capacity("x".into()).kind(), ErrorKind::Capacity);
        assert_eq!(AppError::Io("x".into()).kind(), ErrorKind::Io);
        assert_eq!(AppError::NotUtf8.kind(), ErrorKind::Io);
        assert_eq!(AppError::NotAuthenticated.kind(), ErrorKind::Upstream);
        assert_eq!(AppError::Upstream("x".into()).kind(), ErrorKind::Upstream);
        assert_eq!(AppError::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn schema_error_names_required_columns() {
        let presentation = AppError::Schema("missing".into()).to_presentation();
        let action = presentation.action.expect("schema error should have action");
        assert!(action.contains("locpriority"));
    }

    #[test]
    fn rate_limited_mentions_retry_time() {
        let presentation = AppError::RateLimited { retry_after_secs: Some(30) }.to_presentation();
        assert!(presentation.message.contains("30"));
        let action = presentation.action.expect("RateLimited should have action");
        assert!(action.to_lowercase().contains("retry"));
    }

    #[test]
    fn serialization_produces_valid_json_with_required_fields() {
        for variant in all_variants() {
            let json = serde_json::to_string(&variant)
                .unwrap_or_else(|_| panic!("Failed to serialize {:?}", variant));
            let parsed: serde_json::Value = serde_json::from_str(&json)
                .unwrap_or_else(|_| panic!("Failed to parse JSON for {:?}", variant));

            assert!(parsed.get("title").is_some(), "{:?} missing title", variant);
            assert!(parsed.get("message").is_some(), "{:?} missing message", variant);
            assert!(parsed.get("action").is_some(), "{:?} missing action", variant);
        }
    }

    #[test]
    fn no_secret_leakage_in_presentation() {
        let test_cases: Vec<(&str, AppError)> = vec![
            ("Upstream", AppError::Upstream("Authorization: Bearer abc123".into())),
            ("Config", AppError::Config("token=xyz is malformed".into())),
            ("ConnectionFailed", AppError::ConnectionFailed("access_token=xyz".into())),
            ("Internal", AppError::Internal("private_key leaked".into())),
        ];

        for (label, variant) in test_cases {
            let presentation = variant.to_presentation();
            let output_lower = format!(
                "{} {} {}",
                presentation.title,
                presentation.message,
                presentation.action.as_deref().unwrap_or("")
            )
            .to_ascii_lowercase();

            for pattern in SENSITIVE_PATTERNS {
                assert!(
                    !output_lower.contains(pattern),
                    "{} presentation contains sensitive pattern",
                    label
                );
            }
        }
    }
}
