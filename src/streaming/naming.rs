//! Output file naming for chunked exports.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Base name used when sanitization leaves nothing behind.
pub const DEFAULT_BASE_NAME: &str = "LOCPRIORITY_UPLOAD";

/// How part files are named.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingScheme {
    /// `<base>_001.csv`, `<base>_002.csv`, ... with no limit on parts.
    #[default]
    AlwaysNumbered,
    /// `<base>.csv` for a single part; `<base>_001.csv` and `<base>_002.csv`
    /// once a second part is needed. A third part is a capacity error.
    ImplicitFirst,
}

impl NamingScheme {
    /// Most parts this scheme can produce, if capped.
    pub fn max_parts(self) -> Option<u32> {
        match self {
            NamingScheme::AlwaysNumbered => None,
            NamingScheme::ImplicitFirst => Some(2),
        }
    }

    /// Path of part `part_index` (1-based) while `total_parts` parts exist.
    ///
    /// Under `ImplicitFirst` the first part only carries a suffix once a
    /// second part has been opened.
    pub fn part_path(
        self,
        output_dir: &Path,
        base_name: &str,
        part_index: u32,
        total_parts: u32,
    ) -> PathBuf {
        match self {
            NamingScheme::ImplicitFirst if total_parts <= 1 => {
                output_dir.join(format!("{}.csv", base_name))
            }
            _ => output_dir.join(format!("{}_{:03}.csv", base_name, part_index)),
        }
    }
}

/// Keeps only alphanumerics, `-` and `_`; falls back to [`DEFAULT_BASE_NAME`].
pub fn sanitize_base_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|ch| ch.is_alphanumeric() || *ch == '-' || *ch == '_')
        .collect();

    if cleaned.is_empty() {
        DEFAULT_BASE_NAME.to_string()
    } else {
        cleaned
    }
}
