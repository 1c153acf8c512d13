//! Ledger configuration persisted as `ledger_config.yaml`.
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Ledger-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Data format version for future migrations
    pub data_format_version: String,
    /// Shown when a production summary has nothing to add up
    pub empty_summary_placeholder: String,
    pub decimal_separator: char,
    /// `None` disables digit grouping
    pub thousands_separator: Option<char>,
    /// Prefixed to product and note when an entry is cancelled
    pub cancellation_marker: String,
    /// Reject updates whose history length no longer matches the stored entry
    pub optimistic_concurrency: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            data_format_version: "1.0".to_string(),
            empty_summary_placeholder: "-".to_string(),
            decimal_separator: ',',
            thousands_separator: Some('.'),
            cancellation_marker: "[CANCELADO]".to_string(),
            optimistic_concurrency: false,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}
