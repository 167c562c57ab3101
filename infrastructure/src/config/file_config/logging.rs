//! Logging configuration from TOML (`[logging]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where log output goes.
///
/// ```toml
/// [logging]
/// directory = "/var/log/care-council"   # daily rolling file log
/// event_log = "council-events.jsonl"     # coordination events, one JSON object per line
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// Directory of the daily rolling file log. `None` disables it.
    pub directory: Option<PathBuf>,
    /// JSONL file receiving coordination events. `None` disables it.
    pub event_log: Option<PathBuf>,
}
