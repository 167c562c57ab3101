//! JSONL file writer for coordination events.
//!
//! Each [`CoordinationEvent`] is written as a single JSON line: the event
//! payload (which already carries `type`) plus a `timestamp`.

use council_application::{CoordinationEvent, CoordinationObserver};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Observer that appends one JSON object per event to a file.
///
/// Thread-safe via `Mutex<BufWriter<File>>`. Flushes after every line and
/// on `Drop`.
pub struct JsonlEventLogger {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlEventLogger {
    /// Open `path` for appending, creating it and its parent directories.
    ///
    /// Returns `None` if the file cannot be opened.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(
                "Could not create event log directory {}: {}",
                parent.display(),
                e
            );
            return None;
        }

        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not open event log file {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn record(event: &CoordinationEvent) -> Value {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        match event.payload() {
            Value::Object(mut map) => {
                map.insert("timestamp".to_string(), Value::String(timestamp));
                Value::Object(map)
            }
            other => serde_json::json!({
                "type": event.name(),
                "timestamp": timestamp,
                "data": other,
            }),
        }
    }
}

impl CoordinationObserver for JsonlEventLogger {
    fn on_event(&self, event: &CoordinationEvent) {
        let Ok(line) = serde_json::to_string(&Self::record(event)) else {
            return;
        };

        let mut writer = self.writer.lock().unwrap_or_else(|p| p.into_inner());
        if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
            warn!("Could not write event log {}: {}", self.path.display(), e);
        }
    }
}

impl Drop for JsonlEventLogger {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_domain::{AgentType, RiskTier};

    fn read_lines(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_writes_one_object_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("events.jsonl");
        let logger = JsonlEventLogger::new(&path).unwrap();

        logger.on_event(&CoordinationEvent::ProcessingStarted {
            agent_id: "intake-1".to_string(),
            agent_type: AgentType::Intake,
            session_id: "s-1".to_string(),
        });
        logger.on_event(&CoordinationEvent::EscalationTriggered {
            session_id: "s-1".to_string(),
            reason: "crisis risk detected (crisis tier)".to_string(),
            risk_tier: RiskTier::Crisis,
        });
        drop(logger);

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "processing_started");
        assert_eq!(lines[0]["agent_type"], "intake");
        assert!(lines[0]["timestamp"].is_string());
        assert_eq!(lines[1]["type"], "escalation_triggered");
        assert_eq!(lines[1]["risk_tier"], "crisis");
    }

    #[test]
    fn test_reopening_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let event = CoordinationEvent::SessionCompleted {
            collaboration_id: "collab-1".to_string(),
            duration_ms: 12,
        };

        for _ in 0..2 {
            let logger = JsonlEventLogger::new(&path).unwrap();
            logger.on_event(&event);
        }

        assert_eq!(read_lines(&path).len(), 2);
    }

    #[test]
    fn test_unwritable_path_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();

        assert!(JsonlEventLogger::new(blocker.join("events.jsonl")).is_none());
    }
}
