use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use serde_json::{Value, json};
use tracing::warn;

use crate::diff::diff_vars;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLogMode {
    Full,
    Diffed,
}

impl MessageLogMode {
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "full" => Some(MessageLogMode::Full),
            "diffed" => Some(MessageLogMode::Diffed),
            _ => None,
        }
    }
}

/// Appends one JSON object per line for every request, poll and write.
pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    file: File,
    previous_vars: Option<HashMap<String, String>>,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            mode,
            file,
            previous_vars: None,
        })
    }

    pub fn log_request(&mut self, action: &str, body: &Value) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "req",
            "action": action,
            "body": body,
        });
        self.write_line(&entry);
    }

    pub fn log_failure(&mut self, action: &str, error: &str) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "err",
            "action": action,
            "error": error,
        });
        self.write_line(&entry);
    }

    pub fn log_write(&mut self, body: &Value) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "write",
            "body": body,
        });
        self.write_line(&entry);
    }

    pub fn log_poll(&mut self, vars: &HashMap<String, String>) {
        let entry = match (self.mode, &self.previous_vars) {
            (MessageLogMode::Diffed, Some(prev)) => {
                let changes: Vec<Value> = diff_vars(prev, vars)
                    .into_iter()
                    .map(|c| json!({ "name": c.name, "old": c.old, "new": c.new }))
                    .collect();
                json!({
                    "ts": Utc::now().to_rfc3339(),
                    "dir": "poll",
                    "changes": changes,
                })
            }
            (MessageLogMode::Diffed, None) => json!({
                "ts": Utc::now().to_rfc3339(),
                "dir": "poll",
                "full": true,
                "vars": vars,
            }),
            (MessageLogMode::Full, _) => json!({
                "ts": Utc::now().to_rfc3339(),
                "dir": "poll",
                "vars": vars,
            }),
        };
        self.write_line(&entry);
        if self.mode == MessageLogMode::Diffed {
            self.previous_vars = Some(vars.clone());
        }
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write message log entry: {e}");
        }
    }
}
