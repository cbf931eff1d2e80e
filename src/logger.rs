use std::fs::{File, OpenOptions};
use std::io::Write;

use chrono::Utc;
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::diff::diff_json;

/// How poll responses are written to the wire log.
pub enum MessageLogMode {
    /// Every poll body in full.
    Full,
    /// First poll in full, then only the changed paths.
    Diffed,
}

pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    file: File,
    previous_state: Option<Value>,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            mode,
            file,
            previous_state: None,
        })
    }

    pub fn log_request(&mut self, method: &str, action: &str) {
        self.write_entry("req", json!({ "method": method, "action": action }));
    }

    pub fn log_command(&mut self, action: &str, device_uid: &str, form: &[(String, String)]) {
        let body: Map<String, Value> = form
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        self.write_entry(
            "cmd",
            json!({ "action": action, "device": device_uid, "body": body }),
        );
    }

    pub fn log_response(&mut self, action: &str, status: u16, body: &Value) {
        self.write_entry(
            "resp",
            json!({ "action": action, "status": status, "body": body }),
        );
    }

    /// In `Diffed` mode only the first poll carries the body; later ones
    /// list the changed paths against the previous poll.
    pub fn log_poll(&mut self, status: u16, body: &Value) {
        let fields = match (&self.mode, self.previous_state.take()) {
            (MessageLogMode::Full, _) => json!({ "status": status, "body": body }),
            (MessageLogMode::Diffed, None) => {
                json!({ "status": status, "full": true, "body": body })
            }
            (MessageLogMode::Diffed, Some(prev)) => {
                let mut changes = Vec::new();
                diff_json(&prev, body, "", &mut changes);
                let changes: Vec<Value> = changes
                    .into_iter()
                    .map(|(path, old, new)| json!({ "path": path, "old": old, "new": new }))
                    .collect();
                json!({ "status": status, "changes": changes })
            }
        };
        self.write_entry("poll", fields);

        if matches!(self.mode, MessageLogMode::Diffed) {
            self.previous_state = Some(body.clone());
        }
    }

    fn write_entry(&mut self, dir: &str, fields: Value) {
        let mut entry = Map::new();
        entry.insert("ts".into(), Value::String(Utc::now().to_rfc3339()));
        entry.insert("dir".into(), Value::String(dir.to_string()));
        if let Value::Object(fields) = fields {
            entry.extend(fields);
        }

        match serde_json::to_string(&entry) {
            Ok(line) => {
                if let Err(e) = writeln!(self.file, "{line}") {
                    warn!(error = %e, "failed to write message log entry");
                }
            }
            Err(e) => warn!(error = %e, "failed to encode message log entry"),
        }
    }
}
