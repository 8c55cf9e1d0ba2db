use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::config::{DEFAULT_STATUS, ID_TIME_FORMAT, RECORD_TIME_FORMAT};
use crate::process::introspect::ProcessStats;

/// Broad category of a tracked process, persisted as `"type"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProcessKind {
    Application,
    WebService,
    Server,
    Custom,
    /// Anything written by another tool version; kept verbatim.
    Other(String),
}

impl ProcessKind {
    pub fn as_str(&self) -> &str {
        match self {
            ProcessKind::Application => "application",
            ProcessKind::WebService => "web_service",
            ProcessKind::Server => "server",
            ProcessKind::Custom => "custom",
            ProcessKind::Other(value) => value,
        }
    }
}

impl From<String> for ProcessKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "application" => ProcessKind::Application,
            "web_service" => ProcessKind::WebService,
            "server" => ProcessKind::Server,
            "custom" => ProcessKind::Custom,
            _ => ProcessKind::Other(value),
        }
    }
}

impl From<ProcessKind> for String {
    fn from(kind: ProcessKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ProcessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the registry file. The id is the map key, not a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub name: String,
    pub pid: u32,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub started_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ProcessKind>,
    /// Fields this version does not model (e.g. `project_path`), preserved on rewrite.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn default_status() -> String {
    DEFAULT_STATUS.to_string()
}

impl ProcessRecord {
    /// A fresh record stamped with the current local time.
    pub fn new(
        name: impl Into<String>,
        pid: u32,
        command: impl Into<String>,
        url: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            pid,
            command: command.into(),
            started_at: Local::now().format(RECORD_TIME_FORMAT).to_string(),
            url,
            status: default_status(),
            kind: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_kind(mut self, kind: ProcessKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// A record as presented by `list()`: identity, stored metadata and a
/// best-effort live snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessView {
    pub id: String,
    pub record: ProcessRecord,
    pub stats: ProcessStats,
}

/// Time-based id: `<app>_<YYYYmmdd_HHMMSS>`.
pub fn generate_id(app: &str) -> String {
    format!("{}_{}", app, Local::now().format(ID_TIME_FORMAT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn url_omitted_when_absent() {
        let record = ProcessRecord::new("Jupyter Lab", 10, "jupyter lab", None);
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("url").is_none());
        assert_eq!(value["status"], "running");
    }

    #[test]
    fn unknown_fields_and_kinds_survive_round_trip() {
        let raw = json!({
            "name": "VS Code",
            "pid": 77,
            "command": "code .",
            "started_at": "2025-08-13 05:30:00",
            "status": "running",
            "type": "editor_window",
            "project_path": "/work/demo"
        });
        let record: ProcessRecord = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(record.kind, Some(ProcessKind::Other("editor_window".into())));
        assert_eq!(record.extra["project_path"], "/work/demo");
        assert_eq!(serde_json::to_value(&record).unwrap(), raw);
    }

    #[test]
    fn known_kind_parses() {
        let record: ProcessRecord =
            serde_json::from_value(json!({"name": "x", "pid": 1, "type": "web_service"})).unwrap();
        assert_eq!(record.kind, Some(ProcessKind::WebService));
        assert_eq!(record.status, "running");
    }

    #[test]
    fn missing_pid_is_rejected() {
        assert!(serde_json::from_value::<ProcessRecord>(json!({"name": "x"})).is_err());
    }

    #[test]
    fn generated_id_has_app_prefix() {
        let id = generate_id("jupyter");
        assert!(id.starts_with("jupyter_"));
        assert_eq!(id.len(), "jupyter_".len() + 15);
    }
}
