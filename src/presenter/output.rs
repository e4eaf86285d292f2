//! Rendering of environments and snapshot lists
//!
//! Text output is meant for shell consumption (`key="value"` lines can be
//! `eval`ed); JSON output wraps results in a `data` member, or an `errors`
//! member when there is nothing to show.

use crate::domain::ports::{CloneEnvironment, Snapshot};
use crate::error::Result;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Flat view of an environment, keyed the way shell scripts consume it
#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentView {
    pub symid: String,
    pub source_db: String,
    pub source_sg: String,
    pub source_dev_name: Vec<String>,
    pub source_devs: usize,
    pub source_is_metro: bool,
    pub target_db: Option<String>,
    pub target_sg: Option<String>,
    pub target_dev_name: Option<Vec<String>>,
    pub target_devs: Option<usize>,
    pub target_is_metro: Option<bool>,
    pub rdf_group: Option<u32>,
    pub snapshot_name: Option<String>,
}

impl From<&CloneEnvironment> for EnvironmentView {
    fn from(env: &CloneEnvironment) -> Self {
        let target = env.target.as_ref();
        Self {
            symid: env.array_id.to_string(),
            source_db: env.source_db.clone(),
            source_sg: env.source.name.clone(),
            source_dev_name: env.source.devices.clone(),
            source_devs: env.source.device_count,
            source_is_metro: env.source.is_mirrored(),
            target_db: env.target_db.clone(),
            target_sg: target.map(|t| t.group.name.clone()),
            target_dev_name: target.map(|t| t.group.devices.clone()),
            target_devs: target.map(|t| t.group.device_count),
            target_is_metro: target.map(|_| env.target_is_mirrored()),
            rdf_group: target.and_then(|t| t.mirror.group()).map(|g| g.0),
            snapshot_name: env.snapshot_name.clone(),
        }
    }
}

pub struct Presenter {
    format: OutputFormat,
}

impl Presenter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn environment(&self, env: &CloneEnvironment) -> Result<String> {
        let view = EnvironmentView::from(env);
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&json!({ "data": view }))?),
            OutputFormat::Text => {
                // Value maps are sorted by key
                let Value::Object(fields) = serde_json::to_value(&view)? else {
                    return Ok(String::new());
                };
                let lines: Vec<String> = fields
                    .iter()
                    .map(|(key, value)| format!("{}=\"{}\"", key, text_value(value)))
                    .collect();
                Ok(lines.join("\n"))
            }
        }
    }

    pub fn snapshots(&self, snapshots: &[Snapshot]) -> Result<String> {
        if snapshots.is_empty() {
            info!("No snapshots found.");
        }

        match self.format {
            OutputFormat::Json if snapshots.is_empty() => Ok(serde_json::to_string_pretty(&json!({
                "errors": {
                    "status": 404,
                    "title": "Not Found",
                    "detail": "No snapshots found.",
                }
            }))?),
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&json!({ "data": snapshots }))?),
            OutputFormat::Text => Ok(snapshots
                .iter()
                .map(|s| {
                    format!(
                        "snapshot_name={}  # Timestamp: {} Linked: {}",
                        s.name, s.timestamp, s.link
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")),
        }
    }
}

fn text_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(text_value).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}
