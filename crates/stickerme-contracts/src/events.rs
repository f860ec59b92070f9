use std::fmt;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

/// Lifecycle points of one generation request that end up in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    GenerationRequested,
    ArtifactCreated,
    GenerationFailed,
}

impl AuditEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GenerationRequested => "generation_requested",
            Self::ArtifactCreated => "artifact_created",
            Self::GenerationFailed => "generation_failed",
        }
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requester-scoped audit trail, one JSON object per line.
///
/// The `type`, `ts` and `requester_id` header is written after the payload so a
/// payload key can never relabel whose request a line belongs to.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<AuditLog>,
}

#[derive(Debug)]
struct AuditLog {
    path: PathBuf,
    append: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(AuditLog {
                path: path.into(),
                append: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn emit(
        &self,
        event: AuditEvent,
        requester_id: &str,
        payload: EventPayload,
    ) -> anyhow::Result<Value> {
        let mut line = payload;
        line.insert("type".to_string(), Value::from(event.as_str()));
        line.insert(
            "ts".to_string(),
            Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
        line.insert("requester_id".to_string(), Value::from(requester_id));

        if let Some(parent) = self.inner.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut encoded = serde_json::to_vec(&line)?;
        encoded.push(b'\n');
        let _guard = self
            .inner
            .append
            .lock()
            .map_err(|_| anyhow::anyhow!("audit log lock poisoned"))?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?
            .write_all(&encoded)?;

        Ok(Value::Object(line))
    }

    /// Every recorded line for one requester, oldest first.
    ///
    /// A log that was never written reads as empty.
    pub fn history(&self, requester_id: &str) -> anyhow::Result<Vec<Value>> {
        let file = match std::fs::File::open(&self.inner.path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut lines = Vec::new();
        for raw in BufReader::new(file).lines() {
            let raw = raw?;
            if raw.trim().is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(&raw)?;
            if value.get("requester_id").and_then(Value::as_str) == Some(requester_id) {
                lines.push(value);
            }
        }
        Ok(lines)
    }
}
