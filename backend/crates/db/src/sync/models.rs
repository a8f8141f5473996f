use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-source lock and checkpoint row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncWatermark {
    pub id: Uuid,
    pub source: String,
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Serialized [`SyncCursor`] while a deletion sweep is pending.
    pub cursor_value: Option<String>,
    /// Last diff generation handed out for this source.
    pub generation: i64,
    pub status: String,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Progress of a deletion sweep that did not fit into a single run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncCursor {
    pub generation: i64,
    /// Fingerprint of the upstream window the sweep's diff was computed against.
    pub window_fingerprint: String,
    /// Deletions already processed in this sweep.
    pub offset: usize,
    /// Highest external id processed so far; the sweep continues strictly after it.
    pub last_key: Option<String>,
}

impl SyncCursor {
    pub fn new(generation: i64, window_fingerprint: impl Into<String>) -> Self {
        Self {
            generation,
            window_fingerprint: window_fingerprint.into(),
            offset: 0,
            last_key: None,
        }
    }

    /// Record `processed` more deletions, the last of which was `last_key`.
    pub fn advance(&mut self, last_key: String, processed: usize) {
        self.last_key = Some(last_key);
        self.offset += processed;
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn decode(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
    Skipped,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            _ => Err(format!("unknown run status: {value}")),
        }
    }
}

/// Bookkeeping for one reconciliation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: Uuid,
    pub source: String,
    pub trigger: String,
    pub status: RunStatus,
    pub generation: i64,
    pub window_size: i32,
    pub window_truncated: bool,
    pub created: i32,
    pub updated: i32,
    pub unchanged: i32,
    pub deleted: i32,
    pub skipped: i32,
    pub errors: i32,
    pub sweep_pending: bool,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
