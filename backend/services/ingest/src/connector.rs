use async_trait::async_trait;

use jobfeed_db::sync::models::RunStatus;

use crate::sync::error::SyncError;

/// What a run is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Create, update and delete.
    Full,
    /// Deletions only; nothing is fetched or written besides removals.
    SweepOnly,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::SweepOnly => "sweep",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Scheduled,
    Manual,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncResult {
    pub source: String,
    pub status: RunStatus,
    pub generation: i64,
    pub window_size: usize,
    pub window_truncated: bool,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub errors: usize,
    pub sweep_pending: bool,
}

impl SyncResult {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            status: RunStatus::Completed,
            generation: 0,
            window_size: 0,
            window_truncated: false,
            created: 0,
            updated: 0,
            unchanged: 0,
            deleted: 0,
            skipped: 0,
            errors: 0,
            sweep_pending: false,
        }
    }

    /// A trigger that did not get to run because another run holds the lock.
    pub fn not_run(source: &str) -> Self {
        Self {
            status: RunStatus::Skipped,
            ..Self::new(source)
        }
    }

    /// Store writes performed by the run.
    pub fn mutations(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

#[async_trait]
pub trait Connector: Send + Sync {
    fn source_name(&self) -> &str;
    async fn sync(&self, mode: RunMode, trigger: TriggerKind) -> Result<SyncResult, SyncError>;
}
