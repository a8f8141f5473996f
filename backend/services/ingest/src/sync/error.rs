use jobfeed_common::error::JobfeedError;

use crate::bullhorn::client::BullhornClientError;

/// Failures that end a reconciliation run.
///
/// Item-level problems (one job failing to fetch or map) are counted on the run
/// instead and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("upstream authentication failed: {0}")]
    Auth(String),

    #[error("upstream window unavailable: {0}")]
    WindowUnavailable(BullhornClientError),

    #[error(transparent)]
    Store(#[from] JobfeedError),
}

impl SyncError {
    /// Whether waiting for the next trigger is likely to fix this.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Auth(_) => false,
            Self::WindowUnavailable(_) => true,
            Self::Store(e) => e.is_retryable(),
        }
    }
}

impl From<BullhornClientError> for SyncError {
    fn from(err: BullhornClientError) -> Self {
        match err {
            BullhornClientError::Auth(msg) => Self::Auth(msg),
            other => Self::WindowUnavailable(other),
        }
    }
}

/// A persisted sweep cursor that does not belong to the diff being applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cursor from generation {cursor_generation} does not match generation {generation} / window {window_fingerprint}")]
pub struct CursorMismatch {
    pub cursor_generation: i64,
    pub generation: i64,
    pub window_fingerprint: String,
}
