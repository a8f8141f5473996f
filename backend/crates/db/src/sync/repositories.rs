use async_trait::async_trait;
use chrono::Duration;
use uuid::Uuid;

use crate::sync::models::{SyncRun, SyncWatermark};
use jobfeed_common::error::JobfeedResult;

#[async_trait]
pub trait SyncWatermarkRepository: Send + Sync {
    /// Get or create the watermark for a source.
    async fn get_or_create(&self, source: &str) -> JobfeedResult<SyncWatermark>;

    /// Atomically set status to 'running' unless another run holds the lock.
    /// A 'running' lock not touched for `stale_after` is treated as abandoned and taken over.
    /// Returns `None` if the lock is held (not acquired).
    async fn acquire_lock(
        &self,
        source: &str,
        stale_after: Duration,
    ) -> JobfeedResult<Option<SyncWatermark>>;

    /// Release the lock after a successful run, storing the sweep cursor (or clearing it)
    /// and the generation counter.
    async fn mark_completed(
        &self,
        id: Uuid,
        cursor_value: Option<&str>,
        generation: i64,
    ) -> JobfeedResult<SyncWatermark>;

    /// Release the lock after a failed run. Cursor and generation are left untouched.
    async fn mark_failed(&self, id: Uuid, error_message: &str) -> JobfeedResult<SyncWatermark>;

    /// Append a run record.
    async fn record_run(&self, run: &SyncRun) -> JobfeedResult<()>;

    /// Most recent run record for a source, if any.
    async fn latest_run(&self, source: &str) -> JobfeedResult<Option<SyncRun>>;
}
