use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::jobs::models::{JobFilter, JobRecord, JobSyncState};
use jobfeed_common::error::JobfeedResult;

#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Every stored (external_id, modified, hash) triple for one listing collection.
    async fn list_sync_states(&self, listing_type: &str) -> JobfeedResult<Vec<JobSyncState>>;

    /// Insert or update a record keyed by (listing_type, external_id).
    /// On conflict, replaces the synced fields but preserves `id` and `created_at`.
    async fn upsert(&self, record: &JobRecord) -> JobfeedResult<()>;

    /// Record a new upstream modification time without touching content.
    /// Returns `false` if the record does not exist.
    async fn touch_modified(
        &self,
        listing_type: &str,
        external_id: &str,
        modified_at: DateTime<Utc>,
    ) -> JobfeedResult<bool>;

    /// Remove one record. Returns `false` if it was already gone.
    async fn delete(&self, listing_type: &str, external_id: &str) -> JobfeedResult<bool>;

    /// Read-side listing used by consumers of the store.
    async fn list(&self, filter: &JobFilter) -> JobfeedResult<Vec<JobRecord>>;
}
