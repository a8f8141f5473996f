pub mod client;
#[cfg(test)]
pub mod fake;
pub mod mapper;
pub mod models;
pub mod pagination;

use async_trait::async_trait;

use client::BullhornClientError;
use models::{IdPage, JobPayload, PageToken};

/// Read side of the upstream job feed, as the reconciler consumes it.
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Ids requested per listing page.
    fn page_size(&self) -> u32;

    async fn list_recent_ids(
        &self,
        page_token: Option<PageToken>,
    ) -> Result<IdPage, BullhornClientError>;

    async fn fetch_job(&self, external_id: &str) -> Result<JobPayload, BullhornClientError>;
}
