use chrono::{DateTime, Utc};
use jobfeed_db::jobs::models::JobRecord;
use jobfeed_db::sync::models::{SyncRun, SyncWatermark};
use serde::Serialize;

use crate::scheduler::TriggerOutcome;

#[derive(Debug, Serialize)]
pub struct JobsResponse {
    pub data: Vec<JobRecord>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub source: String,
    pub listing_type: String,
    pub state: String,
    pub generation: i64,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub sweep_pending: bool,
    pub error_message: Option<String>,
    pub last_run: Option<SyncRun>,
}

impl StatusResponse {
    pub fn new(watermark: SyncWatermark, listing_type: &str, last_run: Option<SyncRun>) -> Self {
        Self {
            source: watermark.source,
            listing_type: listing_type.to_string(),
            state: watermark.status,
            generation: watermark.generation,
            last_synced_at: watermark.last_synced_at,
            sweep_pending: watermark.cursor_value.is_some(),
            error_message: watermark.error_message,
            last_run,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub status: &'static str,
}

impl From<TriggerOutcome> for TriggerResponse {
    fn from(outcome: TriggerOutcome) -> Self {
        let status = match outcome {
            TriggerOutcome::Queued => "queued",
            TriggerOutcome::Coalesced => "coalesced",
        };
        Self { status }
    }
}
