pub mod error;
pub mod handlers;
pub mod responses;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Json, Router};
use jobfeed_common::types::ServiceInfo;
use jobfeed_db::jobs::repositories::JobRepository;
use jobfeed_db::sync::repositories::SyncWatermarkRepository;
use tower_http::trace::TraceLayer;

use crate::scheduler::TriggerHandle;

pub const SERVICE_NAME: &str = "jobfeed-ingest";

#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<dyn JobRepository>,
    pub sync_repo: Arc<dyn SyncWatermarkRepository>,
    pub triggers: TriggerHandle,
    pub listing_type: &'static str,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn info() -> Json<ServiceInfo> {
    Json(ServiceInfo::new(SERVICE_NAME))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/info", get(info))
        .route("/status", get(handlers::get_status))
        .route("/jobs", get(handlers::list_jobs))
        .route("/sync/run", post(handlers::trigger_sync))
        .route("/sync/sweep", post(handlers::trigger_sweep))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
