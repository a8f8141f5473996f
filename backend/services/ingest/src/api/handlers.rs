use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use jobfeed_db::jobs::models::JobFilter;

use super::error::ApiError;
use super::responses::{JobsResponse, StatusResponse, TriggerResponse};
use super::AppState;
use crate::scheduler::Trigger;
use crate::sync::reconciler::SOURCE_NAME;

const MAX_PAGE: i64 = 200;

pub async fn get_status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let watermark = state.sync_repo.get_or_create(SOURCE_NAME).await?;
    let last_run = state.sync_repo.latest_run(SOURCE_NAME).await?;
    Ok(Json(StatusResponse::new(watermark, state.listing_type, last_run)))
}

/// Listings of the configured collection only; `listing_type` in the query is ignored.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(mut filter): Query<JobFilter>,
) -> Result<Json<JobsResponse>, ApiError> {
    filter.listing_type = Some(state.listing_type.to_string());
    filter.limit = Some(filter.limit.unwrap_or(50).clamp(1, MAX_PAGE));
    filter.offset = filter.offset.map(|o| o.max(0));

    let data = state.jobs.list(&filter).await?;
    let count = data.len();
    Ok(Json(JobsResponse { data, count }))
}

pub async fn trigger_sync(State(state): State<AppState>) -> Response {
    request(&state, Trigger::RunSync)
}

pub async fn trigger_sweep(State(state): State<AppState>) -> Response {
    request(&state, Trigger::RunSweep)
}

fn request(state: &AppState, trigger: Trigger) -> Response {
    match state.triggers.request(trigger) {
        Ok(outcome) => {
            tracing::info!(?trigger, ?outcome, "manual trigger received");
            (StatusCode::ACCEPTED, Json(TriggerResponse::from(outcome))).into_response()
        }
        Err(e) => {
            let body = serde_json::json!({ "error": e.to_string() });
            (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
        }
    }
}
