use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use uuid::Uuid;

use jobfeed_common::error::JobfeedError;
use jobfeed_config::SyncConfig;
use jobfeed_db::jobs::models::JobSyncState;
use jobfeed_db::jobs::repositories::JobRepository;
use jobfeed_db::sync::models::{RunStatus, SyncRun, SyncWatermark};
use jobfeed_db::sync::repositories::SyncWatermarkRepository;

use super::diff::{
    deletion_candidates, next_batch, plan_upserts, start_sweep, window_fingerprint,
    PlannedUpsert, UpsertKind,
};
use super::error::SyncError;
use crate::bullhorn::client::BullhornClientError;
use crate::bullhorn::mapper::map_job;
use crate::bullhorn::pagination::collect_window;
use crate::bullhorn::JobSource;
use crate::connector::{Connector, RunMode, SyncResult, TriggerKind};
use crate::profile::ListingProfile;

pub const SOURCE_NAME: &str = "bullhorn_jobs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Windowing,
    Diffing,
    Upserting,
    Deleting,
    Failed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Windowing => "windowing",
            Self::Diffing => "diffing",
            Self::Upserting => "upserting",
            Self::Deleting => "deleting",
            Self::Failed => "failed",
        }
    }
}

/// Where the deletion sweep stands once a run finishes.
struct SweepState {
    generation: i64,
    cursor_value: Option<String>,
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Keeps the local job store in step with the newest upstream job orders.
pub struct Reconciler<S, J, W> {
    source: Arc<S>,
    jobs: J,
    sync_repo: W,
    config: SyncConfig,
    profile: ListingProfile,
    running: AtomicBool,
}

impl<S, J, W> Reconciler<S, J, W>
where
    S: JobSource,
    J: JobRepository,
    W: SyncWatermarkRepository,
{
    pub fn new(
        source: Arc<S>,
        jobs: J,
        sync_repo: W,
        config: SyncConfig,
        profile: ListingProfile,
    ) -> Self {
        Self {
            source,
            jobs,
            sync_repo,
            config,
            profile,
            running: AtomicBool::new(false),
        }
    }

    pub fn profile(&self) -> &ListingProfile {
        &self.profile
    }

    /// Run one reconciliation pass.
    ///
    /// Returns a `Skipped` result without touching anything when another pass is in
    /// progress, in this process or behind the persisted lock.
    pub async fn run_once(
        &self,
        mode: RunMode,
        trigger: TriggerKind,
    ) -> Result<SyncResult, SyncError> {
        if self.running.swap(true, Ordering::AcqRel) {
            tracing::info!(mode = mode.as_str(), "reconciliation already in progress, ignoring trigger");
            return Ok(SyncResult::not_run(SOURCE_NAME));
        }
        let _running = RunningGuard(&self.running);

        let started_at = Utc::now();
        self.sync_repo.get_or_create(SOURCE_NAME).await?;

        let lock_timeout = chrono::Duration::from_std(self.config.lock_timeout())
            .map_err(|e| JobfeedError::Config(format!("invalid lock timeout: {e}")))?;
        let watermark = match self.sync_repo.acquire_lock(SOURCE_NAME, lock_timeout).await? {
            Some(wm) => wm,
            None => {
                tracing::info!(source = SOURCE_NAME, "reconciliation lock held elsewhere, skipping");
                let result = SyncResult::not_run(SOURCE_NAME);
                self.record_run(mode, trigger, &result, None, started_at).await;
                return Ok(result);
            }
        };

        let mut result = SyncResult::new(SOURCE_NAME);
        result.generation = watermark.generation;

        match self.reconcile(&watermark, mode, &mut result).await {
            Ok(sweep) => {
                self.sync_repo
                    .mark_completed(watermark.id, sweep.cursor_value.as_deref(), sweep.generation)
                    .await?;
                self.enter(Phase::Idle);
                self.record_run(mode, trigger, &result, None, started_at).await;
                tracing::info!(?result, "bullhorn reconciliation completed");
                Ok(result)
            }
            Err(e) => {
                self.enter(Phase::Failed);
                let msg = e.to_string();
                tracing::error!(error = %msg, retryable = e.is_retryable(), "bullhorn reconciliation failed");
                if let Err(mark_err) = self.sync_repo.mark_failed(watermark.id, &msg).await {
                    tracing::warn!(error = %mark_err, "failed to release reconciliation lock");
                }
                result.status = RunStatus::Failed;
                self.record_run(mode, trigger, &result, Some(msg), started_at).await;
                self.enter(Phase::Idle);
                Err(e)
            }
        }
    }

    fn enter(&self, phase: Phase) {
        tracing::debug!(source = SOURCE_NAME, phase = phase.as_str(), "phase");
    }

    async fn reconcile(
        &self,
        watermark: &SyncWatermark,
        mode: RunMode,
        result: &mut SyncResult,
    ) -> Result<SweepState, SyncError> {
        self.enter(Phase::Windowing);
        let window = collect_window(self.source.as_ref(), self.config.max_window_size).await?;
        result.window_size = window.len();
        result.window_truncated = window.is_truncated();
        tracing::info!(
            window = window.len(),
            pages = window.pages,
            truncated = window.is_truncated(),
            "collected upstream window"
        );

        self.enter(Phase::Diffing);
        let listing_type = self.profile.listing_type;
        let local = self.jobs.list_sync_states(listing_type).await?;
        let local_index: HashMap<&str, &JobSyncState> =
            local.iter().map(|s| (s.external_id.as_str(), s)).collect();

        let planned = match mode {
            RunMode::Full => plan_upserts(&window.entries, &local_index),
            RunMode::SweepOnly => Vec::new(),
        };
        let candidates = deletion_candidates(&local, &window.entries);
        tracing::info!(
            local = local.len(),
            to_upsert = planned.len(),
            to_delete = candidates.len(),
            mode = mode.as_str(),
            "computed diff"
        );

        if !planned.is_empty() {
            self.enter(Phase::Upserting);
            self.apply_upserts(planned, &local_index, result).await?;
        }

        if let Some(shortfall) = &window.shortfall {
            tracing::warn!(%shortfall, "upstream window incomplete, deferring deletions");
            return Ok(SweepState {
                generation: watermark.generation,
                cursor_value: watermark.cursor_value.clone(),
            });
        }

        self.enter(Phase::Deleting);
        let fingerprint = window_fingerprint(&window.entries);
        let start = start_sweep(
            watermark.cursor_value.as_deref(),
            watermark.generation,
            &fingerprint,
        );
        let resumed = start.is_resume();
        let mut cursor = start.into_cursor();
        result.generation = cursor.generation;

        let cap = self.config.max_deletions_per_run;
        let batch = next_batch(&candidates, cursor.last_key.as_deref(), cap);

        let mut first_failure: Option<usize> = None;
        for (i, external_id) in batch.iter().enumerate() {
            match self.jobs.delete(listing_type, external_id).await {
                Ok(true) => result.deleted += 1,
                Ok(false) => {
                    tracing::debug!(external_id = %external_id, "job already gone");
                }
                Err(e) => {
                    tracing::warn!(external_id = %external_id, error = %e, "failed to delete job");
                    result.errors += 1;
                    first_failure.get_or_insert(i);
                }
            }
        }

        // Stop the cursor before the first failed id.
        let settled = &batch[..first_failure.unwrap_or(batch.len())];
        if let Some(last) = settled.last() {
            cursor.advance(last.clone(), settled.len());
        }

        result.sweep_pending = first_failure.is_some() || batch.len() >= cap;
        tracing::info!(
            generation = cursor.generation,
            resumed,
            processed = batch.len(),
            swept = cursor.offset,
            candidates = candidates.len(),
            pending = result.sweep_pending,
            "deletion sweep progressed"
        );

        let cursor_value = if result.sweep_pending {
            Some(cursor.encode().map_err(JobfeedError::from)?)
        } else {
            None
        };

        Ok(SweepState {
            generation: cursor.generation,
            cursor_value,
        })
    }

    /// Fetch planned jobs concurrently and write them one at a time as they arrive.
    async fn apply_upserts(
        &self,
        planned: Vec<PlannedUpsert>,
        local: &HashMap<&str, &JobSyncState>,
        result: &mut SyncResult,
    ) -> Result<(), SyncError> {
        let source = self.source.as_ref();
        let mut fetches = stream::iter(planned)
            .map(|planned| async move {
                let fetched = source.fetch_job(&planned.external_id).await;
                (planned, fetched)
            })
            .buffer_unordered(self.config.fetch_concurrency.max(1));

        while let Some((planned, fetched)) = fetches.next().await {
            let external_id = planned.external_id.as_str();

            let payload = match fetched {
                Ok(payload) => payload,
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(BullhornClientError::NotFound(_)) => {
                    tracing::info!(external_id, "job disappeared before it could be fetched");
                    result.skipped += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(external_id, error = %e, "failed to fetch job, retrying next run");
                    result.skipped += 1;
                    result.errors += 1;
                    continue;
                }
            };

            let record = match map_job(&payload, &self.profile, Utc::now()) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(external_id, error = %e, "rejected malformed job");
                    result.skipped += 1;
                    continue;
                }
            };

            if record.external_id != planned.external_id {
                tracing::warn!(
                    external_id,
                    returned = %record.external_id,
                    "upstream returned a different job than requested"
                );
                result.skipped += 1;
                continue;
            }

            if local
                .get(external_id)
                .is_some_and(|state| state.content_hash == record.content_hash)
            {
                result.unchanged += 1;
                if let Some(modified) = planned.modified_at.or(record.upstream_modified_at) {
                    if let Err(e) = self
                        .jobs
                        .touch_modified(self.profile.listing_type, external_id, modified)
                        .await
                    {
                        tracing::warn!(external_id, error = %e, "failed to record modification time");
                        result.errors += 1;
                    }
                }
                continue;
            }

            match self.jobs.upsert(&record).await {
                Ok(()) => match planned.kind {
                    UpsertKind::Create => result.created += 1,
                    UpsertKind::Update => result.updated += 1,
                },
                Err(e) => {
                    tracing::warn!(external_id, error = %e, "failed to upsert job");
                    result.errors += 1;
                }
            }
        }

        Ok(())
    }

    async fn record_run(
        &self,
        mode: RunMode,
        trigger: TriggerKind,
        result: &SyncResult,
        error_message: Option<String>,
        started_at: DateTime<Utc>,
    ) {
        let run = SyncRun {
            id: Uuid::new_v4(),
            source: SOURCE_NAME.to_string(),
            trigger: format!("{}:{}", trigger.as_str(), mode.as_str()),
            status: result.status,
            generation: result.generation,
            window_size: count(result.window_size),
            window_truncated: result.window_truncated,
            created: count(result.created),
            updated: count(result.updated),
            unchanged: count(result.unchanged),
            deleted: count(result.deleted),
            skipped: count(result.skipped),
            errors: count(result.errors),
            sweep_pending: result.sweep_pending,
            error_message,
            started_at,
            finished_at: Utc::now(),
        };

        if let Err(e) = self.sync_repo.record_run(&run).await {
            tracing::warn!(error = %e, "failed to record sync run");
        }
    }
}

fn count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

#[async_trait]
impl<S, J, W> Connector for Reconciler<S, J, W>
where
    S: JobSource,
    J: JobRepository,
    W: SyncWatermarkRepository,
{
    fn source_name(&self) -> &str {
        SOURCE_NAME
    }

    async fn sync(&self, mode: RunMode, trigger: TriggerKind) -> Result<SyncResult, SyncError> {
        self.run_once(mode, trigger).await
    }
}
