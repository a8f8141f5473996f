use std::str::FromStr;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::sync::models::{RunStatus, SyncRun, SyncWatermark};
use crate::sync::repositories::SyncWatermarkRepository;
use jobfeed_common::error::{JobfeedError, JobfeedResult};

const WATERMARK_COLUMNS: &str =
    "id, source, last_synced_at, cursor_value, generation, status, error_message, created_at, updated_at";

const RUN_COLUMNS: &str = "id, source, trigger, status, generation, window_size, window_truncated, \
     created, updated, unchanged, deleted, skipped, errors, sweep_pending, error_message, \
     started_at, finished_at";

#[derive(Clone)]
pub struct PgSyncRepository {
    pool: PgPool,
}

impl PgSyncRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: PgRow) -> JobfeedResult<SyncWatermark> {
        Ok(SyncWatermark {
            id: row.get("id"),
            source: row.get("source"),
            last_synced_at: row.get("last_synced_at"),
            cursor_value: row.get("cursor_value"),
            generation: row.get("generation"),
            status: row.get("status"),
            error_message: row.get("error_message"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    fn map_run_row(row: PgRow) -> JobfeedResult<SyncRun> {
        let status_raw: String = row.get("status");
        let status = RunStatus::from_str(&status_raw).map_err(JobfeedError::Internal)?;

        Ok(SyncRun {
            id: row.get("id"),
            source: row.get("source"),
            trigger: row.get("trigger"),
            status,
            generation: row.get("generation"),
            window_size: row.get("window_size"),
            window_truncated: row.get("window_truncated"),
            created: row.get("created"),
            updated: row.get("updated"),
            unchanged: row.get("unchanged"),
            deleted: row.get("deleted"),
            skipped: row.get("skipped"),
            errors: row.get("errors"),
            sweep_pending: row.get("sweep_pending"),
            error_message: row.get("error_message"),
            started_at: row.get("started_at"),
            finished_at: row.get("finished_at"),
        })
    }
}

#[async_trait]
impl SyncWatermarkRepository for PgSyncRepository {
    async fn get_or_create(&self, source: &str) -> JobfeedResult<SyncWatermark> {
        let row = sqlx::query(&format!(
            "insert into sync_watermarks (id, source)
             values ($1, $2)
             on conflict (source) do update set source = excluded.source
             returning {WATERMARK_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(source)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| JobfeedError::Database(e.to_string()))?;

        Self::map_row(row)
    }

    async fn acquire_lock(
        &self,
        source: &str,
        stale_after: Duration,
    ) -> JobfeedResult<Option<SyncWatermark>> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            "update sync_watermarks
             set status = 'running', error_message = null, updated_at = $1
             where source = $2 and (status != 'running' or updated_at < $3)
             returning {WATERMARK_COLUMNS}"
        ))
        .bind(now)
        .bind(source)
        .bind(now - stale_after)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| JobfeedError::Database(e.to_string()))?;

        row.map(Self::map_row).transpose()
    }

    async fn mark_completed(
        &self,
        id: Uuid,
        cursor_value: Option<&str>,
        generation: i64,
    ) -> JobfeedResult<SyncWatermark> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            "update sync_watermarks
             set status = 'idle', last_synced_at = $1, cursor_value = $2, generation = $3,
                 error_message = null, updated_at = $1
             where id = $4
             returning {WATERMARK_COLUMNS}"
        ))
        .bind(now)
        .bind(cursor_value)
        .bind(generation)
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| JobfeedError::Database(e.to_string()))?;

        Self::map_row(row)
    }

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> JobfeedResult<SyncWatermark> {
        let row = sqlx::query(&format!(
            "update sync_watermarks
             set status = 'failed', error_message = $1, updated_at = $2
             where id = $3
             returning {WATERMARK_COLUMNS}"
        ))
        .bind(error_message)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| JobfeedError::Database(e.to_string()))?;

        Self::map_row(row)
    }

    async fn record_run(&self, run: &SyncRun) -> JobfeedResult<()> {
        sqlx::query(&format!(
            "insert into sync_runs ({RUN_COLUMNS})
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)"
        ))
        .bind(run.id)
        .bind(&run.source)
        .bind(&run.trigger)
        .bind(run.status.as_str())
        .bind(run.generation)
        .bind(run.window_size)
        .bind(run.window_truncated)
        .bind(run.created)
        .bind(run.updated)
        .bind(run.unchanged)
        .bind(run.deleted)
        .bind(run.skipped)
        .bind(run.errors)
        .bind(run.sweep_pending)
        .bind(&run.error_message)
        .bind(run.started_at)
        .bind(run.finished_at)
        .execute(&self.pool)
        .await
        .map_err(|e| JobfeedError::Database(e.to_string()))?;
        Ok(())
    }

    async fn latest_run(&self, source: &str) -> JobfeedResult<Option<SyncRun>> {
        let row = sqlx::query(&format!(
            "select {RUN_COLUMNS} from sync_runs
             where source = $1
             order by started_at desc
             limit 1"
        ))
        .bind(source)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| JobfeedError::Database(e.to_string()))?;

        row.map(Self::map_run_row).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{apply_schema, create_pool};

    async fn test_repo() -> Option<PgSyncRepository> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let pool = create_pool(&url).await.expect("db should connect");

        apply_schema(&pool).await.ok()?;

        Some(PgSyncRepository::new(pool))
    }

    fn unique_source() -> String {
        format!("test_{}", Uuid::new_v4().simple())
    }

    #[tokio::test]
    async fn get_or_create_inserts_new() {
        let Some(repo) = test_repo().await else {
            return;
        };
        let source = unique_source();
        let wm = repo.get_or_create(&source).await.expect("should work");
        assert_eq!(wm.source, source);
        assert_eq!(wm.status, "idle");
        assert_eq!(wm.generation, 0);
        assert!(wm.last_synced_at.is_none());
    }

    #[tokio::test]
    async fn get_or_create_returns_existing() {
        let Some(repo) = test_repo().await else {
            return;
        };
        let source = unique_source();
        let wm1 = repo.get_or_create(&source).await.expect("first");
        let wm2 = repo.get_or_create(&source).await.expect("second");
        assert_eq!(wm1.id, wm2.id);
    }

    #[tokio::test]
    async fn acquire_lock_fails_when_already_running() {
        let Some(repo) = test_repo().await else {
            return;
        };
        let source = unique_source();
        repo.get_or_create(&source).await.expect("create");
        let first = repo
            .acquire_lock(&source, Duration::hours(1))
            .await
            .expect("first lock");
        assert_eq!(first.expect("should acquire").status, "running");

        let second = repo
            .acquire_lock(&source, Duration::hours(1))
            .await
            .expect("second lock");
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn acquire_lock_takes_over_abandoned_lock() {
        let Some(repo) = test_repo().await else {
            return;
        };
        let source = unique_source();
        repo.get_or_create(&source).await.expect("create");
        repo.acquire_lock(&source, Duration::hours(1))
            .await
            .expect("first lock");

        // A zero timeout treats any running lock as abandoned.
        let takeover = repo
            .acquire_lock(&source, Duration::zero())
            .await
            .expect("takeover");
        assert!(takeover.is_some());
    }

    #[tokio::test]
    async fn mark_completed_stores_cursor_and_generation() {
        let Some(repo) = test_repo().await else {
            return;
        };
        let source = unique_source();
        repo.get_or_create(&source).await.expect("create");
        let lock = repo
            .acquire_lock(&source, Duration::hours(1))
            .await
            .expect("lock")
            .expect("should acquire");
        let completed = repo
            .mark_completed(lock.id, Some("{\"generation\":4}"), 4)
            .await
            .expect("mark completed");
        assert_eq!(completed.status, "idle");
        assert_eq!(completed.generation, 4);
        assert!(completed.last_synced_at.is_some());
        assert_eq!(completed.cursor_value.as_deref(), Some("{\"generation\":4}"));
    }

    #[tokio::test]
    async fn mark_failed_sets_error() {
        let Some(repo) = test_repo().await else {
            return;
        };
        let source = unique_source();
        repo.get_or_create(&source).await.expect("create");
        let lock = repo
            .acquire_lock(&source, Duration::hours(1))
            .await
            .expect("lock")
            .expect("should acquire");
        let failed = repo
            .mark_failed(lock.id, "auth refresh rejected")
            .await
            .expect("mark failed");
        assert_eq!(failed.status, "failed");
        assert_eq!(failed.error_message.as_deref(), Some("auth refresh rejected"));
    }

    #[tokio::test]
    async fn latest_run_returns_most_recent() {
        let Some(repo) = test_repo().await else {
            return;
        };
        let source = unique_source();
        let now = Utc::now();
        let mut run = SyncRun {
            id: Uuid::new_v4(),
            source: source.clone(),
            trigger: "scheduled".to_string(),
            status: RunStatus::Completed,
            generation: 1,
            window_size: 120,
            window_truncated: false,
            created: 3,
            updated: 1,
            unchanged: 116,
            deleted: 0,
            skipped: 0,
            errors: 0,
            sweep_pending: false,
            error_message: None,
            started_at: now - Duration::minutes(10),
            finished_at: now - Duration::minutes(9),
        };
        repo.record_run(&run).await.expect("first run");

        run.id = Uuid::new_v4();
        run.status = RunStatus::Failed;
        run.started_at = now;
        run.finished_at = now;
        repo.record_run(&run).await.expect("second run");

        let latest = repo
            .latest_run(&source)
            .await
            .expect("query")
            .expect("should exist");
        assert_eq!(latest.id, run.id);
        assert_eq!(latest.status, RunStatus::Failed);
    }
}
