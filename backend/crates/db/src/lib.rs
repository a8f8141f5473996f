pub mod jobs;
pub mod sync;

use jobfeed_common::error::{JobfeedError, JobfeedResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Create a Postgres connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> JobfeedResult<PgPool> {
    tracing::info!("connecting to database");
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|e| JobfeedError::Database(e.to_string()))
}

/// Apply the bundled schema. Statements are idempotent.
pub async fn apply_schema(pool: &PgPool) -> JobfeedResult<()> {
    for (name, sql) in [
        ("0001_job_listings", include_str!("../../../migrations/0001_job_listings.sql")),
        ("0002_sync_state", include_str!("../../../migrations/0002_sync_state.sql")),
    ] {
        tracing::debug!(migration = name, "applying schema");
        sqlx::raw_sql(sql)
            .execute(pool)
            .await
            .map_err(|e| JobfeedError::Database(format!("{name}: {e}")))?;
    }
    Ok(())
}
