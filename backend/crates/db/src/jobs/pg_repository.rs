use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, QueryBuilder, Row};

use crate::jobs::models::{JobFilter, JobRecord, JobStatus, JobSyncState};
use crate::jobs::repositories::JobRepository;
use jobfeed_common::error::{JobfeedError, JobfeedResult};

const JOB_COLUMNS: &str = "id, listing_type, external_id, title, created_date, employment_type, status, \
     description, city, state, country, categories, skills, salary, upstream_modified_at, \
     content_hash, raw_ref, synced_at, created_at, updated_at";

#[derive(Clone)]
pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: PgRow) -> JobfeedResult<JobRecord> {
        let status_raw: String = row.get("status");
        let status = JobStatus::from_str(&status_raw).map_err(JobfeedError::Internal)?;

        Ok(JobRecord {
            id: row.get("id"),
            listing_type: row.get("listing_type"),
            external_id: row.get("external_id"),
            title: row.get("title"),
            created_date: row.get("created_date"),
            employment_type: row.get("employment_type"),
            status,
            description: row.get("description"),
            city: row.get("city"),
            state: row.get("state"),
            country: row.get("country"),
            categories: row.get("categories"),
            skills: row.get("skills"),
            salary: row.get("salary"),
            upstream_modified_at: row.get("upstream_modified_at"),
            content_hash: row.get("content_hash"),
            raw_ref: row.get("raw_ref"),
            synced_at: row.get("synced_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn list_sync_states(&self, listing_type: &str) -> JobfeedResult<Vec<JobSyncState>> {
        let rows = sqlx::query(
            "select external_id, upstream_modified_at, content_hash
             from job_listings
             where listing_type = $1
             order by external_id",
        )
        .bind(listing_type)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| JobfeedError::Database(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| JobSyncState {
                external_id: row.get("external_id"),
                upstream_modified_at: row.get("upstream_modified_at"),
                content_hash: row.get("content_hash"),
            })
            .collect())
    }

    async fn upsert(&self, record: &JobRecord) -> JobfeedResult<()> {
        sqlx::query(
            "insert into job_listings
             (id, listing_type, external_id, title, created_date, employment_type, status,
              description, city, state, country, categories, skills, salary,
              upstream_modified_at, content_hash, raw_ref, synced_at)
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
             on conflict (listing_type, external_id) do update set
               title = excluded.title,
               created_date = excluded.created_date,
               employment_type = excluded.employment_type,
               status = excluded.status,
               description = excluded.description,
               city = excluded.city,
               state = excluded.state,
               country = excluded.country,
               categories = excluded.categories,
               skills = excluded.skills,
               salary = excluded.salary,
               upstream_modified_at = excluded.upstream_modified_at,
               content_hash = excluded.content_hash,
               raw_ref = excluded.raw_ref,
               synced_at = excluded.synced_at,
               updated_at = now()",
        )
        .bind(record.id)
        .bind(&record.listing_type)
        .bind(&record.external_id)
        .bind(&record.title)
        .bind(record.created_date)
        .bind(&record.employment_type)
        .bind(record.status.as_str())
        .bind(&record.description)
        .bind(&record.city)
        .bind(&record.state)
        .bind(&record.country)
        .bind(&record.categories)
        .bind(&record.skills)
        .bind(record.salary)
        .bind(record.upstream_modified_at)
        .bind(&record.content_hash)
        .bind(&record.raw_ref)
        .bind(record.synced_at)
        .execute(&self.pool)
        .await
        .map_err(|e| JobfeedError::Database(e.to_string()))?;
        Ok(())
    }

    async fn touch_modified(
        &self,
        listing_type: &str,
        external_id: &str,
        modified_at: DateTime<Utc>,
    ) -> JobfeedResult<bool> {
        let result = sqlx::query(
            "update job_listings set upstream_modified_at = $3, synced_at = now()
             where listing_type = $1 and external_id = $2",
        )
        .bind(listing_type)
        .bind(external_id)
        .bind(modified_at)
        .execute(&self.pool)
        .await
        .map_err(|e| JobfeedError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, listing_type: &str, external_id: &str) -> JobfeedResult<bool> {
        let result = sqlx::query(
            "delete from job_listings where listing_type = $1 and external_id = $2",
        )
        .bind(listing_type)
        .bind(external_id)
        .execute(&self.pool)
        .await
        .map_err(|e| JobfeedError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, filter: &JobFilter) -> JobfeedResult<Vec<JobRecord>> {
        let mut qb = QueryBuilder::new(format!("select {JOB_COLUMNS} from job_listings where true"));

        if let Some(listing_type) = &filter.listing_type {
            qb.push(" and listing_type = ").push_bind(listing_type.clone());
        }
        if let Some(status) = filter.status {
            qb.push(" and status = ").push_bind(status.as_str());
        }
        if let Some(employment_type) = &filter.employment_type {
            qb.push(" and lower(employment_type) = lower(")
                .push_bind(employment_type.clone())
                .push(")");
        }

        qb.push(" order by created_date desc, external_id");
        qb.push(" limit ").push_bind(filter.limit.unwrap_or(50));
        qb.push(" offset ").push_bind(filter.offset.unwrap_or(0));

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| JobfeedError::Database(e.to_string()))?;

        rows.into_iter().map(Self::map_row).collect()
    }
}
