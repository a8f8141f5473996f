use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether a listing is still open upstream.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Active,
    Stale,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Stale => "stale",
        }
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "stale" => Ok(Self::Stale),
            _ => Err(format!("unknown job status: {value}")),
        }
    }
}

/// Local copy of one upstream job order, unique on (listing_type, external_id).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRecord {
    pub id: Uuid,
    pub listing_type: String,
    pub external_id: String,
    pub title: String,
    pub created_date: DateTime<Utc>,
    pub employment_type: String,
    pub status: JobStatus,
    pub description: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub categories: Vec<String>,
    pub skills: Vec<String>,
    pub salary: Option<f64>,
    pub upstream_modified_at: Option<DateTime<Utc>>,
    pub content_hash: String,
    pub raw_ref: Option<serde_json::Value>,
    pub synced_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The slice of a stored record the reconciler needs to diff against upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSyncState {
    pub external_id: String,
    pub upstream_modified_at: Option<DateTime<Utc>>,
    pub content_hash: String,
}

impl From<&JobRecord> for JobSyncState {
    fn from(record: &JobRecord) -> Self {
        Self {
            external_id: record.external_id.clone(),
            upstream_modified_at: record.upstream_modified_at,
            content_hash: record.content_hash.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JobFilter {
    pub listing_type: Option<String>,
    pub status: Option<JobStatus>,
    pub employment_type: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl JobFilter {
    /// True when `record` satisfies every set criterion (limit/offset excluded).
    pub fn matches(&self, record: &JobRecord) -> bool {
        self.listing_type
            .as_deref()
            .map_or(true, |t| t == record.listing_type)
            && self.status.map_or(true, |s| s == record.status)
            && self
                .employment_type
                .as_deref()
                .map_or(true, |t| t.eq_ignore_ascii_case(&record.employment_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(external_id: &str, status: JobStatus) -> JobRecord {
        let now = Utc::now();
        JobRecord {
            id: Uuid::new_v4(),
            listing_type: "bullhornjoblisting".to_string(),
            external_id: external_id.to_string(),
            title: "Welder".to_string(),
            created_date: now,
            employment_type: "Contract".to_string(),
            status,
            description: None,
            city: None,
            state: None,
            country: None,
            categories: vec![],
            skills: vec![],
            salary: None,
            upstream_modified_at: None,
            content_hash: "abc".to_string(),
            raw_ref: None,
            synced_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn status_parses_known_values() {
        assert_eq!("active".parse::<JobStatus>().unwrap(), JobStatus::Active);
        assert_eq!("stale".parse::<JobStatus>().unwrap(), JobStatus::Stale);
        assert!("archived".parse::<JobStatus>().is_err());
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = JobFilter::default();
        assert!(filter.matches(&record("1", JobStatus::Active)));
        assert!(filter.matches(&record("2", JobStatus::Stale)));
    }

    #[test]
    fn filter_by_status_and_employment_type() {
        let filter = JobFilter {
            status: Some(JobStatus::Active),
            employment_type: Some("contract".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&record("1", JobStatus::Active)));
        assert!(!filter.matches(&record("2", JobStatus::Stale)));

        let other_type = JobFilter {
            employment_type: Some("Permanent".to_string()),
            ..Default::default()
        };
        assert!(!other_type.matches(&record("1", JobStatus::Active)));
    }

    #[test]
    fn sync_state_from_record() {
        let r = record("42", JobStatus::Active);
        let state = JobSyncState::from(&r);
        assert_eq!(state.external_id, "42");
        assert_eq!(state.content_hash, "abc");
    }
}
