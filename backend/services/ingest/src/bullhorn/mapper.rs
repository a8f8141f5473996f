use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use jobfeed_db::jobs::models::{JobRecord, JobStatus};

use super::models::{external_id_from, timestamp_from, Association, JobPayload};
use crate::profile::ListingProfile;

pub const DEFAULT_TITLE: &str = "Untitled position";
pub const DEFAULT_EMPLOYMENT_TYPE: &str = "Unspecified";

/// Upstream statuses that mean the order no longer takes candidates.
const CLOSED_STATUSES: &[&str] = &["closed", "filled", "cancelled", "archive", "archived", "lost"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    #[error("payload has no usable id")]
    MissingExternalId,

    #[error("job order {external_id} has no dateAdded")]
    MissingCreatedDate { external_id: String },

    #[error("job order {external_id} has unparsable dateAdded: {raw}")]
    InvalidCreatedDate { external_id: String, raw: String },
}

/// Convert one upstream payload into a local record.
///
/// Only the id and `dateAdded` are mandatory; anything else missing falls back to a default.
pub fn map_job(
    payload: &JobPayload,
    profile: &ListingProfile,
    now: DateTime<Utc>,
) -> Result<JobRecord, MappingError> {
    let external_id = payload
        .id
        .as_ref()
        .and_then(external_id_from)
        .ok_or(MappingError::MissingExternalId)?;

    let raw_created = payload
        .date_added
        .as_ref()
        .filter(|v| !v.is_null())
        .ok_or_else(|| MappingError::MissingCreatedDate {
            external_id: external_id.clone(),
        })?;
    let created_date =
        timestamp_from(raw_created).ok_or_else(|| MappingError::InvalidCreatedDate {
            external_id: external_id.clone(),
            raw: raw_created.to_string(),
        })?;

    let title = clean(payload.title.as_deref()).unwrap_or_else(|| DEFAULT_TITLE.to_string());
    let employment_type = profile.employment_type_term(
        clean(payload.employment_type.as_deref())
            .as_deref()
            .unwrap_or(DEFAULT_EMPLOYMENT_TYPE),
    );
    let description = clean(payload.public_description.as_deref())
        .or_else(|| clean(payload.description.as_deref()));

    let address = payload.address.as_ref();
    let city = address.and_then(|a| clean(a.city.as_deref()));
    let state = address.and_then(|a| clean(a.state.as_deref()));
    let country = address.and_then(|a| clean(a.country_name.as_deref()));

    let mut record = JobRecord {
        id: Uuid::new_v4(),
        listing_type: profile.listing_type.to_string(),
        external_id,
        title,
        created_date,
        employment_type,
        status: derive_status(payload),
        description,
        city,
        state,
        country,
        categories: names(payload.categories.as_ref()),
        skills: names(payload.skills.as_ref()),
        salary: payload.salary.filter(|s| s.is_finite() && *s > 0.0),
        upstream_modified_at: payload.date_last_modified.as_ref().and_then(timestamp_from),
        content_hash: String::new(),
        raw_ref: serde_json::to_value(payload).ok(),
        synced_at: now,
        created_at: now,
        updated_at: now,
    };
    record.content_hash = content_hash(&record);
    Ok(record)
}

fn derive_status(payload: &JobPayload) -> JobStatus {
    if payload.is_open == Some(false) {
        return JobStatus::Stale;
    }
    let closed = payload
        .status
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .is_some_and(|s| CLOSED_STATUSES.contains(&s.as_str()));
    if closed {
        JobStatus::Stale
    } else {
        JobStatus::Active
    }
}

fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Sorted, de-duplicated names of an association.
fn names(association: Option<&Association>) -> Vec<String> {
    let mut names: Vec<String> = association
        .map(|a| {
            a.data
                .iter()
                .filter_map(|e| clean(e.name.as_deref()))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names.dedup();
    names
}

/// Hash of the content a reader of the store can see. Bookkeeping fields are excluded.
pub fn content_hash(record: &JobRecord) -> String {
    let created = record.created_date.to_rfc3339();
    let salary = record.salary.map(|s| s.to_string()).unwrap_or_default();
    let categories = record.categories.join("\u{1e}");
    let skills = record.skills.join("\u{1e}");

    let parts: [&str; 12] = [
        &record.listing_type,
        &record.title,
        &created,
        &record.employment_type,
        record.status.as_str(),
        record.description.as_deref().unwrap_or_default(),
        record.city.as_deref().unwrap_or_default(),
        record.state.as_deref().unwrap_or_default(),
        record.country.as_deref().unwrap_or_default(),
        &categories,
        &skills,
        &salary,
    ];

    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0x1fu8]);
    }
    hex::encode(hasher.finalize())
}
