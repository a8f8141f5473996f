use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use super::client::BullhornClientError;
use super::models::{IdPage, JobPayload, PageToken, WindowEntry};
use super::JobSource;
use chrono::{TimeZone, Utc};

const BASE_MODIFIED_MS: i64 = 1_700_000_000_000;

#[derive(Debug, Clone)]
struct FakeJob {
    id: String,
    modified_ms: i64,
    title: String,
}

/// In-memory job feed, newest first, paged like the search endpoint.
pub struct FakeFeed {
    page_size: u32,
    jobs: Mutex<Vec<FakeJob>>,
    failing_fetches: Mutex<HashSet<String>>,
    fail_listing_from: Mutex<Option<usize>>,
    auth_fails_from: Mutex<Option<usize>>,
    reject_fetch_auth: AtomicBool,
    repeat_forever: AtomicBool,
    pub list_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
}

impl FakeFeed {
    pub fn from_ids<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let jobs = ids
            .into_iter()
            .map(|id| {
                let id = id.into();
                FakeJob {
                    title: format!("Job {id}"),
                    id,
                    modified_ms: BASE_MODIFIED_MS,
                }
            })
            .collect();
        Self {
            page_size: 20,
            jobs: Mutex::new(jobs),
            failing_fetches: Mutex::new(HashSet::new()),
            fail_listing_from: Mutex::new(None),
            auth_fails_from: Mutex::new(None),
            reject_fetch_auth: AtomicBool::new(false),
            repeat_forever: AtomicBool::new(false),
            list_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    /// `count` jobs with ids from [`FakeFeed::id_at`].
    pub fn numbered(count: usize) -> Self {
        Self::from_ids((0..count).map(Self::id_at))
    }

    /// Id of the job at `position`; fixed width so string order matches numeric order.
    pub fn id_at(position: usize) -> String {
        format!("{}", 90_000 - position)
    }

    pub fn ids(&self) -> Vec<String> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .map(|j| j.id.clone())
            .collect()
    }

    /// Put a new job at the head of the feed.
    pub fn publish(&self, id: &str) {
        self.jobs.lock().unwrap().insert(
            0,
            FakeJob {
                id: id.to_string(),
                modified_ms: BASE_MODIFIED_MS,
                title: format!("Job {id}"),
            },
        );
    }

    pub fn retitle(&self, id: &str, title: &str) {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.iter_mut().find(|j| j.id == id) {
            job.title = title.to_string();
            job.modified_ms += 60_000;
        }
    }

    /// Bump the modification time without changing content.
    pub fn touch(&self, id: &str) {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.iter_mut().find(|j| j.id == id) {
            job.modified_ms += 60_000;
        }
    }

    pub fn remove(&self, id: &str) {
        self.jobs.lock().unwrap().retain(|j| j.id != id);
    }

    pub fn fail_fetch_for(&self, id: &str) {
        self.failing_fetches.lock().unwrap().insert(id.to_string());
    }

    pub fn heal_fetch_for(&self, id: &str) {
        self.failing_fetches.lock().unwrap().remove(id);
    }

    pub fn fail_listing_from_page(&self, page: usize) {
        *self.fail_listing_from.lock().unwrap() = Some(page);
    }

    pub fn reject_auth_from_page(&self, page: usize) {
        *self.auth_fails_from.lock().unwrap() = Some(page);
    }

    pub fn reject_fetch_auth(&self) {
        self.reject_fetch_auth.store(true, Ordering::SeqCst);
    }

    pub fn repeat_forever(&self) {
        self.repeat_forever.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl JobSource for FakeFeed {
    fn page_size(&self) -> u32 {
        self.page_size
    }

    async fn list_recent_ids(
        &self,
        page_token: Option<PageToken>,
    ) -> Result<IdPage, BullhornClientError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let start = page_token.map_or(0, |t| t.0) as usize;
        let page_size = self.page_size as usize;
        let page_no = start / page_size;

        if self
            .auth_fails_from
            .lock()
            .unwrap()
            .is_some_and(|from| page_no >= from)
        {
            return Err(BullhornClientError::Auth("refresh token revoked".into()));
        }
        if self
            .fail_listing_from
            .lock()
            .unwrap()
            .is_some_and(|from| page_no >= from)
        {
            return Err(BullhornClientError::Transient {
                attempts: 4,
                last_error: "503 Service Unavailable".into(),
            });
        }

        let jobs = self.jobs.lock().unwrap();
        let to_entry = |job: &FakeJob| {
            WindowEntry::new(
                job.id.clone(),
                Utc.timestamp_millis_opt(job.modified_ms).single(),
            )
        };

        if self.repeat_forever.load(Ordering::SeqCst) {
            return Ok(IdPage {
                entries: jobs.iter().map(to_entry).collect(),
                next: Some(PageToken((start + page_size) as u32)),
            });
        }

        let end = (start + page_size).min(jobs.len());
        let entries = jobs
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .map(to_entry)
            .collect();
        let next = (end < jobs.len()).then_some(PageToken(end as u32));
        Ok(IdPage { entries, next })
    }

    async fn fetch_job(&self, external_id: &str) -> Result<JobPayload, BullhornClientError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        if self.reject_fetch_auth.load(Ordering::SeqCst) {
            return Err(BullhornClientError::Auth(
                "entity/JobOrder still unauthorized after session refresh".into(),
            ));
        }
        if self.failing_fetches.lock().unwrap().contains(external_id) {
            return Err(BullhornClientError::Transient {
                attempts: 4,
                last_error: "504 Gateway Timeout".into(),
            });
        }

        let jobs = self.jobs.lock().unwrap();
        let job = jobs
            .iter()
            .find(|j| j.id == external_id)
            .ok_or_else(|| BullhornClientError::NotFound(format!("job order {external_id}")))?;

        Ok(JobPayload {
            id: Some(json!(job.id)),
            title: Some(job.title.clone()),
            date_added: Some(json!(BASE_MODIFIED_MS - 86_400_000)),
            date_last_modified: Some(json!(job.modified_ms)),
            employment_type: Some("Permanent".to_string()),
            is_open: Some(true),
            status: Some("Accepting Candidates".to_string()),
            public_description: Some(format!("<p>{}</p>", job.title)),
            ..Default::default()
        })
    }
}
