use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jobfeed_config::MAX_PAGE_SIZE;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;

use super::models::{EntityResponse, IdPage, JobOrderRef, JobPayload, PageToken, SearchResponse};
use super::JobSource;

const DEFAULT_AUTH_URL: &str = "https://auth.bullhornstaffing.com";
const DEFAULT_LOGIN_URL: &str = "https://rest.bullhornstaffing.com";
const DEFAULT_JOB_QUERY: &str = "isOpen:1 AND isDeleted:0";
const REST_TOKEN_HEADER: &str = "BhRestToken";
const MAX_BACKOFF_MS: u64 = 30_000;
const MAX_RETRY_AFTER_SECS: u64 = 60;

const JOB_FIELDS: &str = "id,title,dateAdded,dateLastModified,employmentType,isOpen,status,\
     publicDescription,description,address,categories(id,name),skills(id,name),salary";
const LIST_FIELDS: &str = "id,dateLastModified";

#[derive(Debug, Clone)]
pub struct BullhornClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub auth_url: String,
    pub login_url: String,
    pub job_query: String,
    pub page_size: u32,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub timeout_secs: u64,
}

impl BullhornClientConfig {
    /// Load Bullhorn config from environment.
    ///
    /// Returns `Ok(None)` if no Bullhorn credentials are set at all.
    /// Returns `Err` if only some of them are set (fail-fast on misconfiguration).
    pub fn from_env() -> Result<Option<Self>, String> {
        let client_id = std::env::var("BULLHORN_CLIENT_ID").ok();
        let client_secret = std::env::var("BULLHORN_CLIENT_SECRET").ok();
        let refresh_token = std::env::var("BULLHORN_REFRESH_TOKEN").ok();

        let (client_id, client_secret, refresh_token) =
            match (client_id, client_secret, refresh_token) {
                (None, None, None) => return Ok(None),
                (Some(id), Some(secret), Some(token)) => (id, secret, token),
                (id, secret, token) => {
                    let missing: Vec<&str> = [
                        ("BULLHORN_CLIENT_ID", id.is_none()),
                        ("BULLHORN_CLIENT_SECRET", secret.is_none()),
                        ("BULLHORN_REFRESH_TOKEN", token.is_none()),
                    ]
                    .into_iter()
                    .filter_map(|(key, absent)| absent.then_some(key))
                    .collect();
                    return Err(format!(
                        "bullhorn credentials are incomplete, missing: {}",
                        missing.join(", ")
                    ));
                }
            };

        Ok(Some(Self {
            client_id,
            client_secret,
            refresh_token,
            auth_url: env_or("BULLHORN_AUTH_URL", DEFAULT_AUTH_URL),
            login_url: env_or("BULLHORN_LOGIN_URL", DEFAULT_LOGIN_URL),
            job_query: env_or("BULLHORN_JOB_QUERY", DEFAULT_JOB_QUERY),
            page_size: env_parsed("PAGE_SIZE", MAX_PAGE_SIZE),
            max_retries: env_parsed("BULLHORN_MAX_RETRIES", 3),
            backoff_base_ms: env_parsed("BULLHORN_BACKOFF_MS", 1000),
            timeout_secs: env_parsed("BULLHORN_TIMEOUT_SECS", 30),
        }))
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().trim_end_matches('/').to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, thiserror::Error)]
pub enum BullhornClientError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("HTTP {status}: {body}")]
    Http { status: StatusCode, body: String },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("undecodable response: {0}")]
    Decode(String),

    #[error("gave up after {attempts} attempts: {last_error}")]
    Transient { attempts: u32, last_error: String },
}

impl BullhornClientError {
    /// Auth failures end the run; everything else only costs the item at hand.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

#[derive(Debug, Clone)]
struct Session {
    rest_token: String,
    rest_url: String,
}

impl Session {
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.rest_url.trim_end_matches('/'), path)
    }
}

struct AuthState {
    refresh_token: String,
    session: Option<Session>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(rename = "BhRestToken")]
    rest_token: String,
    #[serde(rename = "restUrl")]
    rest_url: String,
}

#[derive(Clone)]
pub struct BullhornClient {
    client: Client,
    config: BullhornClientConfig,
    auth: Arc<Mutex<AuthState>>,
}

impl BullhornClient {
    pub fn new(config: BullhornClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let auth = AuthState {
            refresh_token: config.refresh_token.clone(),
            session: None,
        };
        Ok(Self {
            client,
            config,
            auth: Arc::new(Mutex::new(auth)),
        })
    }

    /// For testing: point both the OAuth and login hosts at one server (e.g., wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.auth_url = base_url.to_string();
        self.config.login_url = base_url.to_string();
        self
    }

    /// Fetch the full payload of one job order.
    pub async fn fetch_job(&self, external_id: &str) -> Result<JobPayload, BullhornClientError> {
        let path = format!("entity/JobOrder/{external_id}");
        let response = self
            .send_authorized(&path, |session| {
                self.client
                    .get(session.endpoint(&path))
                    .header(REST_TOKEN_HEADER, &session.rest_token)
                    .query(&[("fields", JOB_FIELDS)])
            })
            .await?;

        let body: EntityResponse = response
            .json()
            .await
            .map_err(|e| BullhornClientError::Decode(e.to_string()))?;

        body.data
            .ok_or_else(|| BullhornClientError::NotFound(format!("job order {external_id}")))
    }

    /// List one page of job ids, newest first.
    pub async fn list_recent_ids(
        &self,
        page_token: Option<PageToken>,
    ) -> Result<IdPage, BullhornClientError> {
        let start = page_token.map_or(0, |t| t.0);
        let count = self.page_size();

        let response = self
            .send_authorized("search/JobOrder", |session| {
                self.client
                    .get(session.endpoint("search/JobOrder"))
                    .header(REST_TOKEN_HEADER, &session.rest_token)
                    .query(&[
                        ("query", self.config.job_query.as_str()),
                        ("fields", LIST_FIELDS),
                        ("sort", "-dateAdded"),
                    ])
                    .query(&[("start", start), ("count", count)])
            })
            .await?;

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| BullhornClientError::Decode(e.to_string()))?;

        let returned = body.data.len() as u32;
        let next_start = start + returned;
        let next = (returned >= count && next_start < body.total).then_some(PageToken(next_start));

        let entries = body
            .data
            .into_iter()
            .filter_map(|row| {
                let entry = JobOrderRef::into_entry(row);
                if entry.is_none() {
                    tracing::warn!(start, "dropping search row without a usable id");
                }
                entry
            })
            .collect();

        tracing::debug!(start, returned, total = body.total, "fetched job id page");
        Ok(IdPage { entries, next })
    }

    pub fn page_size(&self) -> u32 {
        self.config.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    async fn current_session(&self) -> Result<Session, BullhornClientError> {
        let mut auth = self.auth.lock().await;
        if let Some(session) = &auth.session {
            return Ok(session.clone());
        }
        self.login(&mut auth).await
    }

    /// Replace `stale` with a fresh session, unless another request already did.
    async fn refresh_session(&self, stale: &Session) -> Result<Session, BullhornClientError> {
        let mut auth = self.auth.lock().await;
        if let Some(current) = &auth.session {
            if current.rest_token != stale.rest_token {
                return Ok(current.clone());
            }
        }
        auth.session = None;
        self.login(&mut auth).await
    }

    async fn login(&self, auth: &mut AuthState) -> Result<Session, BullhornClientError> {
        let response = self
            .client
            .post(format!("{}/oauth/token", self.config.auth_url))
            .query(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", auth.refresh_token.as_str()),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| BullhornClientError::Auth(format!("token refresh failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BullhornClientError::Auth(format!(
                "token refresh rejected ({status}): {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| BullhornClientError::Auth(format!("unreadable token response: {e}")))?;

        // Bullhorn rotates refresh tokens on every grant.
        if let Some(rotated) = token.refresh_token {
            auth.refresh_token = rotated;
        }

        let response = self
            .client
            .post(format!("{}/rest-services/login", self.config.login_url))
            .query(&[("version", "2.0"), ("access_token", token.access_token.as_str())])
            .send()
            .await
            .map_err(|e| BullhornClientError::Auth(format!("rest login failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BullhornClientError::Auth(format!(
                "rest login rejected ({status}): {body}"
            )));
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| BullhornClientError::Auth(format!("unreadable login response: {e}")))?;

        let session = Session {
            rest_token: login.rest_token,
            rest_url: login.rest_url,
        };
        tracing::info!(rest_url = %session.rest_url, "bullhorn session established");
        auth.session = Some(session.clone());
        Ok(session)
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let ms = self
            .config
            .backoff_base_ms
            .saturating_mul(1u64 << attempt.min(16));
        Duration::from_millis(ms.min(MAX_BACKOFF_MS))
    }

    /// Send a request built against the current session, retrying transient failures.
    ///
    /// A 401 refreshes the session once without consuming a retry; a second 401 in the
    /// same call is an auth failure.
    async fn send_authorized<F>(
        &self,
        resource: &str,
        build: F,
    ) -> Result<Response, BullhornClientError>
    where
        F: Fn(&Session) -> RequestBuilder,
    {
        let mut attempt: u32 = 0;
        let mut refreshed = false;
        let mut last_error = String::new();
        let mut waited_retry_after = false;

        loop {
            if attempt > self.config.max_retries {
                return Err(BullhornClientError::Transient {
                    attempts: attempt,
                    last_error,
                });
            }
            if attempt > 0 && !std::mem::take(&mut waited_retry_after) {
                let backoff = self.backoff_delay(attempt);
                tracing::warn!(
                    resource,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "retrying after backoff"
                );
                tokio::time::sleep(backoff).await;
            }

            let session = self.current_session().await?;

            let response = match build(&session).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = e.to_string();
                    if e.is_timeout() || e.is_connect() {
                        attempt += 1;
                        continue;
                    }
                    return Err(BullhornClientError::Request(e));
                }
            };

            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            if status == StatusCode::UNAUTHORIZED {
                if refreshed {
                    return Err(BullhornClientError::Auth(format!(
                        "{resource} still unauthorized after session refresh"
                    )));
                }
                tracing::info!(resource, "session rejected, refreshing");
                self.refresh_session(&session).await?;
                refreshed = true;
                continue;
            }

            if status == StatusCode::NOT_FOUND {
                return Err(BullhornClientError::NotFound(resource.to_string()));
            }

            // Honor Retry-After header for 429
            if status == StatusCode::TOO_MANY_REQUESTS {
                if let Some(retry_after) = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                {
                    let wait = std::cmp::min(retry_after, MAX_RETRY_AFTER_SECS);
                    tracing::warn!(resource, wait, "rate-limited, waiting Retry-After");
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                    waited_retry_after = true;
                }
                last_error = "429 Too Many Requests".to_string();
                attempt += 1;
                continue;
            }

            if status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                last_error = format!("{status}: {body}");
                attempt += 1;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(BullhornClientError::Http { status, body });
        }
    }
}

#[async_trait]
impl JobSource for BullhornClient {
    fn page_size(&self) -> u32 {
        BullhornClient::page_size(self)
    }

    async fn list_recent_ids(
        &self,
        page_token: Option<PageToken>,
    ) -> Result<IdPage, BullhornClientError> {
        BullhornClient::list_recent_ids(self, page_token).await
    }

    async fn fetch_job(&self, external_id: &str) -> Result<JobPayload, BullhornClientError> {
        BullhornClient::fetch_job(self, external_id).await
    }
}
