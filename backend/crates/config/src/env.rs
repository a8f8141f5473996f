use std::env;
use std::str::FromStr;
use std::time::Duration;

use jobfeed_common::error::{JobfeedError, JobfeedResult};
use serde::Deserialize;

/// Upstream pages are capped at 20 items per request.
pub const MAX_PAGE_SIZE: u32 = 20;

/// Intervals shorter than this put avoidable load on the upstream API.
pub const RECOMMENDED_MIN_INTERVAL_SECS: u64 = 600;

/// Upper bound for the stale-lock timeout: one week.
pub const MAX_LOCK_TIMEOUT_SECS: u64 = 7 * 24 * 3600;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` file if present, then reads required vars.
    pub fn from_env() -> JobfeedResult<Self> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();

        Ok(Self {
            database_url: get_var("DATABASE_URL")?,
            host: get_var_or("HOST", "0.0.0.0"),
            port: get_parsed("PORT", 8080)?,
            log_level: get_var_or("LOG_LEVEL", "info"),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Which local collection the synchronized listings are written to.
///
/// Chosen once at startup; the reconciler never inspects ambient state to decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingMode {
    /// Listings live in the engine's own collection.
    Standalone,
    /// Listings are written into a companion job board's collection.
    JobBoard,
}

impl ListingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standalone => "standalone",
            Self::JobBoard => "job_board",
        }
    }
}

impl FromStr for ListingMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "standalone" | "plugin" => Ok(Self::Standalone),
            "job_board" | "job-board" | "jobboard" => Ok(Self::JobBoard),
            other => Err(format!("unknown listing mode: {other}")),
        }
    }
}

/// Tunables for the reconciliation loop and its trigger.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub max_window_size: usize,
    pub max_deletions_per_run: usize,
    pub page_size: u32,
    pub sync_interval_secs: u64,
    pub lock_timeout_secs: u64,
    pub fetch_concurrency: usize,
    pub listing_mode: ListingMode,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_window_size: 120,
            max_deletions_per_run: 500,
            page_size: MAX_PAGE_SIZE,
            sync_interval_secs: RECOMMENDED_MIN_INTERVAL_SECS,
            lock_timeout_secs: 3600,
            fetch_concurrency: 4,
            listing_mode: ListingMode::Standalone,
        }
    }
}

impl SyncConfig {
    /// Load sync tunables, falling back to defaults for anything unset.
    ///
    /// Values that are set but unparsable are an error rather than a silent default.
    pub fn from_env() -> JobfeedResult<Self> {
        let defaults = Self::default();

        let listing_mode = match env::var("LISTING_MODE") {
            Ok(raw) => raw.parse().map_err(JobfeedError::Config)?,
            Err(_) => defaults.listing_mode,
        };

        let config = Self {
            max_window_size: get_parsed("MAX_WINDOW_SIZE", defaults.max_window_size)?,
            max_deletions_per_run: get_parsed(
                "MAX_DELETIONS_PER_RUN",
                defaults.max_deletions_per_run,
            )?,
            page_size: get_parsed("PAGE_SIZE", defaults.page_size)?,
            sync_interval_secs: get_parsed("SYNC_INTERVAL_SECS", defaults.sync_interval_secs)?,
            lock_timeout_secs: get_parsed("LOCK_TIMEOUT_SECS", defaults.lock_timeout_secs)?,
            fetch_concurrency: get_parsed("FETCH_CONCURRENCY", defaults.fetch_concurrency)?,
            listing_mode,
        };

        config.validated()
    }

    /// Clamp the page size into the upstream limit and reject zero-sized bounds.
    pub fn validated(mut self) -> JobfeedResult<Self> {
        if self.max_window_size == 0 {
            return Err(JobfeedError::Config("MAX_WINDOW_SIZE must be > 0".into()));
        }
        if self.max_deletions_per_run == 0 {
            return Err(JobfeedError::Config(
                "MAX_DELETIONS_PER_RUN must be > 0".into(),
            ));
        }
        if self.sync_interval_secs == 0 {
            return Err(JobfeedError::Config("SYNC_INTERVAL_SECS must be > 0".into()));
        }
        if self.lock_timeout_secs == 0 || self.lock_timeout_secs > MAX_LOCK_TIMEOUT_SECS {
            return Err(JobfeedError::Config(format!(
                "LOCK_TIMEOUT_SECS must be between 1 and {MAX_LOCK_TIMEOUT_SECS}"
            )));
        }
        self.page_size = self.page_size.clamp(1, MAX_PAGE_SIZE);
        self.fetch_concurrency = self.fetch_concurrency.max(1);

        if self.sync_interval_secs < RECOMMENDED_MIN_INTERVAL_SECS {
            tracing::warn!(
                interval_secs = self.sync_interval_secs,
                recommended = RECOMMENDED_MIN_INTERVAL_SECS,
                "sync interval is shorter than recommended"
            );
        }

        Ok(self)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }
}

fn get_var(key: &str) -> JobfeedResult<String> {
    env::var(key).map_err(|_| JobfeedError::Config(format!("{key} is required but not set")))
}

fn get_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn get_parsed<T>(key: &str, default: T) -> JobfeedResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| JobfeedError::Config(format!("invalid {key}: {e}"))),
        Err(_) => Ok(default),
    }
}
