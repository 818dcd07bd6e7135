//! Runtime configuration loaded from environment variables.
//!
//! Every numeric threshold the sync pipeline depends on (relevance threshold,
//! notification gate, snapshot TTL, retry interval, scan periods) is
//! configurable here so the pipeline stays testable at small scale.

use std::time::Duration;

use crate::{Error, Result};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite database URL.
    pub database_url: String,
    /// Base URL of the listing feed API.
    pub api_base_url: String,
    /// Static header credential: client id.
    pub client_id: String,
    /// Static header credential: client secret.
    pub client_secret: String,
    /// Outbound notification webhook URL.
    pub webhook_url: String,
    /// Base URL used when rendering watch links in notifications.
    pub watch_url_base: String,
    /// Page size requested from the listing feed.
    pub page_size: u32,
    /// Minimum viewer count below which feed content is not tracked.
    pub viewer_threshold: i64,
    /// Minimum rolling average viewer count required before notifying.
    pub notify_min_avg_viewers: i64,
    /// Absolute viewer count floor for hot-spike detection.
    pub hot_viewer_threshold: i64,
    /// Spike ratio over the rolling average for hot-spike detection.
    pub hot_spike_ratio: f64,
    /// Expiry for per-session content snapshots.
    pub snapshot_ttl: Duration,
    /// Fixed wait inside the discovery walker's catch-up retry loop.
    pub retry_interval: Duration,
    /// Deep-scan (cursor rediscovery) period.
    pub deep_scan_interval: Duration,
    /// Fast-scan (live sync) period.
    pub fast_scan_interval: Duration,
    /// Bounded concurrency for per-channel transition handling.
    pub handler_concurrency: usize,
    /// HTTP connect timeout.
    pub connect_timeout: Duration,
    /// HTTP total request timeout.
    pub request_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:livepulse.db?mode=rwc".to_string(),
            api_base_url: "https://openapi.chzzk.naver.com".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            webhook_url: String::new(),
            watch_url_base: "https://chzzk.naver.com/live".to_string(),
            page_size: 20,
            viewer_threshold: 50,
            notify_min_avg_viewers: 30,
            hot_viewer_threshold: 1000,
            hot_spike_ratio: 1.5,
            snapshot_ttl: Duration::from_secs(6 * 60 * 60),
            retry_interval: Duration::from_secs(10),
            deep_scan_interval: Duration::from_secs(60 * 60),
            fast_scan_interval: Duration::from_secs(60),
            handler_concurrency: 8,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl AppConfig {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            database_url: env_or("DATABASE_URL", defaults.database_url),
            api_base_url: env_or("LIVEPULSE_API_BASE_URL", defaults.api_base_url),
            client_id: env_or("LIVEPULSE_CLIENT_ID", defaults.client_id),
            client_secret: env_or("LIVEPULSE_CLIENT_SECRET", defaults.client_secret),
            webhook_url: env_or("LIVEPULSE_WEBHOOK_URL", defaults.webhook_url),
            watch_url_base: env_or("LIVEPULSE_WATCH_URL_BASE", defaults.watch_url_base),
            page_size: env_parsed("LIVEPULSE_PAGE_SIZE", defaults.page_size)?,
            viewer_threshold: env_parsed("LIVEPULSE_VIEWER_THRESHOLD", defaults.viewer_threshold)?,
            notify_min_avg_viewers: env_parsed(
                "LIVEPULSE_NOTIFY_MIN_AVG_VIEWERS",
                defaults.notify_min_avg_viewers,
            )?,
            hot_viewer_threshold: env_parsed(
                "LIVEPULSE_HOT_VIEWER_THRESHOLD",
                defaults.hot_viewer_threshold,
            )?,
            hot_spike_ratio: env_parsed("LIVEPULSE_HOT_SPIKE_RATIO", defaults.hot_spike_ratio)?,
            snapshot_ttl: Duration::from_secs(env_parsed(
                "LIVEPULSE_SNAPSHOT_TTL_SECS",
                defaults.snapshot_ttl.as_secs(),
            )?),
            retry_interval: Duration::from_millis(env_parsed(
                "LIVEPULSE_RETRY_INTERVAL_MS",
                defaults.retry_interval.as_millis() as u64,
            )?),
            deep_scan_interval: Duration::from_secs(env_parsed(
                "LIVEPULSE_DEEP_SCAN_INTERVAL_SECS",
                defaults.deep_scan_interval.as_secs(),
            )?),
            fast_scan_interval: Duration::from_secs(env_parsed(
                "LIVEPULSE_FAST_SCAN_INTERVAL_SECS",
                defaults.fast_scan_interval.as_secs(),
            )?),
            handler_concurrency: env_parsed(
                "LIVEPULSE_HANDLER_CONCURRENCY",
                defaults.handler_concurrency,
            )?,
            connect_timeout: Duration::from_secs(env_parsed(
                "LIVEPULSE_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout.as_secs(),
            )?),
            request_timeout: Duration::from_secs(env_parsed(
                "LIVEPULSE_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
        })
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parsed<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::config(format!("invalid {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}
