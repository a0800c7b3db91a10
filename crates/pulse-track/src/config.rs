//! Tracker configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::store::default_data_dir;
use crate::{DEFAULT_FLUSH_INTERVAL_SECS, DEFAULT_MAX_QUEUE_EVENTS};

/// Configuration for the analytics tracker.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Base URL of the collector, e.g. `https://api.example.com`.
    pub endpoint: String,

    /// Path of the event-batch endpoint.
    pub track_path: String,

    /// Path of the session-announcement endpoint.
    pub session_path: String,

    /// Cadence of the periodic flush.
    pub flush_interval: Duration,

    /// Cap on queued events before the oldest are dropped.
    pub max_queue_events: usize,

    /// Per-request timeout for deliveries.
    pub request_timeout: Duration,

    /// User-agent header, also reported in `page_view` properties.
    pub user_agent: String,

    /// Page the session starts on.
    pub landing_page: String,

    /// Where the visitor came from, if the host application knows.
    pub referrer: Option<String>,

    /// Directory for durable analytics state (flag file).
    pub data_dir: PathBuf,
}

impl TrackerConfig {
    /// Create a config for the given collector base URL, with defaults
    /// for everything else.
    pub fn new(endpoint: impl Into<String>) -> Self {
        TrackerConfig {
            endpoint: endpoint.into(),
            track_path: "/api/analytics/track".to_string(),
            session_path: "/api/analytics/session".to_string(),
            flush_interval: Duration::from_secs(DEFAULT_FLUSH_INTERVAL_SECS),
            max_queue_events: DEFAULT_MAX_QUEUE_EVENTS,
            request_timeout: Duration::from_secs(10),
            user_agent: concat!("pulse-track/", env!("CARGO_PKG_VERSION")).to_string(),
            landing_page: "/".to_string(),
            referrer: None,
            data_dir: default_data_dir(),
        }
    }

    /// Set the flush cadence.
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Set the queue cap.
    pub fn with_max_queue_events(mut self, max: usize) -> Self {
        self.max_queue_events = max;
        self
    }

    /// Set the page the session starts on.
    pub fn with_landing_page(mut self, page: impl Into<String>) -> Self {
        self.landing_page = page.into();
        self
    }

    /// Set the referrer reported for this session.
    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    /// Set the directory for durable analytics state.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Set the user-agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Full URL of the event-batch endpoint.
    pub fn track_url(&self) -> String {
        join_url(&self.endpoint, &self.track_path)
    }

    /// Full URL of the session-announcement endpoint.
    pub fn session_url(&self) -> String {
        join_url(&self.endpoint, &self.session_path)
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        // Local dev collector.
        Self::new("http://127.0.0.1:8787")
    }
}

fn join_url(endpoint: &str, path: &str) -> String {
    format!("{}{}", endpoint.trim_end_matches('/'), path)
}
