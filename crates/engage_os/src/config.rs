#![forbid(unsafe_code)]

use std::env;
use std::ops::RangeInclusive;
use std::path::PathBuf;

use engage_engines::adapters::SourceAdapterConfig;
use engage_engines::http::HttpTransportConfig;
use engage_storage::event_store::EventStoreConfig;
use engage_storage::view_state::DEFAULT_USER_SCOPE;

use crate::activity_feed::ActivityFeedConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngagementConfig {
    pub http: HttpTransportConfig,
    pub adapters: SourceAdapterConfig,
    pub event_store: EventStoreConfig,
    pub feed: ActivityFeedConfig,
    pub state_dir: PathBuf,
    pub user_scope: String,
}

impl EngagementConfig {
    pub fn mvp_v1() -> Self {
        Self {
            http: HttpTransportConfig::mvp_v1(),
            adapters: SourceAdapterConfig::mvp_v1(),
            event_store: EventStoreConfig::mvp_v1(),
            feed: ActivityFeedConfig::mvp_v1(),
            state_dir: default_state_dir(),
            user_scope: DEFAULT_USER_SCOPE.to_string(),
        }
    }

    /// `mvp_v1` with `ENGAGE_*` overrides. Out-of-range numbers keep the default.
    pub fn from_env() -> Self {
        let mut config = Self::mvp_v1();
        config.http = HttpTransportConfig::from_env();
        if let Some(capacity) = env_usize("ENGAGE_EVENT_LOG_CAPACITY", 1..=10_000) {
            config.event_store.capacity = capacity;
        }
        if let Some(limit) = env_usize("ENGAGE_FEED_LIMIT", 1..=100) {
            config.feed.dashboard_limit = limit;
        }
        if let Some(dir) = env_text("ENGAGE_STATE_DIR") {
            config.state_dir = PathBuf::from(dir);
        }
        if let Some(scope) = env_text("ENGAGE_USER_SCOPE") {
            config.user_scope = scope;
        }
        config
    }
}

fn env_text(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_usize(name: &str, range: RangeInclusive<usize>) -> Option<usize> {
    env_text(name)
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| range.contains(v))
}

fn default_state_dir() -> PathBuf {
    if let Some(xdg) = env_text("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("engage");
    }
    if let Some(home) = env_text("HOME") {
        return PathBuf::from(home).join(".config").join("engage");
    }
    PathBuf::from(".engage")
}
