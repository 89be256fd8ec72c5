//! Engine settings.
//!
//! Settings are not persisted; they start from defaults and are overlaid with
//! environment variables at startup.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// User agent sent with every request unless overridden.
pub const DEFAULT_USER_AGENT: &str = concat!("dim/", env!("CARGO_PKG_VERSION"));

const ENV_MAX_PARALLEL: &str = "DIM_MAX_PARALLEL";
const ENV_HTTP_TIMEOUT: &str = "DIM_HTTP_TIMEOUT_SECS";
const ENV_USER_AGENT: &str = "DIM_USER_AGENT";

// =============================================================================
// Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Upper bound on concurrent installs in parallel mode. `None` = whole batch.
    pub max_parallel: Option<usize>,
    /// Per-request timeout handed to the HTTP client. `None` = no timeout.
    pub http_timeout_secs: Option<u64>,
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_parallel: None,
            http_timeout_secs: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Settings {
    /// Defaults overlaid with `DIM_MAX_PARALLEL`, `DIM_HTTP_TIMEOUT_SECS` and `DIM_USER_AGENT`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();

        if let Some(raw) = lookup(ENV_MAX_PARALLEL) {
            match raw.trim().parse::<usize>() {
                Ok(0) | Err(_) => warn!("Ignoring invalid {}={:?}", ENV_MAX_PARALLEL, raw),
                Ok(n) => settings.max_parallel = Some(n),
            }
        }

        if let Some(raw) = lookup(ENV_HTTP_TIMEOUT) {
            match raw.trim().parse::<u64>() {
                Ok(0) | Err(_) => warn!("Ignoring invalid {}={:?}", ENV_HTTP_TIMEOUT, raw),
                Ok(secs) => settings.http_timeout_secs = Some(secs),
            }
        }

        if let Some(agent) = lookup(ENV_USER_AGENT).filter(|s| !s.trim().is_empty()) {
            settings.user_agent = agent;
        }

        settings
    }

    pub fn http_timeout(&self) -> Option<Duration> {
        self.http_timeout_secs.map(Duration::from_secs)
    }

    /// Concurrency limit for a batch of `len` items, never zero.
    pub fn parallel_limit(&self, len: usize) -> usize {
        self.max_parallel.unwrap_or(len).clamp(1, len.max(1))
    }
}

impl std::fmt::Display for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parallel = self
            .max_parallel
            .map(|n| n.to_string())
            .unwrap_or_else(|| "unbounded".to_string());
        let timeout = self
            .http_timeout_secs
            .map(|s| format!("{}s", s))
            .unwrap_or_else(|| "none".to_string());
        write!(
            f,
            "max_parallel={} http_timeout={} user_agent={}",
            parallel, timeout, self.user_agent
        )
    }
}
