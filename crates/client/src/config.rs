use std::time::Duration;

/// Environment variable holding the HTTP base address.
pub const API_URL_ENV: &str = "GENBRIDGE_API_URL";
/// Environment variable holding the WebSocket base address.
pub const WS_URL_ENV: &str = "GENBRIDGE_WS_URL";

/// Job tracker configuration.
///
/// Only the two endpoint base addresses come from the environment. All
/// timing knobs default to the reference values below and can be
/// overridden in code.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// HTTP base URL for submission and status queries, e.g. `http://host:8000`.
    pub api_url: String,
    /// WebSocket base URL for push sessions, e.g. `ws://host:8000`.
    pub ws_url: String,
    /// Fixed cadence of the status poller (default: 3s).
    pub poll_interval: Duration,
    /// Loading age after which a job is eligible for polling (default: 12s).
    pub stale_after: Duration,
    /// Delay between acknowledging a delivered image and closing the
    /// push connection (default: 500ms).
    pub ack_grace: Duration,
    /// Delay between acknowledging an error and closing (default: 100ms).
    pub error_grace: Duration,
    /// Timeout applied to every HTTP request (default: 10s).
    pub request_timeout: Duration,
    /// Resolve a job as failed after this many unresolved status checks.
    /// `None` (the default) keeps it loading indefinitely. `Some(0)` is
    /// treated as `Some(1)`.
    pub max_poll_attempts: Option<u32>,
    /// How long shutdown waits for open sessions (default: 5s).
    pub shutdown_timeout: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".into(),
            ws_url: "ws://localhost:8000".into(),
            poll_interval: Duration::from_secs(3),
            stale_after: Duration::from_secs(12),
            ack_grace: Duration::from_millis(500),
            error_grace: Duration::from_millis(100),
            request_timeout: Duration::from_secs(10),
            max_poll_attempts: None,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl TrackerConfig {
    /// Default configuration pointed at the given endpoints.
    pub fn with_endpoints(api_url: impl Into<String>, ws_url: impl Into<String>) -> Self {
        Self {
            api_url: normalize_base(api_url.into()),
            ws_url: normalize_base(ws_url.into()),
            ..Self::default()
        }
    }

    /// Load the endpoint addresses from the environment.
    ///
    /// | Env Var             | Required |
    /// |---------------------|----------|
    /// | `GENBRIDGE_API_URL` | yes      |
    /// | `GENBRIDGE_WS_URL`  | yes      |
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = require_env(API_URL_ENV)?;
        let ws_url = require_env(WS_URL_ENV)?;
        Ok(Self::with_endpoints(api_url, ws_url))
    }

    /// Staleness threshold as a calendar duration for timestamp math.
    pub fn stale_threshold(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.stale_after).unwrap_or(chrono::Duration::MAX)
    }
}

fn require_env(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn normalize_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),
}
