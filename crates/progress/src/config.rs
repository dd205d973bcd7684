//! Tracker and remote configuration.

use std::time::Duration;

/// Key the progress document is persisted under.
pub const DEFAULT_STORAGE_KEY: &str = "safescape_progress";

/// Display name used when the learner has not set one.
pub const DEFAULT_PLACEHOLDER_NAME: &str = "Future Hero";

/// Path of the progress endpoint on the backend.
pub const DEFAULT_ENDPOINT: &str = "/api/kids/safescape/progress";

/// Local tracker configuration.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Storage key for the persisted document
    pub storage_key: String,
    /// Fallback display name
    pub placeholder_name: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            placeholder_name: DEFAULT_PLACEHOLDER_NAME.to_string(),
        }
    }
}

impl TrackerConfig {
    /// Use a different storage key.
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Use a different placeholder name.
    pub fn with_placeholder_name(mut self, name: impl Into<String>) -> Self {
        self.placeholder_name = name.into();
        self
    }
}

/// Remote progress API configuration.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Backend origin, e.g. `https://portal.example.org`
    pub base_url: String,
    /// Progress endpoint path
    pub endpoint: String,
    /// Transport timeout
    pub timeout: Duration,
    /// Opaque session credential, sent as the `session` cookie
    pub session: Option<String>,
}

impl RemoteConfig {
    /// Configuration for a backend with default endpoint and timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(30),
            session: None,
        }
    }

    /// Attach a session credential.
    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    /// Override the transport timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full endpoint URL.
    pub fn url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.endpoint)
    }
}

/// A resolved learner identity. Without one the tracker runs in guest
/// mode and never talks to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Server-side user id
    pub user_id: String,
    /// Display name supplied by the host
    pub user_name: Option<String>,
}

impl Identity {
    /// Identity without a display name.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: None,
        }
    }

    /// Attach a display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_url() {
        let config = RemoteConfig::new("http://localhost:3000/");
        assert_eq!(config.url(), "http://localhost:3000/api/kids/safescape/progress");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_tracker_defaults() {
        let config = TrackerConfig::default();
        assert_eq!(config.storage_key, "safescape_progress");
        assert_eq!(config.placeholder_name, "Future Hero");
    }
}
