//! Bitbucket Server connection settings.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BitbucketConfig {
    /// Server base URL, e.g. `https://git.example.com`.
    pub base_url: String,
    /// Accept invalid TLS certificates.
    pub skip_verify: bool,
    /// Per-request timeout, in seconds.
    pub timeout_secs: u64,
    /// Key identifying this server's statuses on a commit.
    pub status_key: String,
    /// Display name prefix of posted statuses.
    pub status_name: String,
}

impl Default for BitbucketConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:7990".to_string(),
            skip_verify: false,
            timeout_secs: 30,
            status_key: "quarry".to_string(),
            status_name: "Quarry".to_string(),
        }
    }
}

impl BitbucketConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_skip_verify(mut self, skip: bool) -> Self {
        self.skip_verify = skip;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_status_key(mut self, key: impl Into<String>) -> Self {
        self.status_key = key.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Base URL without a trailing slash.
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}
