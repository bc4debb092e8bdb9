//! Configuration for the NATS publisher.

use serde::Deserialize;
use std::time::Duration;

/// Configuration for the NATS publisher.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    /// NATS server URLs (several for a cluster).
    pub urls: Vec<String>,
    /// JetStream stream capturing published subjects. Publishing stays
    /// fire-and-forget either way; the stream only adds durability.
    pub stream_name: Option<String>,
    /// Subjects captured by the stream.
    pub stream_subjects: Vec<String>,
    /// Maximum reconnection attempts.
    pub max_reconnect_attempts: Option<usize>,
    /// Connection timeout.
    #[serde(with = "secs")]
    pub connection_timeout: Duration,
    /// Request timeout for JetStream operations.
    #[serde(with = "secs")]
    pub request_timeout: Duration,
    /// Message retention period of the stream.
    #[serde(with = "secs")]
    pub max_age: Duration,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            urls: vec!["nats://localhost:4222".to_string()],
            stream_name: None,
            stream_subjects: vec!["builds.>".to_string(), "events".to_string()],
            max_reconnect_attempts: None, // Unlimited
            connection_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
            max_age: Duration::from_secs(86400 * 7), // 7 days
        }
    }
}

impl NatsConfig {
    /// Create a new config with a single URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            ..Default::default()
        }
    }

    /// Set multiple server URLs for cluster support.
    pub fn with_urls(mut self, urls: Vec<String>) -> Self {
        self.urls = urls;
        self
    }

    /// Capture published subjects in a JetStream stream.
    pub fn with_stream(mut self, name: impl Into<String>, subjects: Vec<String>) -> Self {
        self.stream_name = Some(name.into());
        self.stream_subjects = subjects;
        self
    }

    /// Set max reconnection attempts.
    pub fn with_max_reconnects(mut self, max: usize) -> Self {
        self.max_reconnect_attempts = Some(max);
        self
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }
}

/// Durations as whole seconds.
mod secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
