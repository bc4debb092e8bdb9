//! Fire-and-forget publishing onto NATS subjects.

use async_nats::HeaderMap;
use async_nats::jetstream::{self, stream::Config as StreamConfig};
use async_trait::async_trait;
use quarry_core::headers::Headers;
use quarry_core::ports::QueuePublisher;
use quarry_core::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

use crate::config::NatsConfig;
use crate::health::HealthCheck;
use crate::metrics::NatsMetrics;

/// Queue publisher over a core NATS connection.
///
/// Messages are written to the connection without waiting for any
/// acknowledgement. When a stream is configured, JetStream captures the
/// published subjects for durability.
#[derive(Clone)]
pub struct NatsQueuePublisher {
    client: async_nats::Client,
    jetstream: jetstream::Context,
    config: NatsConfig,
    metrics: Arc<NatsMetrics>,
    shutdown: Arc<AtomicBool>,
}

impl NatsQueuePublisher {
    /// Connect to a single server with default settings.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_config(NatsConfig::new(url)).await
    }

    /// Connect with custom configuration.
    pub async fn connect_with_config(config: NatsConfig) -> Result<Self> {
        let urls = config.urls.join(",");
        info!("Connecting to NATS at {}", urls);

        let metrics = NatsMetrics::new();

        let mut options = async_nats::ConnectOptions::new()
            .connection_timeout(config.connection_timeout)
            .request_timeout(Some(config.request_timeout))
            .retry_on_initial_connect();
        if let Some(max) = config.max_reconnect_attempts {
            options = options.max_reconnects(max);
        }

        let client = options
            .connect(&urls)
            .await
            .map_err(|e| Error::Queue(format!("Failed to connect to NATS: {}", e)))?;

        metrics.set_connected(true);

        let jetstream = jetstream::new(client.clone());

        if let Some(name) = &config.stream_name {
            let stream_config = StreamConfig {
                name: name.clone(),
                subjects: config.stream_subjects.clone(),
                retention: jetstream::stream::RetentionPolicy::Limits,
                max_age: config.max_age,
                storage: jetstream::stream::StorageType::File,
                ..Default::default()
            };

            jetstream
                .get_or_create_stream(stream_config)
                .await
                .map_err(|e| Error::Queue(format!("Failed to create stream: {}", e)))?;

            info!(stream = %name, "JetStream stream initialized");
        }

        info!("Connected to NATS");

        Ok(Self {
            client,
            jetstream,
            config,
            metrics,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get the underlying NATS client.
    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }

    pub fn metrics(&self) -> &Arc<NatsMetrics> {
        &self.metrics
    }

    pub fn is_connected(&self) -> bool {
        self.client.connection_state() == async_nats::connection::State::Connected
    }

    pub fn health_check(&self) -> HealthCheck {
        HealthCheck::from_metrics(&self.metrics, self.is_connected())
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Flush buffered messages to the server.
    pub async fn flush(&self) -> Result<()> {
        self.client
            .flush()
            .await
            .map_err(|e| Error::Queue(format!("Failed to flush: {}", e)))
    }

    /// Graceful shutdown: drain the connection so buffered messages are sent.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Draining NATS connection");
        self.shutdown.store(true, Ordering::SeqCst);

        if let Err(e) = self.client.drain().await {
            error!("Error draining NATS connection: {}", e);
        }

        self.metrics.set_connected(false);
        Ok(())
    }

    /// Info about the configured stream, if any.
    pub async fn stream_info(&self) -> Result<Option<StreamInfo>> {
        let Some(name) = &self.config.stream_name else {
            return Ok(None);
        };

        let mut stream = self
            .jetstream
            .get_stream(name)
            .await
            .map_err(|e| Error::Queue(format!("Failed to get stream: {}", e)))?;

        let info = stream
            .info()
            .await
            .map_err(|e| Error::Queue(format!("Failed to get stream info: {}", e)))?;

        Ok(Some(StreamInfo {
            name: info.config.name.clone(),
            messages: info.state.messages,
            bytes: info.state.bytes,
        }))
    }
}

/// Information about a JetStream stream.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub name: String,
    pub messages: u64,
    pub bytes: u64,
}

/// Convert routing headers into a NATS header map.
///
/// Headers that would corrupt the message framing are dropped: names must
/// be non-empty without whitespace, control characters or `:`, and values
/// must not contain CR or LF.
pub fn to_header_map(headers: &Headers) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (key, value) in headers.iter() {
        if !is_valid_header_name(key) {
            warn!(header = ?key, "Dropping header with invalid name");
            continue;
        }
        if !is_valid_header_value(value) {
            warn!(header = %key, "Dropping header with line break in value");
            continue;
        }
        map.insert(key, value);
    }
    map
}

fn is_valid_header_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c != ':' && !c.is_whitespace() && !c.is_control())
}

fn is_valid_header_value(value: &str) -> bool {
    !value.contains(['\r', '\n'])
}

#[async_trait]
impl QueuePublisher for NatsQueuePublisher {
    async fn publish(&self, address: &str, payload: Vec<u8>, headers: &Headers) -> Result<()> {
        if self.is_shutdown() {
            return Err(Error::Queue(
                "Cannot publish: shutdown in progress".to_string(),
            ));
        }

        let payload_len = payload.len() as u64;
        debug!(subject = %address, headers = headers.len(), "Publishing message");

        match self
            .client
            .publish_with_headers(address.to_string(), to_header_map(headers), payload.into())
            .await
        {
            Ok(()) => {
                self.metrics.record_publish(payload_len);
                Ok(())
            }
            Err(e) => {
                self.metrics.record_publish_failure();
                Err(Error::Queue(format!(
                    "Failed to publish to {}: {}",
                    address, e
                )))
            }
        }
    }
}
