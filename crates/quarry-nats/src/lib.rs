//! NATS queue publisher for Quarry CI.

pub mod config;
pub mod health;
pub mod metrics;
mod publisher;

pub use config::NatsConfig;
pub use health::{HealthCheck, HealthStatus};
pub use metrics::{MetricsSnapshot, NatsMetrics};
pub use publisher::{NatsQueuePublisher, StreamInfo, to_header_map};
