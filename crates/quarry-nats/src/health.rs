//! Connection health of the NATS publisher.

use crate::metrics::NatsMetrics;

/// Health status of the NATS connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    /// Connected, but publishes have failed.
    Degraded { reason: String },
    Unhealthy { reason: String },
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    /// Healthy or degraded.
    pub fn is_operational(&self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Degraded { .. })
    }
}

/// Health check result with details.
#[derive(Debug, Clone)]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub connected: bool,
    pub messages_published: u64,
    pub publish_failures: u64,
}

impl HealthCheck {
    pub fn from_metrics(metrics: &NatsMetrics, connected: bool) -> Self {
        let snapshot = metrics.snapshot();

        let status = if connected {
            if snapshot.publish_failures > 0 {
                HealthStatus::Degraded {
                    reason: format!("{} publish failures recorded", snapshot.publish_failures),
                }
            } else {
                HealthStatus::Healthy
            }
        } else {
            HealthStatus::Unhealthy {
                reason: "Not connected to NATS".to_string(),
            }
        };

        Self {
            status,
            connected,
            messages_published: snapshot.messages_published,
            publish_failures: snapshot.publish_failures,
        }
    }
}
