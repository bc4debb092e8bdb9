//! Readiness probes for the backing services.

use async_trait::async_trait;
use quarry_api::ReadinessProbe;
use quarry_db::Database;
use quarry_nats::{HealthStatus, NatsQueuePublisher};
use std::sync::Arc;

pub struct DatabaseProbe(pub Database);

#[async_trait]
impl ReadinessProbe for DatabaseProbe {
    fn name(&self) -> &str {
        "database"
    }

    async fn check(&self) -> Result<(), String> {
        self.0.ping().await.map_err(|e| e.to_string())
    }
}

pub struct NatsProbe(pub Arc<NatsQueuePublisher>);

#[async_trait]
impl ReadinessProbe for NatsProbe {
    fn name(&self) -> &str {
        "nats"
    }

    async fn check(&self) -> Result<(), String> {
        // Publish failures are reported as advisories; only a lost
        // connection makes the service unready.
        match self.0.health_check().status {
            HealthStatus::Healthy | HealthStatus::Degraded { .. } => Ok(()),
            HealthStatus::Unhealthy { reason } => Err(reason),
        }
    }
}
