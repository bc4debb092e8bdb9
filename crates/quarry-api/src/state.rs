//! Application state shared across handlers.

use async_trait::async_trait;
use quarry_trigger::TriggerPipeline;
use std::sync::Arc;

/// A dependency checked by `GET /ready`.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    fn name(&self) -> &str;

    async fn check(&self) -> Result<(), String>;
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<TriggerPipeline>,
    /// Public base URL. When unset it is derived from each request.
    pub public_url: Option<String>,
    pub probes: Vec<Arc<dyn ReadinessProbe>>,
}

impl AppState {
    pub fn new(pipeline: Arc<TriggerPipeline>) -> Self {
        Self {
            pipeline,
            public_url: None,
            probes: Vec::new(),
        }
    }

    pub fn with_public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn ReadinessProbe>) -> Self {
        self.probes.push(probe);
        self
    }
}
