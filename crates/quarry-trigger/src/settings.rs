//! Pipeline settings.

use serde::{Deserialize, Serialize};

/// Paths, defaults and queue addresses used while admitting and
/// dispatching builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Build configuration file, relative to the repository root.
    #[serde(default = "default_config_path")]
    pub config_path: String,
    /// Detached signature of the build configuration.
    #[serde(default = "default_signature_path")]
    pub signature_path: String,
    /// Platform header value when the configuration declares none.
    #[serde(default = "default_platform")]
    pub default_platform: String,
    /// General execution queue.
    #[serde(default = "default_work_queue")]
    pub work_queue: String,
    /// Queue for deployment events without a configured override.
    #[serde(default = "default_deploy_queue")]
    pub deploy_queue: String,
    /// Subject for enqueue notifications.
    #[serde(default = "default_events_subject")]
    pub events_subject: String,
}

fn default_config_path() -> String {
    ".quarry.yml".to_string()
}

fn default_signature_path() -> String {
    ".quarry.yml.sig".to_string()
}

fn default_platform() -> String {
    "linux/amd64".to_string()
}

fn default_work_queue() -> String {
    "builds.pending".to_string()
}

fn default_deploy_queue() -> String {
    "builds.deploy".to_string()
}

fn default_events_subject() -> String {
    "events".to_string()
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            config_path: default_config_path(),
            signature_path: default_signature_path(),
            default_platform: default_platform(),
            work_queue: default_work_queue(),
            deploy_queue: default_deploy_queue(),
            events_subject: default_events_subject(),
        }
    }
}

impl PipelineSettings {
    pub fn with_config_path(mut self, path: impl Into<String>) -> Self {
        self.config_path = path.into();
        self
    }

    pub fn with_work_queue(mut self, queue: impl Into<String>) -> Self {
        self.work_queue = queue.into();
        self
    }

    pub fn with_deploy_queue(mut self, queue: impl Into<String>) -> Self {
        self.deploy_queue = queue.into();
        self
    }

    pub fn with_default_platform(mut self, platform: impl Into<String>) -> Self {
        self.default_platform = platform.into();
        self
    }
}
