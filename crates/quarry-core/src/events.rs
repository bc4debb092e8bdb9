//! Pub/sub notifications for observers.

use crate::build::Build;
use crate::repo::Repo;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A lightweight state-change notification. Observers (UIs, other services)
/// consume these; executors consume [`crate::work::Work`] instead.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub repo: Repo,
    pub build: Build,
}

impl Event {
    pub fn enqueued(repo: Repo, build: Build) -> Self {
        Self {
            event_type: EventType::Enqueued,
            repo,
            build,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Enqueued,
    Started,
    Finished,
}
