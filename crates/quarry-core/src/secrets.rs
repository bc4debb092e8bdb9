//! Secret types.

use crate::build::BuildEvent;
use crate::ids::SecretId;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A named secret resolved for a repository and released to executors.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Secret {
    pub id: SecretId,
    pub name: String,
    pub value: String,
    /// Image patterns the secret may be exposed to. Empty means any.
    #[serde(default)]
    pub images: Vec<String>,
    /// Events the secret may be exposed to. Empty means any.
    #[serde(default)]
    pub events: Vec<BuildEvent>,
    /// Whether executors may release the secret to unverified configurations.
    #[serde(default)]
    pub skip_verify: bool,
    #[serde(default)]
    pub scope: SecretScope,
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("images", &self.images)
            .field("events", &self.events)
            .field("skip_verify", &self.skip_verify)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SecretScope {
    #[default]
    Repo,
    Team,
}
