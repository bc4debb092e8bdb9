//! Work messages handed to remote executors.

use crate::build::{Build, Job};
use crate::repo::{Netrc, Repo, User};
use crate::secrets::Secret;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Everything an executor needs to run a single job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Work {
    pub signed: bool,
    pub verified: bool,
    pub user: User,
    pub repo: Repo,
    pub build: Build,
    /// Most recent earlier build on the same branch, for status-change
    /// notifications.
    pub build_last: Option<Build>,
    pub job: Job,
    pub netrc: Netrc,
    /// Raw build configuration text.
    pub yaml: String,
    pub secrets: Vec<Secret>,
    pub system: System,
}

/// Server metadata passed through to executors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct System {
    /// Public base URL of this server; executors call back to it.
    pub link: String,
}

/// JSON schema describing the work message contract.
pub fn work_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(Work)
}
