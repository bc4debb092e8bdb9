//! Build and job types.

use crate::ids::{BuildId, JobId, RepoId};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One triggering event for a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Build {
    pub id: BuildId,
    pub repo_id: RepoId,
    /// Per-repository sequence number, assigned when the build is persisted.
    pub number: u32,
    pub event: BuildEvent,
    pub status: BuildStatus,
    pub branch: String,
    pub commit: String,
    #[serde(default)]
    pub git_ref: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub author_email: Option<String>,
    /// Target environment of a deployment event.
    #[serde(default)]
    pub deploy_to: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    /// A signature file accompanied the build configuration.
    #[serde(default)]
    pub signed: bool,
    /// The signature verified against the repository hash and covers the
    /// exact configuration bytes.
    #[serde(default)]
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub enqueued_at: Option<DateTime<Utc>>,
}

impl Build {
    /// Create an unpersisted build from the fields a remote trigger carries.
    pub fn new(event: BuildEvent, branch: impl Into<String>, commit: impl Into<String>) -> Self {
        Self {
            id: BuildId::new(),
            repo_id: RepoId::from_uuid(uuid::Uuid::nil()),
            number: 0,
            event,
            status: BuildStatus::Pending,
            branch: branch.into(),
            commit: commit.into(),
            git_ref: None,
            message: String::new(),
            author: String::new(),
            author_email: None,
            deploy_to: None,
            link: None,
            signed: false,
            verified: false,
            created_at: Utc::now(),
            enqueued_at: None,
        }
    }
}

/// Kind of event that triggered a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BuildEvent {
    Push,
    PullRequest,
    Tag,
    Deployment,
}

impl BuildEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildEvent::Push => "push",
            BuildEvent::PullRequest => "pull_request",
            BuildEvent::Tag => "tag",
            BuildEvent::Deployment => "deployment",
        }
    }

    /// Tag and deployment events are built regardless of branch rules.
    pub fn bypasses_branch_rules(&self) -> bool {
        matches!(self, BuildEvent::Tag | BuildEvent::Deployment)
    }
}

impl std::fmt::Display for BuildEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BuildEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "push" => Ok(BuildEvent::Push),
            "pull_request" | "pull-request" => Ok(BuildEvent::PullRequest),
            "tag" => Ok(BuildEvent::Tag),
            "deployment" | "deploy" => Ok(BuildEvent::Deployment),
            other => Err(format!("unknown build event: {}", other)),
        }
    }
}

/// Lifecycle status shared by builds and jobs.
///
/// This crate only ever sets `Pending`; the remaining states are written by
/// executors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Pending,
    Running,
    Success,
    Failure,
    Killed,
    Error,
    Skipped,
}

impl BuildStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStatus::Pending => "pending",
            BuildStatus::Running => "running",
            BuildStatus::Success => "success",
            BuildStatus::Failure => "failure",
            BuildStatus::Killed => "killed",
            BuildStatus::Error => "error",
            BuildStatus::Skipped => "skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, BuildStatus::Pending | BuildStatus::Running)
    }
}

impl std::str::FromStr for BuildStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BuildStatus::Pending),
            "running" => Ok(BuildStatus::Running),
            "success" => Ok(BuildStatus::Success),
            "failure" => Ok(BuildStatus::Failure),
            "killed" => Ok(BuildStatus::Killed),
            "error" => Ok(BuildStatus::Error),
            "skipped" => Ok(BuildStatus::Skipped),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

/// One point in a build matrix: environment variable name to value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Axis(BTreeMap<String, String>);

impl Axis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    /// True when every entry of `partial` is present with the same value.
    pub fn contains_all(&self, partial: &Axis) -> bool {
        partial.iter().all(|(k, v)| self.0.get(k) == Some(v))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Axis {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// One unit of executable work within a build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    pub id: JobId,
    pub build_id: BuildId,
    /// 1-based position within the build.
    pub number: u32,
    pub status: BuildStatus,
    pub environment: Axis,
}

impl Job {
    pub fn pending(build_id: BuildId, number: u32, environment: Axis) -> Self {
        Self {
            id: JobId::new(),
            build_id,
            number,
            status: BuildStatus::Pending,
            environment,
        }
    }
}
