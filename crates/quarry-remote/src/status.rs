//! Bitbucket Server build-status payloads.

use quarry_core::build::{Build, BuildStatus};
use serde::Serialize;

/// Body of `POST /rest/build-status/1.0/commits/{commit}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildStatusBody {
    pub state: &'static str,
    pub key: String,
    pub name: String,
    pub url: String,
    pub description: &'static str,
}

impl BuildStatusBody {
    pub fn new(key: &str, name_prefix: &str, build: &Build, url: &str) -> Self {
        Self {
            state: state(build.status),
            key: key.to_string(),
            name: format!("{} #{} - {}", name_prefix, build.number, build.branch),
            url: url.to_string(),
            description: description(build.status),
        }
    }
}

/// Bitbucket Server knows three states.
pub fn state(status: BuildStatus) -> &'static str {
    match status {
        BuildStatus::Pending | BuildStatus::Running => "INPROGRESS",
        BuildStatus::Success => "SUCCESSFUL",
        BuildStatus::Failure | BuildStatus::Killed | BuildStatus::Error | BuildStatus::Skipped => {
            "FAILED"
        }
    }
}

pub fn description(status: BuildStatus) -> &'static str {
    match status {
        BuildStatus::Pending => "The build is pending",
        BuildStatus::Running => "The build is running",
        BuildStatus::Success => "The build was successful",
        BuildStatus::Failure => "The build failed",
        BuildStatus::Killed => "The build was killed",
        BuildStatus::Error => "The build errored",
        BuildStatus::Skipped => "The build was skipped",
    }
}
