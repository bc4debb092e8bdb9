//! Manual trigger payloads.
//!
//! ```json
//! {"branch": "main", "event": "push", "author": "octocat",
//!  "commit": "9fceb02", "message": "Fix flaky test"}
//! ```
//!
//! Field names are matched case-insensitively for the common spellings.
//! Unknown events are treated as pushes.

use quarry_core::build::{Build, BuildEvent};
use quarry_core::ids::{RepoId, UserId};
use quarry_core::repo::{Repo, RepoKind};
use quarry_core::{Error, Result};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct TriggerBody {
    #[serde(alias = "Branch")]
    pub branch: String,
    #[serde(default, alias = "Event")]
    pub event: String,
    #[serde(default, alias = "Author")]
    pub author: String,
    #[serde(alias = "Commit")]
    pub commit: String,
    #[serde(default, alias = "Message")]
    pub message: String,
    #[serde(default, rename = "ref", alias = "Ref")]
    pub git_ref: Option<String>,
    #[serde(default, alias = "DeployTo")]
    pub deploy_to: Option<String>,
}

/// Parse a trigger body into a repository reference and a new build.
pub fn parse(base: &str, owner: &str, name: &str, body: &[u8]) -> Result<(Repo, Build)> {
    let trigger: TriggerBody =
        serde_json::from_slice(body).map_err(|e| Error::InvalidTrigger(e.to_string()))?;
    debug!(?trigger, "Parsed trigger");

    if trigger.branch.trim().is_empty() {
        return Err(Error::InvalidTrigger("branch is required".to_string()));
    }
    if trigger.commit.trim().is_empty() {
        return Err(Error::InvalidTrigger("commit is required".to_string()));
    }

    let event = trigger.event.parse().unwrap_or(BuildEvent::Push);
    let repo = project_repo(base, owner, name, &trigger.branch);

    let mut build = Build::new(event, trigger.branch, trigger.commit);
    build.link = Some(commit_link(base, owner, name, &build.commit));
    build.author = trigger.author;
    build.message = trigger.message;
    build.deploy_to = trigger.deploy_to;
    build.git_ref = Some(
        trigger
            .git_ref
            .unwrap_or_else(|| match event {
                BuildEvent::Tag => format!("refs/tags/{}", build.branch),
                _ => format!("refs/heads/{}", build.branch),
            }),
    );

    Ok((repo, build))
}

/// Repository reference for `owner/name` on the server at `base`.
pub(crate) fn project_repo(base: &str, owner: &str, name: &str, branch: &str) -> Repo {
    Repo {
        id: RepoId::new(),
        user_id: UserId::new(),
        owner: owner.to_string(),
        name: name.to_string(),
        full_name: Repo::full_name_of(owner, name),
        default_branch: branch.to_string(),
        kind: RepoKind::Git,
        clone_url: Some(format!("{}/scm/{}/{}.git", base, owner, name)),
        link: Some(format!("{}/projects/{}/repos/{}", base, owner, name)),
        is_private: true,
        is_trusted: false,
        hash: String::new(),
    }
}

pub(crate) fn commit_link(base: &str, owner: &str, name: &str, commit: &str) -> String {
    format!("{}/projects/{}/repos/{}/commits/{}", base, owner, name, commit)
}
