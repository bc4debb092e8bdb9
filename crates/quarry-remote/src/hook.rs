//! Push webhooks sent by Bitbucket Server's post-receive hook.
//!
//! Only the fields a build needs are decoded:
//!
//! ```json
//! {
//!   "repository": {"slug": "hello", "project": {"key": "PROJ"}},
//!   "refChanges": [{"refId": "refs/heads/main", "fromHash": "...",
//!                   "toHash": "9fceb02", "type": "UPDATE"}],
//!   "changesets": {"values": [{"toCommit": {"id": "9fceb02",
//!     "message": "Fix flaky test",
//!     "author": {"name": "octocat", "emailAddress": "octocat@example.com"}}}]}
//! }
//! ```

use crate::trigger::{commit_link, project_repo};
use quarry_core::build::{Build, BuildEvent};
use quarry_core::repo::Repo;
use quarry_core::{Error, Result};
use serde::Deserialize;
use tracing::debug;

/// Longest author label stored on a build.
const MAX_AUTHOR_LEN: usize = 40;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushHook {
    pub repository: HookRepository,
    #[serde(default)]
    pub ref_changes: Vec<RefChange>,
    #[serde(default)]
    pub changesets: Changesets,
}

#[derive(Debug, Deserialize)]
pub struct HookRepository {
    pub slug: String,
    pub project: HookProject,
}

#[derive(Debug, Deserialize)]
pub struct HookProject {
    pub key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefChange {
    pub ref_id: String,
    #[serde(default)]
    pub from_hash: String,
    pub to_hash: String,
    #[serde(default, rename = "type")]
    pub kind: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Changesets {
    #[serde(default)]
    pub values: Vec<Changeset>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Changeset {
    pub to_commit: Commit,
}

#[derive(Debug, Deserialize)]
pub struct Commit {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub author: Author,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email_address: String,
}

/// Parse a push hook into the repository it names and a new build for its
/// first ref change.
pub fn parse(base: &str, body: &[u8]) -> Result<(Repo, Build)> {
    let hook: PushHook =
        serde_json::from_slice(body).map_err(|e| Error::InvalidTrigger(e.to_string()))?;

    let owner = hook.repository.project.key.trim();
    let name = hook.repository.slug.trim();
    if owner.is_empty() || name.is_empty() {
        return Err(Error::InvalidTrigger(
            "hook does not name a repository".to_string(),
        ));
    }

    let change = hook
        .ref_changes
        .first()
        .ok_or_else(|| Error::InvalidTrigger("hook carries no ref changes".to_string()))?;
    if change.kind.eq_ignore_ascii_case("DELETE") {
        return Err(Error::InvalidTrigger(format!(
            "ref {} was deleted",
            change.ref_id
        )));
    }
    if change.to_hash.trim().is_empty() {
        return Err(Error::InvalidTrigger("ref change has no target commit".to_string()));
    }
    debug!(repo = %format!("{}/{}", owner, name), git_ref = %change.ref_id, "Parsed push hook");

    let (event, branch) = match change.ref_id.strip_prefix("refs/tags/") {
        Some(tag) => (BuildEvent::Tag, tag),
        None => (
            BuildEvent::Push,
            change
                .ref_id
                .strip_prefix("refs/heads/")
                .unwrap_or(&change.ref_id),
        ),
    };

    let repo = project_repo(base, owner, name, branch);
    let mut build = Build::new(event, branch, change.to_hash.clone());
    build.git_ref = Some(change.ref_id.clone());
    build.link = Some(commit_link(base, owner, name, &change.to_hash));

    if let Some(changeset) = hook.changesets.values.first() {
        let commit = &changeset.to_commit;
        build.message = commit.message.clone();
        build.author = author_label(&commit.author.name);
        if !commit.author.email_address.is_empty() {
            build.author_email = Some(commit.author.email_address.clone());
        }
    }

    Ok((repo, build))
}

/// Author names longer than the stored label are cut and marked with `...`.
fn author_label(name: &str) -> String {
    if name.chars().count() <= MAX_AUTHOR_LEN {
        return name.to_string();
    }
    let mut label: String = name.chars().take(MAX_AUTHOR_LEN - 3).collect();
    label.push_str("...");
    label
}
