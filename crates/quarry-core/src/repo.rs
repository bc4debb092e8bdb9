//! Repository and account types.

use crate::ids::{RepoId, UserId};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A source repository known to Quarry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Repo {
    pub id: RepoId,
    /// Account that activated the repository; its credentials are used to
    /// talk to the remote on the repository's behalf.
    pub user_id: UserId,
    pub owner: String,
    pub name: String,
    /// `owner/name`.
    pub full_name: String,
    pub default_branch: String,
    pub kind: RepoKind,
    #[serde(default)]
    pub clone_url: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub is_trusted: bool,
    /// Per-repository secret used to sign and verify the build configuration.
    #[serde(skip_serializing, default)]
    pub hash: String,
}

impl Repo {
    pub fn full_name_of(owner: &str, name: &str) -> String {
        format!("{}/{}", owner, name)
    }
}

/// Version-control system backing a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RepoKind {
    Git,
    Hg,
}

impl RepoKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoKind::Git => "git",
            RepoKind::Hg => "hg",
        }
    }
}

impl std::str::FromStr for RepoKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "git" => Ok(RepoKind::Git),
            "hg" => Ok(RepoKind::Hg),
            other => Err(format!("unknown repository kind: {}", other)),
        }
    }
}

/// A user account linked to a remote provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct User {
    pub id: UserId,
    pub login: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    /// Remote access token. Never serialized into messages.
    #[serde(skip_serializing, default)]
    pub token: String,
}

/// Machine credentials handed to executors for cloning.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Netrc {
    pub machine: String,
    pub login: String,
    pub password: String,
}

impl std::fmt::Debug for Netrc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Netrc")
            .field("machine", &self.machine)
            .field("login", &self.login)
            .field("password", &"***")
            .finish()
    }
}
