//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the trigger pipeline and the
//! adapters that talk to the outside world. The pipeline receives them as
//! constructor arguments; nothing here is global.

use crate::{Error, Result};
use crate::branch::BranchFilter;
use crate::build::{Axis, Build, BuildEvent, Job};
use crate::headers::Headers;
use crate::ids::UserId;
use crate::repo::{Netrc, Repo, User};
use crate::secrets::Secret;
use async_trait::async_trait;

/// How an inbound payload reached the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TriggerSource {
    /// Explicit trigger addressed to `owner/name` by URL.
    #[default]
    Trigger,
    /// Provider push webhook; the repository is named inside the body.
    Hook,
}

/// An inbound trigger as received from the HTTP layer.
#[derive(Debug, Clone)]
pub struct TriggerPayload {
    pub source: TriggerSource,
    /// Empty for hooks until the body is parsed.
    pub owner: String,
    pub name: String,
    pub body: Vec<u8>,
}

impl TriggerPayload {
    pub fn trigger(owner: impl Into<String>, name: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            source: TriggerSource::Trigger,
            owner: owner.into(),
            name: name.into(),
            body,
        }
    }

    pub fn hook(body: Vec<u8>) -> Self {
        Self {
            source: TriggerSource::Hook,
            owner: String::new(),
            name: String::new(),
            body,
        }
    }
}

/// Source-control provider.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Translate a provider-specific trigger payload into a canonical
    /// repository and build.
    fn parse_trigger(&self, payload: &TriggerPayload) -> Result<(Repo, Build)>;

    /// Translate a provider push webhook. The returned repository carries
    /// the owner and name the hook refers to.
    fn parse_hook(&self, _body: &[u8]) -> Result<(Repo, Build)> {
        Err(Error::InvalidTrigger(
            "push hooks are not supported by this remote".to_string(),
        ))
    }

    /// Fetch a file from the repository at the build's commit.
    async fn fetch_file(&self, user: &User, repo: &Repo, build: &Build, path: &str)
    -> Result<Vec<u8>>;

    /// Generate clone credentials for the repository.
    async fn fetch_netrc(&self, user: &User, repo: &Repo) -> Result<Netrc>;

    /// Post a commit status pointing at `link`.
    async fn set_status(&self, user: &User, repo: &Repo, build: &Build, link: &str)
    -> Result<()>;
}

/// Durable storage.
#[async_trait]
pub trait Store: Send + Sync {
    /// Find a repository by owner and name.
    async fn find_repo(&self, owner: &str, name: &str) -> Result<Option<Repo>>;

    /// Find a user by ID.
    async fn find_user(&self, id: UserId) -> Result<Option<User>>;

    /// Atomically persist a build and all of its jobs. Returns the build as
    /// stored, with its sequence number assigned. Either every row is
    /// written or none is.
    async fn create_build_with_jobs(&self, build: &Build, jobs: &[Job]) -> Result<Build>;

    /// Most recent build on `branch` created before `build`.
    async fn find_last_build_before(
        &self,
        repo: &Repo,
        branch: &str,
        build: &Build,
    ) -> Result<Option<Build>>;

    /// Repository and team secrets merged, repository entries winning.
    async fn resolve_secrets(&self, repo: &Repo) -> Result<Vec<Secret>>;
}

/// Build configuration parser.
pub trait ConfigParser: Send + Sync {
    /// Expand the build matrix into ordered axes. Empty when no matrix is
    /// declared.
    fn expand_matrix(&self, raw: &[u8]) -> Result<Vec<Axis>>;

    /// Branch restrictions. Never fails; malformed rules are unrestricted.
    fn parse_branch_rules(&self, raw: &[u8]) -> BranchFilter;

    /// Declared platform, or `default` when none is declared.
    fn resolve_platform(&self, raw: &[u8], default: &str) -> String;

    /// Arbitrary labels, in declared order.
    fn resolve_labels(&self, raw: &[u8]) -> Headers;

    /// Queue override declared for `event`, if any.
    fn resolve_queue(&self, raw: &[u8], event: BuildEvent) -> Option<String>;
}

/// Message queue.
#[async_trait]
pub trait QueuePublisher: Send + Sync {
    /// Publish `payload` to `address` with `headers` as routing metadata.
    /// Fire-and-forget: no delivery acknowledgement is awaited.
    async fn publish(&self, address: &str, payload: Vec<u8>, headers: &Headers) -> Result<()>;
}
