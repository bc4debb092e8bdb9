//! Commit status callbacks.

use crate::outcome::AdvisoryFailure;
use quarry_core::build::Build;
use quarry_core::ports::RemoteGateway;
use quarry_core::repo::{Repo, User};
use std::sync::Arc;
use tracing::{debug, warn};

/// Posts build status back to the remote provider. Best effort: failures
/// are returned as advisories and never retried.
pub struct StatusReporter {
    remote: Arc<dyn RemoteGateway>,
}

impl StatusReporter {
    pub fn new(remote: Arc<dyn RemoteGateway>) -> Self {
        Self { remote }
    }

    /// URL of a build's page under the server's public `link`.
    pub fn build_link(link: &str, repo: &Repo, build: &Build) -> String {
        format!(
            "{}/{}/{}",
            link.trim_end_matches('/'),
            repo.full_name,
            build.number
        )
    }

    pub async fn report(
        &self,
        user: &User,
        repo: &Repo,
        build: &Build,
        link: &str,
    ) -> Result<(), AdvisoryFailure> {
        let url = Self::build_link(link, repo, build);
        match self.remote.set_status(user, repo, build, &url).await {
            Ok(()) => {
                debug!(repo = %repo.full_name, build = build.number, "Posted commit status");
                Ok(())
            }
            Err(e) => {
                warn!(
                    repo = %repo.full_name,
                    build = build.number,
                    error = %e,
                    "Failed to post commit status"
                );
                Err(AdvisoryFailure::StatusCallback(e.to_string()))
            }
        }
    }
}
