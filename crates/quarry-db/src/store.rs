//! [`Store`] over PostgreSQL.

use crate::repositories::{PgBuildRepository, PgRepoRepository, PgSecretRepository};
use async_trait::async_trait;
use quarry_core::Result;
use quarry_core::build::{Build, Job};
use quarry_core::ids::UserId;
use quarry_core::ports::Store;
use quarry_core::repo::{Repo, User};
use quarry_core::secrets::Secret;
use sqlx::PgPool;
use tracing::debug;

pub struct PgStore {
    pub repos: PgRepoRepository,
    pub builds: PgBuildRepository,
    pub secrets: PgSecretRepository,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repos: PgRepoRepository::new(pool.clone()),
            builds: PgBuildRepository::new(pool.clone()),
            secrets: PgSecretRepository::new(pool),
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_repo(&self, owner: &str, name: &str) -> Result<Option<Repo>> {
        self.repos.find_by_name(owner, name).await
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        self.repos.find_user(id).await
    }

    async fn create_build_with_jobs(&self, build: &Build, jobs: &[Job]) -> Result<Build> {
        let stored = self.builds.create_with_jobs(build, jobs).await?;
        debug!(build = %stored.id, number = stored.number, jobs = jobs.len(), "Persisted build");
        Ok(stored)
    }

    async fn find_last_build_before(
        &self,
        repo: &Repo,
        branch: &str,
        build: &Build,
    ) -> Result<Option<Build>> {
        self.builds.last_before(repo, branch, build).await
    }

    async fn resolve_secrets(&self, repo: &Repo) -> Result<Vec<Secret>> {
        self.secrets.resolve(repo).await
    }
}
