//! PostgreSQL access to builds and jobs.

use quarry_core::build::{Build, Job};
use quarry_core::ids::{BuildId, RepoId};
use quarry_core::repo::Repo;
use quarry_core::{Error, Result};
use sqlx::{PgPool, Row};

const BUILD_COLUMNS: &str = "id, repo_id, number, event, status, branch, commit_sha, git_ref, message, author, author_email, deploy_to, link, signed, verified, created_at, enqueued_at";

pub struct PgBuildRepository {
    pool: PgPool,
}

impl PgBuildRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_build(r: &sqlx::postgres::PgRow) -> Result<Build> {
        let event: String = r.get("event");
        let status: String = r.get("status");
        Ok(Build {
            id: BuildId::from_uuid(r.get::<uuid::Uuid, _>("id")),
            repo_id: RepoId::from_uuid(r.get::<uuid::Uuid, _>("repo_id")),
            number: r.get::<i32, _>("number") as u32,
            event: event.parse().map_err(Error::Database)?,
            status: status.parse().map_err(Error::Database)?,
            branch: r.get("branch"),
            commit: r.get("commit_sha"),
            git_ref: r.get("git_ref"),
            message: r.get("message"),
            author: r.get("author"),
            author_email: r.get("author_email"),
            deploy_to: r.get("deploy_to"),
            link: r.get("link"),
            signed: r.get("signed"),
            verified: r.get("verified"),
            created_at: r.get("created_at"),
            enqueued_at: r.get("enqueued_at"),
        })
    }

    /// Insert a build and its jobs in one transaction.
    ///
    /// The build number comes from the repository's counter, incremented in
    /// the same transaction, so concurrent triggers get distinct numbers.
    pub async fn create_with_jobs(&self, build: &Build, jobs: &[Job]) -> Result<Build> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        let row = sqlx::query(
            "UPDATE repos SET build_counter = build_counter + 1 WHERE id = $1 RETURNING build_counter",
        )
        .bind(build.repo_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        let number = match row {
            Some(r) => r.get::<i32, _>("build_counter") as u32,
            None => return Err(Error::RepoNotFound(build.repo_id.to_string())),
        };

        let mut stored = build.clone();
        stored.number = number;

        sqlx::query(
            r#"INSERT INTO builds (id, repo_id, number, event, status, branch, commit_sha, git_ref, message, author, author_email, deploy_to, link, signed, verified, created_at, enqueued_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)"#,
        )
        .bind(stored.id.as_uuid())
        .bind(stored.repo_id.as_uuid())
        .bind(stored.number as i32)
        .bind(stored.event.as_str())
        .bind(stored.status.as_str())
        .bind(&stored.branch)
        .bind(&stored.commit)
        .bind(&stored.git_ref)
        .bind(&stored.message)
        .bind(&stored.author)
        .bind(&stored.author_email)
        .bind(&stored.deploy_to)
        .bind(&stored.link)
        .bind(stored.signed)
        .bind(stored.verified)
        .bind(stored.created_at)
        .bind(stored.enqueued_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        for job in jobs {
            let environment = serde_json::to_value(&job.environment)
                .map_err(|e| Error::Serialization(e.to_string()))?;

            sqlx::query(
                "INSERT INTO jobs (id, build_id, number, status, environment) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(job.id.as_uuid())
            .bind(job.build_id.as_uuid())
            .bind(job.number as i32)
            .bind(job.status.as_str())
            .bind(&environment)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(stored)
    }

    /// Highest-numbered build on `branch` numbered below `build`.
    pub async fn last_before(&self, repo: &Repo, branch: &str, build: &Build) -> Result<Option<Build>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM builds WHERE repo_id = $1 AND branch = $2 AND number < $3 ORDER BY number DESC LIMIT 1",
            BUILD_COLUMNS
        ))
        .bind(repo.id.as_uuid())
        .bind(branch)
        .bind(build.number as i32)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        row.as_ref().map(Self::row_to_build).transpose()
    }

    pub async fn get(&self, id: BuildId) -> Result<Option<Build>> {
        let row = sqlx::query(&format!("SELECT {} FROM builds WHERE id = $1", BUILD_COLUMNS))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        row.as_ref().map(Self::row_to_build).transpose()
    }

    /// Jobs of a build in number order.
    pub async fn jobs(&self, build_id: BuildId) -> Result<Vec<Job>> {
        let rows = sqlx::query(
            "SELECT id, build_id, number, status, environment FROM jobs WHERE build_id = $1 ORDER BY number",
        )
        .bind(build_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        rows.iter()
            .map(|r| {
                let status: String = r.get("status");
                Ok(Job {
                    id: quarry_core::ids::JobId::from_uuid(r.get::<uuid::Uuid, _>("id")),
                    build_id: BuildId::from_uuid(r.get::<uuid::Uuid, _>("build_id")),
                    number: r.get::<i32, _>("number") as u32,
                    status: status.parse().map_err(Error::Database)?,
                    environment: serde_json::from_value(r.get("environment"))
                        .map_err(|e| Error::Serialization(e.to_string()))?,
                })
            })
            .collect()
    }
}
