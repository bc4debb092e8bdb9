//! PostgreSQL access to repositories and their owners.

use quarry_core::ids::{RepoId, UserId};
use quarry_core::repo::{Repo, User};
use quarry_core::{Error, Result};
use sqlx::{PgPool, Row};

const REPO_COLUMNS: &str = "id, user_id, owner, name, full_name, default_branch, kind, clone_url, link, is_private, is_trusted, hash";

pub struct PgRepoRepository {
    pool: PgPool,
}

impl PgRepoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_repo(r: &sqlx::postgres::PgRow) -> Result<Repo> {
        let kind: String = r.get("kind");
        Ok(Repo {
            id: RepoId::from_uuid(r.get::<uuid::Uuid, _>("id")),
            user_id: UserId::from_uuid(r.get::<uuid::Uuid, _>("user_id")),
            owner: r.get("owner"),
            name: r.get("name"),
            full_name: r.get("full_name"),
            default_branch: r.get("default_branch"),
            kind: kind.parse().map_err(Error::Database)?,
            clone_url: r.get("clone_url"),
            link: r.get("link"),
            is_private: r.get("is_private"),
            is_trusted: r.get("is_trusted"),
            hash: r.get("hash"),
        })
    }

    pub async fn find_by_name(&self, owner: &str, name: &str) -> Result<Option<Repo>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM repos WHERE owner = $1 AND name = $2",
            REPO_COLUMNS
        ))
        .bind(owner)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        row.as_ref().map(Self::row_to_repo).transpose()
    }

    pub async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, login, email, avatar, token FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(row.map(|r| User {
            id: UserId::from_uuid(r.get::<uuid::Uuid, _>("id")),
            login: r.get("login"),
            email: r.get("email"),
            avatar: r.get("avatar"),
            token: r.get("token"),
        }))
    }

    pub async fn create_user(&self, user: &User) -> Result<()> {
        sqlx::query("INSERT INTO users (id, login, email, avatar, token) VALUES ($1, $2, $3, $4, $5)")
            .bind(user.id.as_uuid())
            .bind(&user.login)
            .bind(&user.email)
            .bind(&user.avatar)
            .bind(&user.token)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    /// Register a repository. Its build counter starts at zero.
    pub async fn create_repo(&self, repo: &Repo) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO repos (id, user_id, owner, name, full_name, default_branch, kind, clone_url, link, is_private, is_trusted, hash)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"#,
        )
        .bind(repo.id.as_uuid())
        .bind(repo.user_id.as_uuid())
        .bind(&repo.owner)
        .bind(&repo.name)
        .bind(&repo.full_name)
        .bind(&repo.default_branch)
        .bind(repo.kind.as_str())
        .bind(&repo.clone_url)
        .bind(&repo.link)
        .bind(repo.is_private)
        .bind(repo.is_trusted)
        .bind(&repo.hash)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }
}
