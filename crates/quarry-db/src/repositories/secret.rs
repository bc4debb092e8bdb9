//! PostgreSQL access to repository and team secrets.

use quarry_core::build::BuildEvent;
use quarry_core::ids::SecretId;
use quarry_core::repo::Repo;
use quarry_core::secrets::{Secret, SecretScope};
use quarry_core::{Error, Result};
use sqlx::{PgPool, Row};
use std::collections::BTreeMap;

pub struct PgSecretRepository {
    pool: PgPool,
}

impl PgSecretRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_secret(r: &sqlx::postgres::PgRow, scope: SecretScope) -> Result<Secret> {
        let images: Vec<String> = serde_json::from_value(r.get("images"))
            .map_err(|e| Error::Serialization(e.to_string()))?;
        let events: Vec<BuildEvent> = serde_json::from_value(r.get("events"))
            .map_err(|e| Error::Serialization(e.to_string()))?;

        Ok(Secret {
            id: SecretId::from_uuid(r.get::<uuid::Uuid, _>("id")),
            name: r.get("name"),
            value: r.get("value"),
            images,
            events,
            skip_verify: r.get("skip_verify"),
            scope,
        })
    }

    pub async fn repo_secrets(&self, repo: &Repo) -> Result<Vec<Secret>> {
        let rows = sqlx::query(
            "SELECT id, name, value, images, events, skip_verify FROM secrets WHERE repo_id = $1 ORDER BY name",
        )
        .bind(repo.id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        rows.iter()
            .map(|r| Self::row_to_secret(r, SecretScope::Repo))
            .collect()
    }

    pub async fn team_secrets(&self, team: &str) -> Result<Vec<Secret>> {
        let rows = sqlx::query(
            "SELECT id, name, value, images, events, skip_verify FROM team_secrets WHERE team = $1 ORDER BY name",
        )
        .bind(team)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        rows.iter()
            .map(|r| Self::row_to_secret(r, SecretScope::Team))
            .collect()
    }

    /// Team secrets of the repository owner merged with the repository's own
    /// secrets. A repository secret replaces a team secret of the same name.
    pub async fn resolve(&self, repo: &Repo) -> Result<Vec<Secret>> {
        let team = self.team_secrets(&repo.owner).await?;
        let own = self.repo_secrets(repo).await?;
        Ok(merge(team, own))
    }

    pub async fn create(&self, repo: &Repo, secret: &Secret) -> Result<()> {
        let images =
            serde_json::to_value(&secret.images).map_err(|e| Error::Serialization(e.to_string()))?;
        let events =
            serde_json::to_value(&secret.events).map_err(|e| Error::Serialization(e.to_string()))?;

        let query = match secret.scope {
            SecretScope::Repo => {
                "INSERT INTO secrets (id, repo_id, name, value, images, events, skip_verify) VALUES ($1, $2, $3, $4, $5, $6, $7)"
            }
            SecretScope::Team => {
                "INSERT INTO team_secrets (id, team, name, value, images, events, skip_verify) VALUES ($1, $2, $3, $4, $5, $6, $7)"
            }
        };

        let q = sqlx::query(query).bind(secret.id.as_uuid());
        let q = match secret.scope {
            SecretScope::Repo => q.bind(*repo.id.as_uuid()),
            SecretScope::Team => q.bind(repo.owner.clone()),
        };
        q.bind(&secret.name)
            .bind(&secret.value)
            .bind(&images)
            .bind(&events)
            .bind(secret.skip_verify)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }
}

fn merge(team: Vec<Secret>, own: Vec<Secret>) -> Vec<Secret> {
    let mut merged = BTreeMap::new();
    for secret in team.into_iter().chain(own) {
        merged.insert(secret.name.clone(), secret);
    }
    merged.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(name: &str, value: &str, scope: SecretScope) -> Secret {
        Secret {
            id: SecretId::new(),
            name: name.to_string(),
            value: value.to_string(),
            images: vec![],
            events: vec![],
            skip_verify: false,
            scope,
        }
    }

    #[test]
    fn test_repo_secret_overrides_team_secret() {
        let team = vec![
            secret("DOCKER_PASSWORD", "team", SecretScope::Team),
            secret("NPM_TOKEN", "team", SecretScope::Team),
        ];
        let own = vec![secret("DOCKER_PASSWORD", "repo", SecretScope::Repo)];

        let merged = merge(team, own);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].name, "DOCKER_PASSWORD");
        assert_eq!(merged[0].value, "repo");
        assert_eq!(merged[0].scope, SecretScope::Repo);
        assert_eq!(merged[1].value, "team");
    }
}
