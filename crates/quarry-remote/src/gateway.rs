//! [`RemoteGateway`] over the Bitbucket Server REST API.

use crate::config::BitbucketConfig;
use crate::status::BuildStatusBody;
use crate::{hook, trigger};
use async_trait::async_trait;
use quarry_core::build::Build;
use quarry_core::ports::{RemoteGateway, TriggerPayload};
use quarry_core::repo::{Netrc, Repo, User};
use quarry_core::{Error, Result};
use reqwest::{Client, StatusCode};
use tracing::debug;

pub struct BitbucketServerGateway {
    client: Client,
    config: BitbucketConfig,
}

impl BitbucketServerGateway {
    pub fn new(config: BitbucketConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .danger_accept_invalid_certs(config.skip_verify)
            .build()
            .map_err(|e| Error::Remote(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &BitbucketConfig {
        &self.config
    }

    fn raw_url(&self, repo: &Repo, path: &str) -> String {
        format!(
            "{}/rest/api/1.0/projects/{}/repos/{}/raw/{}",
            self.config.base(),
            repo.owner,
            repo.name,
            path.trim_start_matches('/')
        )
    }

    fn status_url(&self, build: &Build) -> String {
        format!(
            "{}/rest/build-status/1.0/commits/{}",
            self.config.base(),
            build.commit
        )
    }
}

#[async_trait]
impl RemoteGateway for BitbucketServerGateway {
    fn parse_trigger(&self, payload: &TriggerPayload) -> Result<(Repo, Build)> {
        trigger::parse(
            self.config.base(),
            &payload.owner,
            &payload.name,
            &payload.body,
        )
    }

    fn parse_hook(&self, body: &[u8]) -> Result<(Repo, Build)> {
        hook::parse(self.config.base(), body)
    }

    async fn fetch_file(
        &self,
        user: &User,
        repo: &Repo,
        build: &Build,
        path: &str,
    ) -> Result<Vec<u8>> {
        let url = self.raw_url(repo, path);
        debug!(%url, commit = %build.commit, "Fetching file");

        let res = self
            .client
            .get(&url)
            .query(&[("at", build.commit.as_str())])
            .bearer_auth(&user.token)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        match res.status() {
            StatusCode::NOT_FOUND => Err(Error::FileNotFound(format!(
                "{} at {}",
                path, build.commit
            ))),
            s if s.is_success() => {
                let bytes = res.bytes().await.map_err(|e| Error::Network(e.to_string()))?;
                Ok(bytes.to_vec())
            }
            s => Err(Error::Remote(format!("Fetching {} returned {}", path, s))),
        }
    }

    async fn fetch_netrc(&self, user: &User, _repo: &Repo) -> Result<Netrc> {
        let base = url::Url::parse(self.config.base())
            .map_err(|e| Error::Remote(format!("Invalid base URL: {}", e)))?;
        let machine = base
            .host_str()
            .ok_or_else(|| Error::Remote("Base URL has no host".to_string()))?;

        Ok(Netrc {
            machine: machine.to_string(),
            login: user.login.clone(),
            password: user.token.clone(),
        })
    }

    async fn set_status(&self, user: &User, repo: &Repo, build: &Build, link: &str) -> Result<()> {
        let body = BuildStatusBody::new(
            &self.config.status_key,
            &self.config.status_name,
            build,
            link,
        );
        debug!(repo = %repo.full_name, state = body.state, "Posting build status");

        let res = self
            .client
            .post(self.status_url(build))
            .bearer_auth(&user.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if res.status().is_success() {
            Ok(())
        } else {
            Err(Error::Remote(format!(
                "Build status for {} returned {}",
                build.commit,
                res.status()
            )))
        }
    }
}
