//! In-memory collaborators for driving the pipeline in tests.

#![allow(dead_code)]

use async_trait::async_trait;
use quarry_core::build::{Build, BuildEvent, Job};
use quarry_core::headers::Headers;
use quarry_core::ids::{RepoId, SecretId, UserId};
use quarry_core::ports::{QueuePublisher, RemoteGateway, Store, TriggerPayload};
use quarry_core::repo::{Netrc, Repo, RepoKind, User};
use quarry_core::secrets::{Secret, SecretScope};
use quarry_core::{Error, Result};
use quarry_trigger::{PipelineSettings, TriggerPipeline, TriggerRequest};
use quarry_yaml::YamlConfigParser;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub const REPO_HASH: &str = "7c1e0f3a9b";
pub const LINK: &str = "https://ci.example.com";

#[derive(Default)]
pub struct MemoryStore {
    pub repos: Mutex<Vec<Repo>>,
    pub users: Mutex<Vec<User>>,
    pub builds: Mutex<Vec<Build>>,
    pub jobs: Mutex<Vec<Job>>,
    pub secrets: Mutex<Vec<Secret>>,
    pub fail_repo_lookup: AtomicBool,
    pub fail_persist: AtomicBool,
    pub fail_last_build: AtomicBool,
    pub fail_secrets: AtomicBool,
}

impl MemoryStore {
    pub fn build_count(&self) -> usize {
        self.builds.lock().unwrap().len()
    }

    pub fn jobs_of(&self, build: &Build) -> Vec<Job> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .filter(|j| j.build_id == build.id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_repo(&self, owner: &str, name: &str) -> Result<Option<Repo>> {
        if self.fail_repo_lookup.load(Ordering::SeqCst) {
            return Err(Error::Database("connection refused".to_string()));
        }
        Ok(self
            .repos
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.owner == owner && r.name == name)
            .cloned())
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn create_build_with_jobs(&self, build: &Build, jobs: &[Job]) -> Result<Build> {
        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(Error::Database("transaction aborted".to_string()));
        }
        let mut builds = self.builds.lock().unwrap();
        let mut stored = build.clone();
        stored.number = builds.iter().filter(|b| b.repo_id == build.repo_id).count() as u32 + 1;
        builds.push(stored.clone());
        self.jobs.lock().unwrap().extend_from_slice(jobs);
        Ok(stored)
    }

    async fn find_last_build_before(
        &self,
        repo: &Repo,
        branch: &str,
        build: &Build,
    ) -> Result<Option<Build>> {
        if self.fail_last_build.load(Ordering::SeqCst) {
            return Err(Error::Database("timeout".to_string()));
        }
        Ok(self
            .builds
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.repo_id == repo.id && b.branch == branch && b.number < build.number)
            .max_by_key(|b| b.number)
            .cloned())
    }

    async fn resolve_secrets(&self, _repo: &Repo) -> Result<Vec<Secret>> {
        if self.fail_secrets.load(Ordering::SeqCst) {
            return Err(Error::Database("timeout".to_string()));
        }
        Ok(self.secrets.lock().unwrap().clone())
    }
}

/// Trigger body understood by [`FakeRemote`].
#[derive(Deserialize)]
struct FakeTrigger {
    branch: String,
    event: String,
    commit: String,
}

/// Push hook body understood by [`FakeRemote`].
#[derive(Deserialize)]
struct FakeHook {
    project: String,
    slug: String,
    branch: String,
    commit: String,
}

#[derive(Default)]
pub struct FakeRemote {
    pub files: Mutex<HashMap<String, Vec<u8>>>,
    pub statuses: Mutex<Vec<String>>,
    pub fail_netrc: AtomicBool,
    pub fail_status: AtomicBool,
}

impl FakeRemote {
    pub fn put_file(&self, path: &str, content: impl Into<Vec<u8>>) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.into());
    }

    pub fn status_count(&self) -> usize {
        self.statuses.lock().unwrap().len()
    }
}

#[async_trait]
impl RemoteGateway for FakeRemote {
    fn parse_trigger(&self, payload: &TriggerPayload) -> Result<(Repo, Build)> {
        let trigger: FakeTrigger = serde_json::from_slice(&payload.body)
            .map_err(|e| Error::InvalidTrigger(e.to_string()))?;
        let event = trigger.event.parse().unwrap_or(BuildEvent::Push);
        let repo = repo(&payload.owner, &payload.name, UserId::new());
        Ok((repo, Build::new(event, trigger.branch, trigger.commit)))
    }

    fn parse_hook(&self, body: &[u8]) -> Result<(Repo, Build)> {
        let hook: FakeHook =
            serde_json::from_slice(body).map_err(|e| Error::InvalidTrigger(e.to_string()))?;
        let repo = repo(&hook.project, &hook.slug, UserId::new());
        Ok((repo, Build::new(BuildEvent::Push, hook.branch, hook.commit)))
    }

    async fn fetch_file(
        &self,
        _user: &User,
        _repo: &Repo,
        _build: &Build,
        path: &str,
    ) -> Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::FileNotFound(path.to_string()))
    }

    async fn fetch_netrc(&self, user: &User, _repo: &Repo) -> Result<Netrc> {
        if self.fail_netrc.load(Ordering::SeqCst) {
            return Err(Error::Remote("token expired".to_string()));
        }
        Ok(Netrc {
            machine: "git.example.com".to_string(),
            login: user.login.clone(),
            password: user.token.clone(),
        })
    }

    async fn set_status(&self, _user: &User, _repo: &Repo, _build: &Build, link: &str) -> Result<()> {
        if self.fail_status.load(Ordering::SeqCst) {
            return Err(Error::Remote("502 Bad Gateway".to_string()));
        }
        self.statuses.lock().unwrap().push(link.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Published {
    pub address: String,
    pub payload: Vec<u8>,
    pub headers: Headers,
}

#[derive(Default)]
pub struct RecordingQueue {
    pub published: Mutex<Vec<Published>>,
    /// Zero-based publish calls that fail.
    pub fail_calls: Mutex<Vec<usize>>,
    calls: Mutex<usize>,
}

impl RecordingQueue {
    pub fn published(&self) -> Vec<Published> {
        self.published.lock().unwrap().clone()
    }

    pub fn to(&self, address: &str) -> Vec<Published> {
        self.published()
            .into_iter()
            .filter(|p| p.address == address)
            .collect()
    }

    pub fn fail_call(&self, index: usize) {
        self.fail_calls.lock().unwrap().push(index);
    }
}

#[async_trait]
impl QueuePublisher for RecordingQueue {
    async fn publish(&self, address: &str, payload: Vec<u8>, headers: &Headers) -> Result<()> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let call = *calls;
            *calls += 1;
            call
        };
        if self.fail_calls.lock().unwrap().contains(&call) {
            return Err(Error::Queue("connection closed".to_string()));
        }
        self.published.lock().unwrap().push(Published {
            address: address.to_string(),
            payload,
            headers: headers.clone(),
        });
        Ok(())
    }
}

pub fn repo(owner: &str, name: &str, user_id: UserId) -> Repo {
    Repo {
        id: RepoId::new(),
        user_id,
        owner: owner.to_string(),
        name: name.to_string(),
        full_name: Repo::full_name_of(owner, name),
        default_branch: "main".to_string(),
        kind: RepoKind::Git,
        clone_url: Some(format!("https://git.example.com/scm/{}/{}.git", owner, name)),
        link: None,
        is_private: true,
        is_trusted: false,
        hash: REPO_HASH.to_string(),
    }
}

pub fn secret(name: &str, value: &str) -> Secret {
    Secret {
        id: SecretId::new(),
        name: name.to_string(),
        value: value.to_string(),
        images: vec![],
        events: vec![],
        skip_verify: false,
        scope: SecretScope::Repo,
    }
}

/// A pipeline wired to in-memory collaborators with one registered
/// repository, `octo/hello`.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub remote: Arc<FakeRemote>,
    pub queue: Arc<RecordingQueue>,
    pub repo: Repo,
    pub user: User,
    pub settings: PipelineSettings,
}

impl Harness {
    pub fn new(config: &str) -> Self {
        let user = User {
            id: UserId::new(),
            login: "octocat".to_string(),
            email: Some("octocat@example.com".to_string()),
            avatar: None,
            token: "t0k3n".to_string(),
        };
        let repo = repo("octo", "hello", user.id);

        let store = Arc::new(MemoryStore::default());
        store.repos.lock().unwrap().push(repo.clone());
        store.users.lock().unwrap().push(user.clone());

        let settings = PipelineSettings::default();
        let remote = Arc::new(FakeRemote::default());
        remote.put_file(&settings.config_path, config);

        Self {
            store,
            remote,
            queue: Arc::new(RecordingQueue::default()),
            repo,
            user,
            settings,
        }
    }

    pub fn pipeline(&self) -> TriggerPipeline {
        TriggerPipeline::new(
            self.store.clone(),
            self.remote.clone(),
            Arc::new(YamlConfigParser::new()),
            self.queue.clone(),
            self.settings.clone(),
        )
    }

    pub fn put_signature(&self, document: impl Into<Vec<u8>>) {
        self.remote.put_file(&self.settings.signature_path, document);
    }

    pub fn work_published(&self) -> Vec<Published> {
        self.queue
            .published()
            .into_iter()
            .filter(|p| p.address != self.settings.events_subject)
            .collect()
    }

    pub fn events_published(&self) -> Vec<Published> {
        self.queue.to(&self.settings.events_subject)
    }
}

pub fn request(branch: &str, event: &str) -> TriggerRequest {
    request_for("octo", "hello", branch, event)
}

pub fn request_for(owner: &str, name: &str, branch: &str, event: &str) -> TriggerRequest {
    let body = serde_json::json!({
        "branch": branch,
        "event": event,
        "commit": "9fceb02d0ae598e95dc970b74767f19372d61af8",
    });
    TriggerRequest {
        payload: TriggerPayload::trigger(owner, name, body.to_string().into_bytes()),
        link: LINK.to_string(),
    }
}

/// A push hook naming `project/slug` in its body.
pub fn hook_request(project: &str, slug: &str, branch: &str) -> TriggerRequest {
    let body = serde_json::json!({
        "project": project,
        "slug": slug,
        "branch": branch,
        "commit": "9fceb02d0ae598e95dc970b74767f19372d61af8",
    });
    TriggerRequest {
        payload: TriggerPayload::hook(body.to_string().into_bytes()),
        link: LINK.to_string(),
    }
}

/// Compact HS256 JWS over `payload` keyed with `key`.
pub fn sign(payload: &[u8], key: &str) -> String {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload);
    let input = format!("{}.{}", header, body);
    let signature = jsonwebtoken::crypto::sign(
        input.as_bytes(),
        &jsonwebtoken::EncodingKey::from_secret(key.as_bytes()),
        jsonwebtoken::Algorithm::HS256,
    )
    .unwrap();
    format!("{}.{}", input, signature)
}
