//! Trigger pipeline: admission, persistence and dispatch of builds.

use crate::branch::{self, SKIPPED_BY_BRANCH};
use crate::dispatch::Dispatcher;
use crate::outcome::{Accepted, Admission, AdmissionError, AdvisoryFailure, DispatchReport};
use crate::settings::PipelineSettings;
use crate::signature::SignatureVerifier;
use crate::status::StatusReporter;
use chrono::Utc;
use quarry_core::Error;
use quarry_core::build::{Axis, BuildStatus, Job};
use quarry_core::ports::{
    ConfigParser, QueuePublisher, RemoteGateway, Store, TriggerPayload, TriggerSource,
};
use quarry_core::repo::Repo;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error, info, instrument, warn};

/// An inbound trigger plus the public base URL of this server.
#[derive(Debug, Clone)]
pub struct TriggerRequest {
    pub payload: TriggerPayload,
    /// Base URL executors and status links point back to.
    pub link: String,
}

/// Full result of a trigger that ran to completion.
#[derive(Debug, Clone)]
pub enum TriggerOutcome {
    Skipped { reason: String },
    Enqueued {
        accepted: Box<Accepted>,
        report: DispatchReport,
    },
}

/// Turns triggers into persisted builds and queued work.
pub struct TriggerPipeline {
    store: Arc<dyn Store>,
    remote: Arc<dyn RemoteGateway>,
    parser: Arc<dyn ConfigParser>,
    settings: PipelineSettings,
    verifier: SignatureVerifier,
    status: StatusReporter,
    dispatcher: Dispatcher,
}

impl TriggerPipeline {
    pub fn new(
        store: Arc<dyn Store>,
        remote: Arc<dyn RemoteGateway>,
        parser: Arc<dyn ConfigParser>,
        queue: Arc<dyn QueuePublisher>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            remote: remote.clone(),
            parser: parser.clone(),
            verifier: SignatureVerifier::new(),
            status: StatusReporter::new(remote),
            dispatcher: Dispatcher::new(queue, parser, settings.clone()),
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run a trigger end to end: admit, then dispatch.
    pub async fn handle(&self, request: &TriggerRequest) -> Result<TriggerOutcome, AdmissionError> {
        match self.admit(request).await? {
            Admission::Skipped { reason } => Ok(TriggerOutcome::Skipped { reason }),
            Admission::Accepted(accepted) => {
                let report = self.follow_up(&accepted).await;
                Ok(TriggerOutcome::Enqueued { accepted, report })
            }
        }
    }

    /// Run a trigger on a detached task.
    ///
    /// The receiver resolves once admission is decided. Dispatch continues
    /// on the task whether or not the receiver is still listening, so a
    /// caller that goes away cannot interrupt a trigger half way.
    pub fn spawn(
        self: &Arc<Self>,
        request: TriggerRequest,
    ) -> oneshot::Receiver<Result<Admission, AdmissionError>> {
        let (tx, rx) = oneshot::channel();
        let pipeline = Arc::clone(self);

        tokio::spawn(async move {
            match pipeline.admit(&request).await {
                Ok(Admission::Accepted(accepted)) => {
                    if tx.send(Ok(Admission::Accepted(accepted.clone()))).is_err() {
                        debug!(build = accepted.build.number, "Trigger caller went away");
                    }
                    pipeline.follow_up(&accepted).await;
                }
                other => {
                    let _ = tx.send(other);
                }
            }
        });

        rx
    }

    /// Decide whether a trigger becomes a build, and persist it if so.
    #[instrument(
        skip(self, request),
        fields(
            source = ?request.payload.source,
            owner = %request.payload.owner,
            name = %request.payload.name
        )
    )]
    pub async fn admit(&self, request: &TriggerRequest) -> Result<Admission, AdmissionError> {
        let payload = &request.payload;

        let parsed = match payload.source {
            TriggerSource::Trigger => self.remote.parse_trigger(payload),
            TriggerSource::Hook => self.remote.parse_hook(&payload.body),
        };
        let (target, mut build) = parsed.map_err(|e| {
            warn!(source = ?payload.source, error = %e, "Failed to parse trigger payload");
            AdmissionError::InvalidTrigger(e.to_string())
        })?;

        // Explicit triggers are addressed by URL; hooks name their repository.
        let (owner, name) = match payload.source {
            TriggerSource::Trigger => (payload.owner.as_str(), payload.name.as_str()),
            TriggerSource::Hook => (target.owner.as_str(), target.name.as_str()),
        };
        let full_name = Repo::full_name_of(owner, name);

        let repo = match self.store.find_repo(owner, name).await {
            Ok(Some(repo)) => repo,
            Ok(None) => {
                error!(repo = %full_name, "Repository not found");
                return Err(AdmissionError::RepoNotFound(full_name));
            }
            Err(e) => {
                error!(repo = %full_name, error = %e, "Failed to find repository");
                return Err(AdmissionError::RepoNotFound(full_name));
            }
        };

        let user = match self.store.find_user(repo.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                let e = Error::UserNotFound(repo.user_id.to_string());
                error!(repo = %full_name, error = %e, "Failed to find repository owner");
                return Err(AdmissionError::OwnerLookup(e.to_string()));
            }
            Err(e) => {
                error!(repo = %full_name, error = %e, "Failed to find repository owner");
                return Err(AdmissionError::OwnerLookup(e.to_string()));
            }
        };

        let raw = self
            .remote
            .fetch_file(&user, &repo, &build, &self.settings.config_path)
            .await
            .map_err(|e| {
                warn!(repo = %full_name, commit = %build.commit, error = %e, "Failed to fetch build configuration");
                AdmissionError::ConfigNotFound(e.to_string())
            })?;

        let signature = match self
            .remote
            .fetch_file(&user, &repo, &build, &self.settings.signature_path)
            .await
        {
            Ok(document) => Some(document),
            Err(e) => {
                debug!(repo = %full_name, error = %e, "No signature file");
                None
            }
        };

        let mut axes = self.parser.expand_matrix(&raw).map_err(|e| {
            warn!(repo = %full_name, error = %e, "Failed to parse build configuration");
            AdmissionError::ConfigParse(e.to_string())
        })?;
        if axes.is_empty() {
            axes.push(Axis::new());
        }

        let netrc = self.remote.fetch_netrc(&user, &repo).await.map_err(|e| {
            error!(repo = %full_name, error = %e, "Failed to generate netrc");
            AdmissionError::Netrc(e.to_string())
        })?;

        let filter = self.parser.parse_branch_rules(&raw);
        if !branch::admits(&filter, &build) {
            info!(repo = %full_name, branch = %build.branch, "Branch does not match restrictions, skipping build");
            return Ok(Admission::Skipped {
                reason: SKIPPED_BY_BRANCH.to_string(),
            });
        }

        let verification = self.verifier.verify(signature.as_deref(), &repo.hash, &raw);
        verification.check.apply(&mut build);
        let advisories: Vec<_> = verification.advisory.into_iter().collect();

        build.status = BuildStatus::Pending;
        build.repo_id = repo.id;
        build.enqueued_at = Some(Utc::now());

        let jobs: Vec<Job> = axes
            .into_iter()
            .enumerate()
            .map(|(i, axis)| Job::pending(build.id, i as u32 + 1, axis))
            .collect();

        let build = self
            .store
            .create_build_with_jobs(&build, &jobs)
            .await
            .map_err(|e| {
                error!(repo = %full_name, error = %e, "Failed to save build");
                AdmissionError::Persistence(e.to_string())
            })?;

        info!(
            repo = %full_name,
            build = build.number,
            jobs = jobs.len(),
            signed = build.signed,
            verified = build.verified,
            "Build created"
        );

        Ok(Admission::Accepted(Box::new(Accepted {
            user,
            repo,
            build,
            jobs,
            raw,
            netrc,
            link: request.link.clone(),
            advisories,
        })))
    }

    /// Everything after persistence: status callback, context lookups,
    /// event and work publishing. Never fails; problems are reported.
    #[instrument(skip(self, accepted), fields(repo = %accepted.repo.full_name, build = accepted.build.number))]
    pub async fn follow_up(&self, accepted: &Accepted) -> DispatchReport {
        let Accepted {
            user, repo, build, ..
        } = accepted;
        let mut advisories = accepted.advisories.clone();

        let status_reported = match self.status.report(user, repo, build, &accepted.link).await {
            Ok(()) => true,
            Err(e) => {
                advisories.push(e);
                false
            }
        };

        let build_last = match self
            .store
            .find_last_build_before(repo, &build.branch, build)
            .await
        {
            Ok(last) => last,
            Err(e) => {
                warn!(error = %e, "Failed to find previous build");
                advisories.push(AdvisoryFailure::PriorBuildLookup(e.to_string()));
                None
            }
        };

        let secrets = match self.store.resolve_secrets(repo).await {
            Ok(secrets) => secrets,
            Err(e) => {
                warn!(error = %e, "Failed to resolve secrets");
                advisories.push(AdvisoryFailure::SecretResolution(e.to_string()));
                Vec::new()
            }
        };

        let mut report = self.dispatcher.fan_out(accepted, build_last, secrets).await;
        report.status_reported = status_reported;
        advisories.append(&mut report.advisories);
        report.advisories = advisories;
        report
    }
}
