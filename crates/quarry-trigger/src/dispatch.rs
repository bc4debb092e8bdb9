//! Dispatch fan-out: one event notification plus one work message per job.

use crate::outcome::{Accepted, AdvisoryFailure, DispatchReport};
use crate::settings::PipelineSettings;
use quarry_core::build::{Build, BuildEvent};
use quarry_core::events::Event;
use quarry_core::headers::Headers;
use quarry_core::ports::{ConfigParser, QueuePublisher};
use quarry_core::repo::Repo;
use quarry_core::secrets::Secret;
use quarry_core::work::{System, Work};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Work header carrying the target platform.
pub const PLATFORM_HEADER: &str = "platform";
/// Event header carrying the repository full name.
pub const REPO_HEADER: &str = "repo";
/// Event header carrying the repository privacy flag.
pub const PRIVATE_HEADER: &str = "private";

/// Publishes persisted builds onto the message queue.
pub struct Dispatcher {
    queue: Arc<dyn QueuePublisher>,
    parser: Arc<dyn ConfigParser>,
    settings: PipelineSettings,
}

impl Dispatcher {
    pub fn new(
        queue: Arc<dyn QueuePublisher>,
        parser: Arc<dyn ConfigParser>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            queue,
            parser,
            settings,
        }
    }

    /// Queue a job of this configuration and event is sent to.
    ///
    /// Deployments go to the queue declared under `deploy.queue`, falling
    /// back to the configured deploy queue. Everything else goes to the work
    /// queue. Never fails.
    pub fn queue_address(&self, raw: &[u8], event: BuildEvent) -> String {
        match event {
            BuildEvent::Deployment => self
                .parser
                .resolve_queue(raw, event)
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty())
                .unwrap_or_else(|| self.settings.deploy_queue.clone()),
            _ => self.settings.work_queue.clone(),
        }
    }

    /// Routing headers for work messages: the platform first, then labels
    /// in declared order. A label cannot override the platform.
    pub fn work_headers(&self, raw: &[u8]) -> Headers {
        let mut platform = self
            .parser
            .resolve_platform(raw, &self.settings.default_platform);
        if platform.trim().is_empty() {
            platform = self.settings.default_platform.clone();
        }

        let mut headers = Headers::new().with(PLATFORM_HEADER, platform);
        for (key, value) in self.parser.resolve_labels(raw).iter() {
            if key == PLATFORM_HEADER {
                debug!(label = %value, "Ignoring platform label; the platform header takes precedence");
                continue;
            }
            headers.insert(key, value);
        }
        headers
    }

    /// Routing headers for event notifications.
    pub fn event_headers(repo: &Repo) -> Headers {
        Headers::new()
            .with(REPO_HEADER, repo.full_name.clone())
            .with(PRIVATE_HEADER, repo.is_private.to_string())
    }

    /// Announce that `build` was enqueued.
    pub async fn publish_event(&self, repo: &Repo, build: &Build) -> Result<(), AdvisoryFailure> {
        let event = Event::enqueued(repo.clone(), build.clone());
        let payload =
            serde_json::to_vec(&event).map_err(|e| AdvisoryFailure::Encode(e.to_string()))?;

        self.queue
            .publish(
                &self.settings.events_subject,
                payload,
                &Self::event_headers(repo),
            )
            .await
            .map_err(|e| AdvisoryFailure::EventPublish(e.to_string()))
    }

    /// Publish the enqueue event and every job's work message. Jobs are
    /// published in ascending number order; a failed job does not stop the
    /// ones after it.
    pub async fn fan_out(
        &self,
        accepted: &Accepted,
        build_last: Option<Build>,
        secrets: Vec<Secret>,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        let repo = &accepted.repo;
        let build = &accepted.build;

        match self.publish_event(repo, build).await {
            Ok(()) => report.event_published = true,
            Err(e) => {
                warn!(repo = %repo.full_name, build = build.number, error = %e, "Failed to publish event");
                report.advisories.push(e);
            }
        }

        let address = self.queue_address(&accepted.raw, build.event);
        let headers = self.work_headers(&accepted.raw);
        let yaml = String::from_utf8_lossy(&accepted.raw).into_owned();

        let mut jobs: Vec<_> = accepted.jobs.iter().collect();
        jobs.sort_by_key(|job| job.number);

        for job in jobs {
            let work = Work {
                signed: build.signed,
                verified: build.verified,
                user: accepted.user.clone(),
                repo: repo.clone(),
                build: build.clone(),
                build_last: build_last.clone(),
                job: job.clone(),
                netrc: accepted.netrc.clone(),
                yaml: yaml.clone(),
                secrets: secrets.clone(),
                system: System {
                    link: accepted.link.clone(),
                },
            };

            let published = match serde_json::to_vec(&work) {
                Ok(payload) => self
                    .queue
                    .publish(&address, payload, &headers)
                    .await
                    .map_err(|e| AdvisoryFailure::WorkPublish {
                        job_number: job.number,
                        message: e.to_string(),
                    }),
                Err(e) => Err(AdvisoryFailure::Encode(e.to_string())),
            };

            match published {
                Ok(()) => {
                    info!(
                        repo = %repo.full_name,
                        build = build.number,
                        job = job.number,
                        queue = %address,
                        "Enqueued job"
                    );
                    report.jobs_published.push(job.number);
                }
                Err(e) => {
                    warn!(
                        repo = %repo.full_name,
                        build = build.number,
                        job = job.number,
                        queue = %address,
                        error = %e,
                        "Failed to enqueue job"
                    );
                    report.advisories.push(e);
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quarry_core::branch::BranchFilter;
    use quarry_core::build::Axis;
    use quarry_core::ids::{RepoId, UserId};
    use quarry_core::repo::RepoKind;

    /// Parser returning fixed answers regardless of input.
    #[derive(Default)]
    struct StaticParser {
        platform: Option<String>,
        labels: Headers,
        deploy_queue: Option<String>,
    }

    impl ConfigParser for StaticParser {
        fn expand_matrix(&self, _raw: &[u8]) -> quarry_core::Result<Vec<Axis>> {
            Ok(Vec::new())
        }

        fn parse_branch_rules(&self, _raw: &[u8]) -> BranchFilter {
            BranchFilter::unrestricted()
        }

        fn resolve_platform(&self, _raw: &[u8], default: &str) -> String {
            self.platform.clone().unwrap_or_else(|| default.to_string())
        }

        fn resolve_labels(&self, _raw: &[u8]) -> Headers {
            self.labels.clone()
        }

        fn resolve_queue(&self, _raw: &[u8], event: BuildEvent) -> Option<String> {
            match event {
                BuildEvent::Deployment => self.deploy_queue.clone(),
                _ => None,
            }
        }
    }

    struct NullQueue;

    #[async_trait]
    impl QueuePublisher for NullQueue {
        async fn publish(
            &self,
            _address: &str,
            _payload: Vec<u8>,
            _headers: &Headers,
        ) -> quarry_core::Result<()> {
            Ok(())
        }
    }

    fn dispatcher(parser: StaticParser) -> Dispatcher {
        Dispatcher::new(
            Arc::new(NullQueue),
            Arc::new(parser),
            PipelineSettings::default(),
        )
    }

    #[test]
    fn test_queue_address_defaults() {
        let d = dispatcher(StaticParser::default());
        assert_eq!(d.queue_address(b"", BuildEvent::Push), "builds.pending");
        assert_eq!(d.queue_address(b"", BuildEvent::Tag), "builds.pending");
        assert_eq!(d.queue_address(b"", BuildEvent::Deployment), "builds.deploy");
    }

    #[test]
    fn test_queue_address_deploy_override() {
        let d = dispatcher(StaticParser {
            deploy_queue: Some("deploy.prod".to_string()),
            ..Default::default()
        });
        assert_eq!(d.queue_address(b"", BuildEvent::Deployment), "deploy.prod");
        assert_eq!(d.queue_address(b"", BuildEvent::Push), "builds.pending");

        let blank = dispatcher(StaticParser {
            deploy_queue: Some("  ".to_string()),
            ..Default::default()
        });
        assert_eq!(blank.queue_address(b"", BuildEvent::Deployment), "builds.deploy");
    }

    #[test]
    fn test_work_headers() {
        let d = dispatcher(StaticParser {
            platform: Some("linux/arm64".to_string()),
            labels: Headers::new().with("foo", "bar").with("platform", "windows"),
            ..Default::default()
        });
        let headers = d.work_headers(b"");
        assert_eq!(headers.get("platform"), Some("linux/arm64"));
        assert_eq!(headers.get("foo"), Some("bar"));
        assert_eq!(headers.len(), 2);

        let d = dispatcher(StaticParser::default());
        assert_eq!(d.work_headers(b"").get("platform"), Some("linux/amd64"));
    }

    /// Log sink for asserting on emitted events.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_platform_label_collision_is_logged() {
        let d = dispatcher(StaticParser {
            labels: Headers::new().with("platform", "windows/amd64"),
            ..Default::default()
        });
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let headers = tracing::subscriber::with_default(subscriber, || d.work_headers(b""));

        assert_eq!(headers.get("platform"), Some("linux/amd64"));
        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Ignoring platform label"));
        assert!(output.contains("windows/amd64"));
    }

    #[test]
    fn test_event_headers() {
        let repo = Repo {
            id: RepoId::new(),
            user_id: UserId::new(),
            owner: "octo".to_string(),
            name: "hello".to_string(),
            full_name: "octo/hello".to_string(),
            default_branch: "main".to_string(),
            kind: RepoKind::Git,
            clone_url: None,
            link: None,
            is_private: true,
            is_trusted: false,
            hash: String::new(),
        };
        let headers = Dispatcher::event_headers(&repo);
        assert_eq!(headers.get("repo"), Some("octo/hello"));
        assert_eq!(headers.get("private"), Some("true"));
    }
}
