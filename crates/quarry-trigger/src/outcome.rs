//! Trigger outcomes and the failure taxonomy.
//!
//! Anything that goes wrong before a build is persisted is an
//! [`AdmissionError`] and reaches the caller. Anything after persistence is
//! an [`AdvisoryFailure`]: logged, collected into reports, never retried.
//! A branch-policy rejection is neither; it is [`Admission::Skipped`].

use quarry_core::build::{Build, Job};
use quarry_core::repo::{Netrc, Repo, User};
use thiserror::Error;

/// Which side of the persistence boundary a failure happened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    Admission,
    Advisory,
}

/// Caller-facing class of an admission failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    Internal,
}

/// How an admission failure is rendered to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyStyle {
    /// Structured error body.
    Json,
    /// Bare text message.
    PlainText,
}

/// Failure that aborts a trigger before anything is persisted.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("Invalid trigger payload. {0}")]
    InvalidTrigger(String),

    #[error("Repository {0} not found")]
    RepoNotFound(String),

    #[error("Failed to find repository owner. {0}")]
    OwnerLookup(String),

    #[error("Failed to fetch build configuration. {0}")]
    ConfigNotFound(String),

    #[error("Failed to parse yaml file or calculate matrix. {0}")]
    ConfigParse(String),

    #[error("Failed to generate netrc file. {0}")]
    Netrc(String),

    #[error("Failed to save build. {0}")]
    Persistence(String),
}

impl AdmissionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdmissionError::InvalidTrigger(_) => ErrorKind::BadRequest,
            AdmissionError::RepoNotFound(_) | AdmissionError::ConfigNotFound(_) => {
                ErrorKind::NotFound
            }
            AdmissionError::OwnerLookup(_)
            | AdmissionError::ConfigParse(_)
            | AdmissionError::Netrc(_)
            | AdmissionError::Persistence(_) => ErrorKind::Internal,
        }
    }

    pub fn body_style(&self) -> BodyStyle {
        match self {
            AdmissionError::ConfigParse(_) | AdmissionError::Netrc(_) => BodyStyle::PlainText,
            _ => BodyStyle::Json,
        }
    }

    pub fn category(&self) -> FailureCategory {
        FailureCategory::Admission
    }
}

/// Failure after persistence. The build exists; delivery is best effort.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdvisoryFailure {
    #[error("Failed to parse signature: {0}")]
    SignatureParse(String),

    #[error("Failed to verify signature: {0}")]
    SignatureVerify(String),

    #[error("Signature payload does not match the build configuration")]
    SignatureMismatch,

    #[error("Failed to post commit status: {0}")]
    StatusCallback(String),

    #[error("Failed to find previous build: {0}")]
    PriorBuildLookup(String),

    #[error("Failed to resolve secrets: {0}")]
    SecretResolution(String),

    #[error("Failed to publish event: {0}")]
    EventPublish(String),

    #[error("Failed to publish job {job_number}: {message}")]
    WorkPublish { job_number: u32, message: String },

    #[error("Failed to encode message: {0}")]
    Encode(String),
}

impl AdvisoryFailure {
    pub fn category(&self) -> FailureCategory {
        FailureCategory::Advisory
    }
}

/// Result of a successful admission.
#[derive(Debug, Clone)]
pub enum Admission {
    /// The build and its jobs are persisted and ready for dispatch.
    Accepted(Box<Accepted>),
    /// Branch rules rejected the trigger. Nothing was persisted.
    Skipped { reason: String },
}

impl Admission {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Admission::Skipped { .. })
    }

    pub fn build(&self) -> Option<&Build> {
        match self {
            Admission::Accepted(accepted) => Some(&accepted.build),
            Admission::Skipped { .. } => None,
        }
    }
}

/// Everything gathered during admission that dispatch needs.
#[derive(Debug, Clone)]
pub struct Accepted {
    pub user: User,
    pub repo: Repo,
    /// The build as persisted, number assigned.
    pub build: Build,
    /// Jobs in ascending number order.
    pub jobs: Vec<Job>,
    /// Raw build configuration bytes.
    pub raw: Vec<u8>,
    pub netrc: Netrc,
    /// Public base URL of the server.
    pub link: String,
    /// Advisory failures recorded during admission (signature problems).
    pub advisories: Vec<AdvisoryFailure>,
}

/// What happened after persistence.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub status_reported: bool,
    pub event_published: bool,
    /// Job numbers whose work message was handed to the queue.
    pub jobs_published: Vec<u32>,
    pub advisories: Vec<AdvisoryFailure>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.advisories.is_empty()
    }
}
