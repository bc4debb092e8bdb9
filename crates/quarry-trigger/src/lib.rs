//! Build trigger pipeline for Quarry CI.
//!
//! A trigger is admitted (repository and owner resolved, configuration
//! fetched, matrix expanded, branch rules and signature checked), persisted
//! atomically as a build with its jobs, and then dispatched: a commit
//! status callback, an enqueue event and one work message per job.

pub mod branch;
pub mod dispatch;
pub mod outcome;
pub mod pipeline;
pub mod settings;
pub mod signature;
pub mod status;

pub use dispatch::Dispatcher;
pub use outcome::{
    Accepted, Admission, AdmissionError, AdvisoryFailure, BodyStyle, DispatchReport, ErrorKind,
    FailureCategory,
};
pub use pipeline::{TriggerOutcome, TriggerPipeline, TriggerRequest};
pub use settings::PipelineSettings;
pub use signature::{SignatureCheck, SignatureVerifier};
pub use status::StatusReporter;
