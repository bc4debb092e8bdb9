//! Repository implementations.

mod build;
mod repo;
mod secret;

pub use build::PgBuildRepository;
pub use repo::PgRepoRepository;
pub use secret::PgSecretRepository;
