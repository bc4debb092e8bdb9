//! Bitbucket Server remote gateway for Quarry CI.

pub mod config;
mod gateway;
pub mod hook;
pub mod status;
pub mod trigger;

pub use config::BitbucketConfig;
pub use gateway::BitbucketServerGateway;
