//! Quarry CI Core
//!
//! Domain types, port traits, and error handling shared by every Quarry crate.
//! Nothing in here talks to the network or a database; adapters implement
//! the traits in [`ports`].

pub mod branch;
pub mod build;
pub mod error;
pub mod events;
pub mod headers;
pub mod ids;
pub mod ports;
pub mod repo;
pub mod secrets;
pub mod work;

pub use error::{Error, Result};
pub use ids::*;
