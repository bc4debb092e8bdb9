//! HTTP API server for Quarry CI.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{AppState, ReadinessProbe};
