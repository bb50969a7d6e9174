//! mc-api: HTTP API for Mission Control
//!
//! Exposes the router, task, notification, agent and policy operations
//! as JSON endpoints, plus the inbound chat webhook.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;

pub use error::{ApiError, Result};
pub use routes::routes;
pub use server::{AppState, build_app, start_server};
