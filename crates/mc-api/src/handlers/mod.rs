//! HTTP API handlers
//!
//! One submodule per resource; each handler is a thin adapter over the
//! mc-core services held in [`AppState`](crate::server::AppState).

pub mod activities;
pub mod agents;
pub mod chat;
pub mod notifications;
pub mod policies;
pub mod router;
pub mod tasks;

use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};

/// Upper bound for `limit` query parameters
const MAX_LIMIT: usize = 200;

// ============================================================================
// Shared request/response types
// ============================================================================

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

/// `?actor=` for mutations that carry no body
#[derive(Debug, Default, Deserialize)]
pub struct ActorQuery {
    pub actor: Option<String>,
}

// ============================================================================
// Handler functions
// ============================================================================

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "mission-control",
    })
}

fn resolve_limit(limit: Option<usize>, default: usize) -> Result<usize> {
    match limit {
        Some(0) => Err(ApiError::InvalidRequest("limit must be positive".to_string())),
        Some(limit) => Ok(limit.min(MAX_LIMIT)),
        None => Ok(default),
    }
}
