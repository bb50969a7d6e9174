//! Activity feed

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

use mc_core::model::Activity;

use super::resolve_limit;
use crate::error::Result;
use crate::server::AppState;

const DEFAULT_FEED_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub limit: Option<usize>,
    /// Acting agent's session key
    pub agent: Option<String>,
}

/// Newest first; an unknown agent key yields an empty feed
pub async fn feed(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Vec<Activity>>> {
    let limit = resolve_limit(query.limit, DEFAULT_FEED_LIMIT)?;

    let activities = match query.agent.as_deref() {
        Some(key) => match state.store.agent_by_key(key)? {
            Some(agent) => state.store.recent_activities(limit, Some(&agent.id))?,
            None => Vec::new(),
        },
        None => state.store.recent_activities(limit, None)?,
    };
    Ok(Json(activities))
}
