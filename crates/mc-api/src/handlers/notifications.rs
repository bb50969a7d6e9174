//! Notification delivery endpoints

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use mc_core::model::Notification;

use crate::error::Result;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct UndeliveredQuery {
    /// Agent session key
    pub agent: Option<String>,
}

pub async fn undelivered(
    State(state): State<AppState>,
    Query(query): Query<UndeliveredQuery>,
) -> Result<Json<Vec<Notification>>> {
    let pending = match query.agent.as_deref() {
        Some(key) => match state.store.agent_by_key(key)? {
            Some(agent) => state.notifications.list_undelivered(Some(&agent.id))?,
            None => Vec::new(),
        },
        None => state.notifications.list_undelivered(None)?,
    };
    Ok(Json(pending))
}

/// `null` for an unknown id; the attempt is ignored rather than rejected
pub async fn record_delivery_attempt(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Option<Notification>>> {
    Ok(Json(state.notifications.record_delivery_attempt(&id)?))
}

pub async fn acknowledge(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Notification>> {
    Ok(Json(state.notifications.acknowledge(&id)?))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Notification>> {
    Ok(Json(state.notifications.mark_read(&id)?))
}
