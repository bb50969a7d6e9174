//! Agent endpoints, including per-agent notification views

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use mc_core::model::{Agent, AgentPatch, AgentStatus, NewAgent, Notification};

use crate::error::Result;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
    #[serde(default)]
    pub current_task_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationsQuery {
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub updated: usize,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub count: usize,
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Agent>>> {
    Ok(Json(state.agents.list()?))
}

pub async fn register(
    State(state): State<AppState>,
    Json(new): Json<NewAgent>,
) -> Result<(StatusCode, Json<Agent>)> {
    let agent = state.agents.register(new)?;
    Ok((StatusCode::CREATED, Json(agent)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(patch): Json<AgentPatch>,
) -> Result<Json<Agent>> {
    Ok(Json(state.agents.update(&key, patch)?))
}

pub async fn heartbeat(State(state): State<AppState>, Path(key): Path<String>) -> Result<Json<Agent>> {
    Ok(Json(state.agents.heartbeat(&key)?))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<Agent>> {
    let status: AgentStatus = req.status.parse()?;
    Ok(Json(state.agents.update_status(&key, status, req.current_task_id)?))
}

pub async fn notifications(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<NotificationsQuery>,
) -> Result<Json<Vec<Notification>>> {
    let agent = state.agents.get(&key)?;
    Ok(Json(state.notifications.list_for_agent(&agent.id, query.unread_only)?))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<MarkAllReadResponse>> {
    let agent = state.agents.get(&key)?;
    let updated = state.notifications.mark_all_read(&agent.id)?;
    Ok(Json(MarkAllReadResponse { updated }))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<UnreadCountResponse>> {
    let agent = state.agents.get(&key)?;
    let count = state.notifications.count_unread(&agent.id)?;
    Ok(Json(UnreadCountResponse { count }))
}
