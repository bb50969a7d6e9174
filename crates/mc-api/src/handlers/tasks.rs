//! Task endpoints

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use mc_core::model::{NewTask, Task, TaskPatch, TaskStatus};
use mc_core::{AutoTransitionOutcome, InboxReport};

use super::ActorQuery;
use crate::error::{ApiError, Result};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    #[serde(flatten)]
    pub patch: TaskPatch,
    #[serde(default)]
    pub actor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
    #[serde(default)]
    pub actor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub assignees: Vec<String>,
    #[serde(default)]
    pub actor: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Task>>> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<TaskStatus>)
        .transpose()?;
    Ok(Json(state.tasks.list(status)?))
}

pub async fn create(
    State(state): State<AppState>,
    Json(new): Json<NewTask>,
) -> Result<(StatusCode, Json<Task>)> {
    let task = state.tasks.create(new)?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn classify_inbox(State(state): State<AppState>) -> Result<Json<InboxReport>> {
    Ok(Json(state.tasks.classify_inbox()?))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Task>> {
    Ok(Json(state.tasks.get(&id)?))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<Task>> {
    Ok(Json(state.tasks.update(&id, req.patch, req.actor.as_deref())?))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ActorQuery>,
) -> Result<StatusCode> {
    state.tasks.delete(&id, query.actor.as_deref())?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<Task>> {
    let status: TaskStatus = req.status.parse()?;
    Ok(Json(state.tasks.update_status(&id, status, req.actor.as_deref())?))
}

pub async fn assign(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AssignRequest>,
) -> Result<Json<Task>> {
    if req.assignees.iter().any(|key| key.trim().is_empty()) {
        return Err(ApiError::InvalidRequest("assignee keys must not be empty".to_string()));
    }
    Ok(Json(state.tasks.assign(&id, &req.assignees, req.actor.as_deref())?))
}

pub async fn auto_transition(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ActorQuery>,
) -> Result<Json<AutoTransitionOutcome>> {
    Ok(Json(state.tasks.auto_transition(&id, query.actor.as_deref())?))
}
