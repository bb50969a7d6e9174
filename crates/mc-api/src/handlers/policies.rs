//! Policy endpoints

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use mc_core::model::{Policy, PolicyValue};

use crate::error::Result;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct SetPolicyRequest {
    pub value: serde_json::Value,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RemoveResponse {
    pub removed: bool,
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Policy>>> {
    Ok(Json(state.store.list_policies()?))
}

/// `null` when no policy of that name exists
pub async fn get(State(state): State<AppState>, Path(name): Path<String>) -> Result<Json<Option<Policy>>> {
    Ok(Json(state.store.policy(&name)?))
}

pub async fn set(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<SetPolicyRequest>,
) -> Result<Json<Policy>> {
    let value = PolicyValue::decode(&name, req.value)?;
    let policy = state
        .store
        .upsert_policy(&name, &value, req.description.as_deref(), Utc::now())?;
    info!(policy = %name, "policy updated");
    Ok(Json(policy))
}

pub async fn remove(State(state): State<AppState>, Path(name): Path<String>) -> Result<Json<RemoveResponse>> {
    let removed = state.store.delete_policy(&name)?;
    if removed {
        info!(policy = %name, "policy removed");
    }
    Ok(Json(RemoveResponse { removed }))
}
