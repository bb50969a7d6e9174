//! Router endpoints: ad-hoc routing, decision audit and spend stats

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use chrono::{Duration, Utc};
use serde::Deserialize;

use mc_core::RouteOutcome;
use mc_core::model::{NewRouterDecision, RouterDecision, RouterStats};

use super::resolve_limit;
use crate::error::{ApiError, Result};
use crate::server::AppState;

const DEFAULT_DECISION_LIMIT: usize = 20;
const DEFAULT_STATS_HOURS: i64 = 24;

#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    pub content: String,
    pub author_id: String,
    #[serde(default)]
    pub mentions: Vec<String>,
    #[serde(default)]
    pub context: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub hours: Option<i64>,
}

/// Route a message without persisting or dispatching anything
pub async fn route(
    State(state): State<AppState>,
    Json(req): Json<RouteRequest>,
) -> Result<Json<RouteOutcome>> {
    let outcome = state
        .chat
        .route_message(&req.content, &req.author_id, &req.mentions, &req.context)
        .await?;
    Ok(Json(outcome))
}

pub async fn record_decision(
    State(state): State<AppState>,
    Json(decision): Json<NewRouterDecision>,
) -> Result<(StatusCode, Json<RouterDecision>)> {
    if decision.message_id.trim().is_empty() {
        return Err(ApiError::InvalidRequest("message_id is required".to_string()));
    }
    if !decision.cost.is_finite() || decision.cost < 0.0 {
        return Err(ApiError::InvalidRequest("cost must be a non-negative number".to_string()));
    }

    let recorded = state.chat.record_decision(decision)?;
    Ok((StatusCode::CREATED, Json(recorded)))
}

pub async fn recent_decisions(
    State(state): State<AppState>,
    Query(query): Query<DecisionsQuery>,
) -> Result<Json<Vec<RouterDecision>>> {
    let limit = resolve_limit(query.limit, DEFAULT_DECISION_LIMIT)?;
    Ok(Json(state.chat.recent_decisions(limit)?))
}

pub async fn stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<RouterStats>> {
    let hours = query.hours.unwrap_or(DEFAULT_STATS_HOURS);
    if hours <= 0 {
        return Err(ApiError::InvalidRequest("hours must be positive".to_string()));
    }

    let since = Utc::now() - Duration::hours(hours);
    Ok(Json(state.chat.stats_since(since)?))
}
