//! Inbound chat callback

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::debug;

use mc_core::{ChatOutcome, IncomingMessage};

use crate::error::{ApiError, Result};
use crate::server::AppState;

/// Webhook reply: `{ok, targets, reasoning, cost, wakeResults}`
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub outcome: ChatOutcome,
}

pub async fn webhook(
    State(state): State<AppState>,
    Json(message): Json<IncomingMessage>,
) -> Result<Json<WebhookResponse>> {
    debug!(message_id = %message.message_id, author = %message.author_id, "chat webhook");

    if message.message_id.trim().is_empty() {
        return Err(ApiError::InvalidRequest("messageId is required".to_string()));
    }
    if message.author_id.trim().is_empty() {
        return Err(ApiError::InvalidRequest("authorId is required".to_string()));
    }

    let outcome = state.chat.handle(message).await?;
    Ok(Json(WebhookResponse { ok: true, outcome }))
}
