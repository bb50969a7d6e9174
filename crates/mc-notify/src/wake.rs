//! Agent wake calls

use async_trait::async_trait;
use mc_core::{NotifierConfig, WakeReason, WakeRequest};
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use crate::error::{NotifyError, Result};
use crate::format::truncate;

/// Result reported when no wake endpoint exists and agents poll instead
pub const POLLING_MODE: &str = "notification_created_polling_mode";

const SUMMARY_LIMIT: usize = 500;

#[async_trait]
pub trait AgentWaker: Send + Sync {
    /// Wake one agent.
    ///
    /// `Ok(None)` means no call was made and the agent will find the
    /// notification by polling; `Ok(Some(_))` means the endpoint accepted it.
    async fn wake(&self, request: &WakeRequest) -> Result<Option<String>>;
}

/// POSTs a JSON payload to a per-agent URL built from a `{session_key}` template
pub struct HttpWaker {
    client: Client,
    url_template: Option<String>,
}

impl HttpWaker {
    pub fn new(url_template: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url_template: url_template.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn from_config(config: &NotifierConfig) -> Result<Self> {
        Self::new(config.wake_url.clone(), Duration::from_secs(config.timeout_secs))
    }

    fn url_for(&self, session_key: &str) -> Option<String> {
        self.url_template
            .as_ref()
            .map(|template| template.replace("{session_key}", session_key))
    }
}

/// JSON body sent to the wake endpoint
pub fn wake_payload(request: &WakeRequest) -> Value {
    let (reason, summary, instructions) = match &request.reason {
        WakeReason::TaskAssigned {
            task_id,
            title,
            description,
            assigner,
        } => (
            "task_assigned",
            json!({
                "task_id": task_id,
                "title": title,
                "description": truncate(description, SUMMARY_LIMIT),
                "assigned_by": assigner,
            }),
            format!(
                "You have been assigned \"{}\". Check your undelivered notifications, \
                 acknowledge this one and move the task to in_progress when you start.",
                title
            ),
        ),
        WakeReason::Mention {
            message_id,
            author_name,
            content,
        } => (
            "mention",
            json!({
                "message_id": message_id,
                "author": author_name,
                "content": truncate(content, SUMMARY_LIMIT),
            }),
            format!(
                "{} mentioned you in the team chat. Read the message and reply if it needs you.",
                author_name
            ),
        ),
    };

    json!({
        "session_key": request.agent_key,
        "agent_name": request.agent_name,
        "notification_id": request.notification_id,
        "reason": reason,
        "summary": summary,
        "instructions": instructions,
    })
}

#[async_trait]
impl AgentWaker for HttpWaker {
    async fn wake(&self, request: &WakeRequest) -> Result<Option<String>> {
        let Some(url) = self.url_for(&request.agent_key) else {
            return Ok(None);
        };

        debug!(agent = %request.agent_key, url = %url, "waking agent");
        let response = self.client.post(&url).json(&wake_payload(request)).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::WakeRejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(Some(format!("woken via {} ({})", url, status.as_u16())))
    }
}
