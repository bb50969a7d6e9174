//! Notification records tracked by the delivery tracker

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Mention,
    Assignment,
    TaskUpdate,
    ReviewRequest,
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mention => "mention",
            Self::Assignment => "assignment",
            Self::TaskUpdate => "task_update",
            Self::ReviewRequest => "review_request",
            Self::System => "system",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mention" => Ok(Self::Mention),
            "assignment" => Ok(Self::Assignment),
            "task_update" => Ok(Self::TaskUpdate),
            "review_request" => Ok(Self::ReviewRequest),
            "system" => Ok(Self::System),
            other => Err(Error::Validation(format!("unknown notification type: {}", other))),
        }
    }
}

/// What a notification points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub id: String,
    /// "task" or "message"
    pub kind: String,
}

impl Reference {
    pub fn task(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: "task".to_string(),
        }
    }

    pub fn message(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: "message".to_string(),
        }
    }
}

/// Per-target alert with independent delivered/read/acknowledged flags
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub target_agent_id: String,
    pub from_agent_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub content: String,
    pub reference: Option<Reference>,
    pub read: bool,
    pub delivered: bool,
    pub delivery_attempts: u32,
    pub last_ping_at: Option<DateTime<Utc>>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a notification
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub target_agent_id: String,
    pub from_agent_id: Option<String>,
    pub kind: NotificationKind,
    pub title: String,
    pub content: String,
    pub reference: Option<Reference>,
}

impl NewNotification {
    pub fn new(
        target_agent_id: impl Into<String>,
        kind: NotificationKind,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            target_agent_id: target_agent_id.into(),
            from_agent_id: None,
            kind,
            title: title.into(),
            content: content.into(),
            reference: None,
        }
    }

    pub fn from_agent(mut self, agent_id: Option<String>) -> Self {
        self.from_agent_id = agent_id;
        self
    }

    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }
}
