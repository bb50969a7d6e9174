//! Activity feed entry types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::task::TaskStatus;
use crate::{Error, Result};

/// Types of activity events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    // Task events
    TaskCreated,
    TaskUpdated,
    TaskAssigned,
    TaskCompleted,
    TaskDeleted,

    // Agent events
    AgentJoined,
    AgentStatusChanged,

    // Chat events
    Mention,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaskCreated => "task_created",
            Self::TaskUpdated => "task_updated",
            Self::TaskAssigned => "task_assigned",
            Self::TaskCompleted => "task_completed",
            Self::TaskDeleted => "task_deleted",
            Self::AgentJoined => "agent_joined",
            Self::AgentStatusChanged => "agent_status_changed",
            Self::Mention => "mention",
        }
    }
}

impl FromStr for ActivityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "task_created" => Ok(Self::TaskCreated),
            "task_updated" => Ok(Self::TaskUpdated),
            "task_assigned" => Ok(Self::TaskAssigned),
            "task_completed" => Ok(Self::TaskCompleted),
            "task_deleted" => Ok(Self::TaskDeleted),
            "agent_joined" => Ok(Self::AgentJoined),
            "agent_status_changed" => Ok(Self::AgentStatusChanged),
            "mention" => Ok(Self::Mention),
            other => Err(Error::Validation(format!("unknown activity kind: {}", other))),
        }
    }
}

/// Structured payload attached to an activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityDetail {
    Transition {
        from: TaskStatus,
        to: TaskStatus,
        automatic: bool,
    },
    Assignment {
        assignee_ids: Vec<String>,
    },
    Mention {
        message_id: String,
        targets: Vec<String>,
    },
}

/// Target of an activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityTarget {
    pub id: String,
    /// "task", "agent" or "message"
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub kind: ActivityKind,
    /// Agent id of the actor, when an agent acted
    pub agent_id: Option<String>,
    pub message: String,
    pub target: Option<ActivityTarget>,
    pub detail: Option<ActivityDetail>,
    pub created_at: DateTime<Utc>,
}

impl Activity {
    pub fn new(kind: ActivityKind, message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            kind,
            agent_id: None,
            message: message.into(),
            target: None,
            detail: None,
            created_at: Utc::now(),
        }
    }

    pub fn by_agent(mut self, agent_id: Option<String>) -> Self {
        self.agent_id = agent_id;
        self
    }

    pub fn on_task(mut self, task_id: impl Into<String>) -> Self {
        self.target = Some(ActivityTarget {
            id: task_id.into(),
            kind: "task".to_string(),
        });
        self
    }

    pub fn on_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.target = Some(ActivityTarget {
            id: agent_id.into(),
            kind: "agent".to_string(),
        });
        self
    }

    pub fn on_message(mut self, message_id: impl Into<String>) -> Self {
        self.target = Some(ActivityTarget {
            id: message_id.into(),
            kind: "message".to_string(),
        });
        self
    }

    pub fn with_detail(mut self, detail: ActivityDetail) -> Self {
        self.detail = Some(detail);
        self
    }
}
