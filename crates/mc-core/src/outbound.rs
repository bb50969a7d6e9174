//! Outbound work emitted by the core
//!
//! The core never performs external calls itself. It hands jobs to an
//! [`OutboundSink`]; the gateway wires in a worker-pool queue.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Why an agent is being woken
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WakeReason {
    TaskAssigned {
        task_id: String,
        title: String,
        description: String,
        assigner: String,
    },
    Mention {
        message_id: String,
        author_name: String,
        content: String,
    },
}

/// Wake call for one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WakeRequest {
    pub agent_key: String,
    pub agent_name: String,
    /// Notification to flag delivered once the wake lands
    pub notification_id: Option<String>,
    pub reason: WakeReason,
}

/// Who a broadcast is meant for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Team,
    Owner,
}

/// Team channel alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Alert {
    TaskAssigned {
        assigner: String,
        assignees: Vec<String>,
        title: String,
        description: String,
    },
    TaskCompleted {
        title: String,
        agent: String,
    },
    TaskBlocked {
        title: String,
        agent: String,
    },
    OwnerMention {
        author: String,
        content: String,
    },
}

impl Alert {
    pub fn audience(&self) -> Audience {
        match self {
            Self::TaskAssigned { .. } => Audience::Team,
            Self::TaskCompleted { .. } | Self::TaskBlocked { .. } | Self::OwnerMention { .. } => {
                Audience::Owner
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundJob {
    Wake(WakeRequest),
    Broadcast(Alert),
}

impl OutboundJob {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Wake(_) => "wake",
            Self::Broadcast(_) => "broadcast",
        }
    }
}

/// `{success, result|error}` outcome of one outbound call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryOutcome {
    pub fn ok(result: impl Into<String>) -> Self {
        Self {
            success: true,
            result: Some(result.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Destination for outbound jobs
#[async_trait]
pub trait OutboundSink: Send + Sync {
    /// Schedule without waiting; must never block the caller
    fn enqueue(&self, job: OutboundJob);

    /// Run a job and wait for its outcome
    async fn dispatch(&self, job: OutboundJob) -> DeliveryOutcome;
}

/// Sink that drops every job (no outbound channels configured)
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl OutboundSink for NullSink {
    fn enqueue(&self, job: OutboundJob) {
        debug!(job = job.label(), "outbound disabled, dropping job");
    }

    async fn dispatch(&self, job: OutboundJob) -> DeliveryOutcome {
        debug!(job = job.label(), "outbound disabled, dropping job");
        DeliveryOutcome::failed("outbound delivery disabled")
    }
}
