//! Named policy configuration
//!
//! Known policy names decode into typed variants; anything else is kept as
//! raw JSON so deployments can store configuration this crate doesn't read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::TaskPriority;
use crate::{Error, Result};

/// Policy name read by the auto-transition evaluator
pub const AUTO_APPROVE: &str = "auto_approve";

/// Gate for automatic inbox → assigned transitions
///
/// A stored value without `enabled` counts as disabled; a missing priority
/// list falls back to low and medium.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoApprovePolicy {
    #[serde(default)]
    pub enabled: bool,
    #[serde(alias = "allowed_priorities", default = "default_allowed_priorities")]
    pub allowed_priorities: Vec<TaskPriority>,
}

fn default_allowed_priorities() -> Vec<TaskPriority> {
    vec![TaskPriority::Low, TaskPriority::Medium]
}

impl Default for AutoApprovePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_priorities: default_allowed_priorities(),
        }
    }
}

impl AutoApprovePolicy {
    pub fn allows(&self, priority: TaskPriority) -> bool {
        self.enabled && self.allowed_priorities.contains(&priority)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PolicyValue {
    AutoApprove(AutoApprovePolicy),
    Other(serde_json::Value),
}

impl PolicyValue {
    /// Decode a raw value according to the policy name
    pub fn decode(name: &str, value: serde_json::Value) -> Result<Self> {
        match name {
            AUTO_APPROVE => serde_json::from_value(value)
                .map(Self::AutoApprove)
                .map_err(|e| Error::Validation(format!("invalid {} policy: {}", AUTO_APPROVE, e))),
            _ => Ok(Self::Other(value)),
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(match self {
            Self::AutoApprove(policy) => serde_json::to_value(policy)?,
            Self::Other(value) => value.clone(),
        })
    }
}

impl Serialize for PolicyValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::AutoApprove(policy) => policy.serialize(serializer),
            Self::Other(value) => value.serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Policy {
    pub name: String,
    pub value: PolicyValue,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
