//! Agent identity and status

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{Error, Result};

/// Agent availability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Idle,
    Active,
    Blocked,
    Offline,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Blocked => "blocked",
            Self::Offline => "offline",
        }
    }
}

impl FromStr for AgentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "idle" => Ok(Self::Idle),
            "active" => Ok(Self::Active),
            "blocked" => Ok(Self::Blocked),
            "offline" => Ok(Self::Offline),
            other => Err(Error::Validation(format!("unknown agent status: {}", other))),
        }
    }
}

/// A registered worker identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    /// Unique routing key (e.g. "ksiegowy")
    pub session_key: String,
    pub name: String,
    pub emoji: Option<String>,
    pub role: String,
    pub description: Option<String>,
    pub status: AgentStatus,
    pub current_task_id: Option<String>,
    pub last_seen_at: DateTime<Utc>,
}

/// Input for provisioning a new agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAgent {
    pub session_key: String,
    pub name: String,
    #[serde(default)]
    pub emoji: Option<String>,
    pub role: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewAgent {
    pub fn validate(&self) -> Result<()> {
        if self.session_key.trim().is_empty() {
            return Err(Error::Validation("session_key must not be empty".to_string()));
        }
        if self.session_key.chars().any(char::is_whitespace) {
            return Err(Error::Validation("session_key must not contain whitespace".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(Error::Validation("name must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Partial update of an agent's display metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub emoji: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl AgentPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.emoji.is_none() && self.role.is_none() && self.description.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::Validation("patch has no fields".to_string()));
        }
        if matches!(&self.name, Some(name) if name.trim().is_empty()) {
            return Err(Error::Validation("name must not be empty".to_string()));
        }
        if matches!(&self.role, Some(role) if role.trim().is_empty()) {
            return Err(Error::Validation("role must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn apply(&self, agent: &mut Agent) {
        if let Some(name) = &self.name {
            agent.name = name.clone();
        }
        if let Some(emoji) = &self.emoji {
            agent.emoji = Some(emoji.clone());
        }
        if let Some(role) = &self.role {
            agent.role = role.clone();
        }
        if let Some(description) = &self.description {
            agent.description = Some(description.clone());
        }
    }
}
