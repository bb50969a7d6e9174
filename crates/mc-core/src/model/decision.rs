//! Router decision audit records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One persisted routing call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterDecision {
    pub id: String,
    pub message_id: String,
    pub targets: Vec<String>,
    pub reasoning: String,
    pub model: String,
    /// USD
    pub cost: f64,
    pub triggered: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRouterDecision {
    pub message_id: String,
    pub targets: Vec<String>,
    pub reasoning: String,
    pub model: String,
    pub cost: f64,
    pub triggered: bool,
}

/// Aggregate over a window of decisions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouterStats {
    pub total_cost: f64,
    pub total_messages: u64,
    pub triggered_count: u64,
    pub avg_cost_per_message: f64,
}

impl RouterStats {
    pub fn from_decisions(decisions: &[RouterDecision]) -> Self {
        let total_messages = decisions.len() as u64;
        let total_cost: f64 = decisions.iter().map(|d| d.cost).sum();
        let triggered_count = decisions.iter().filter(|d| d.triggered).count() as u64;
        let avg_cost_per_message = if total_messages > 0 {
            total_cost / total_messages as f64
        } else {
            0.0
        };

        Self {
            total_cost,
            total_messages,
            triggered_count,
            avg_cost_per_message,
        }
    }
}
