//! Cost-aware message router
//!
//! Chooses which agents should see a chat message. Explicit mentions bypass
//! the oracle entirely; otherwise the oracle is asked and any failure degrades
//! to the coordinator at zero cost. The router knows nothing about budgets.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, warn};

use super::pricing::{PriceTable, estimate_tokens};
use crate::Error;
use crate::llm::{ClassificationOracle, Usage};

/// Reasoning recorded for the mention bypass
pub const EXPLICIT_MENTIONS: &str = "Explicit mentions";

/// Model id recorded when no oracle was consulted
pub const NO_MODEL: &str = "none";

/// Most recent chat lines quoted in the prompt
pub const MAX_CONTEXT_LINES: usize = 10;

/// Agent entry in the routing prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub key: String,
    pub name: String,
    /// Free-text description of what the agent handles
    pub domain: String,
}

impl AgentProfile {
    pub fn new(key: impl Into<String>, name: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            domain: domain.into(),
        }
    }

    pub fn default_roster() -> Vec<Self> {
        vec![
            Self::new("main", "Gilfoyl", "architecture, coordination, bugs, deploys, infrastructure"),
            Self::new("bestia", "Bestia", "health, training, diet, sleep"),
            Self::new("ksiegowy", "Feliks", "money, invoices, taxes, VAT, payments"),
            Self::new("marketing", "Maverick", "marketing, SEO, content, growth, launches"),
            Self::new("investor", "Gordon", "investments, stocks, crypto, portfolio, markets"),
            Self::new("assistant", "Zosia", "calendar, reminders, errands, email"),
        ]
    }
}

/// Result of one routing call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteOutcome {
    pub targets: Vec<String>,
    pub reasoning: String,
    /// USD
    pub cost: f64,
    pub model: String,
}

impl RouteOutcome {
    /// Targets with the author removed
    pub fn live_targets(&self, author_id: &str) -> Vec<String> {
        let author = author_id.to_lowercase();
        self.targets
            .iter()
            .filter(|t| t.to_lowercase() != author)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct OracleRoute {
    targets: Vec<String>,
    #[serde(default)]
    reasoning: String,
}

/// Routes chat messages to agent keys
pub struct MessageRouter {
    oracle: Arc<dyn ClassificationOracle>,
    roster: Vec<AgentProfile>,
    coordinator: String,
    prices: PriceTable,
}

impl MessageRouter {
    pub fn new(
        oracle: Arc<dyn ClassificationOracle>,
        roster: Vec<AgentProfile>,
        coordinator: impl Into<String>,
        prices: PriceTable,
    ) -> Self {
        Self {
            oracle,
            roster,
            coordinator: coordinator.into(),
            prices,
        }
    }

    pub fn coordinator(&self) -> &str {
        &self.coordinator
    }

    pub fn model(&self) -> &str {
        self.oracle.model()
    }

    /// Decide targets for a message.
    ///
    /// Never fails: oracle and parse errors collapse to the coordinator.
    /// `context` holds preceding chat lines, oldest first.
    pub async fn route(&self, content: &str, author_id: &str, mentions: &[String], context: &[String]) -> RouteOutcome {
        if !mentions.is_empty() {
            return RouteOutcome {
                targets: mentions.to_vec(),
                reasoning: EXPLICIT_MENTIONS.to_string(),
                cost: 0.0,
                model: NO_MODEL.to_string(),
            };
        }

        let prompt = self.build_prompt(content, author_id, context);
        let model = self.oracle.model().to_string();

        let reply = match self.oracle.classify(&prompt).await {
            Ok(reply) => reply,
            Err(Error::LlmNotConfigured) => return self.fallback("No API key", model),
            Err(e) => {
                warn!(error = %e, "routing oracle call failed");
                return self.fallback("API error", model);
            }
        };

        let Some(parsed) = extract_route(&reply.text) else {
            warn!(reply = %reply.text, "routing oracle returned no usable JSON");
            return self.fallback("Parse error", model);
        };

        let usage = reply.usage.unwrap_or_else(|| Usage {
            input_tokens: estimate_tokens(&prompt),
            output_tokens: estimate_tokens(&reply.text),
        });
        let cost = self.prices.cost(&model, &usage);

        let mut targets: Vec<String> = Vec::with_capacity(parsed.targets.len());
        for target in parsed.targets {
            let key = target.trim().trim_start_matches('@').to_lowercase();
            if !key.is_empty() && !targets.contains(&key) {
                targets.push(key);
            }
        }

        debug!(?targets, cost, "message routed");

        RouteOutcome {
            targets,
            reasoning: parsed.reasoning,
            cost,
            model,
        }
    }

    fn fallback(&self, cause: &str, model: String) -> RouteOutcome {
        RouteOutcome {
            targets: vec![self.coordinator.clone()],
            reasoning: format!("{}, fallback to {}", cause, self.coordinator),
            cost: 0.0,
            model,
        }
    }

    /// Instruction prompt listing every agent and the routing rules
    pub fn build_prompt(&self, content: &str, author_id: &str, context: &[String]) -> String {
        let mut prompt = String::from(
            "You route messages in a team chat to the agents that should respond.\n\nAgents:\n",
        );
        for agent in &self.roster {
            let _ = writeln!(prompt, "- {} ({}): {}", agent.key, agent.name, agent.domain);
        }

        let all: Vec<&str> = self.roster.iter().map(|a| a.key.as_str()).collect();
        let _ = write!(
            prompt,
            "\nRules:\n\
             - Greetings to the whole team (\"hi\", \"good morning\") -> all agents: {:?}\n\
             - Acknowledgements (\"ok\", \"thanks\", \"got it\") -> no agents: []\n\
             - A message about one agent's domain -> that agent\n\
             - Anything else -> {}\n",
            all, self.coordinator
        );

        let recent = &context[context.len().saturating_sub(MAX_CONTEXT_LINES)..];
        if !recent.is_empty() {
            prompt.push_str("\nRecent context:\n");
            for line in recent {
                let _ = writeln!(prompt, "{}", line);
            }
        }

        let _ = write!(
            prompt,
            "\nMessage from {}:\n\"\"\"\n{}\n\"\"\"\n\
             \nReturn ONLY valid JSON (no markdown): {{\"targets\": [...], \"reasoning\": \"...\"}}",
            author_id, content
        );
        prompt
    }
}

/// Pull a `{targets, reasoning}` object out of a model reply.
///
/// Tries the whole reply, then a fenced json block, then the outermost braces.
fn extract_route(text: &str) -> Option<OracleRoute> {
    let trimmed = text.trim();
    if let Ok(route) = serde_json::from_str::<OracleRoute>(trimmed) {
        return Some(route);
    }

    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + "```json".len()..];
        if let Some(end) = rest.find("```") {
            if let Ok(route) = serde_json::from_str::<OracleRoute>(rest[..end].trim()) {
                return Some(route);
            }
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<OracleRoute>(&trimmed[start..=end]).ok()
}
