//! Token pricing for routing oracles

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::llm::Usage;

/// USD per million tokens
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl ModelPricing {
    pub const fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 * self.input_per_million + output_tokens as f64 * self.output_per_million)
            / 1_000_000.0
    }
}

/// Pricing keyed by model id
#[derive(Debug, Clone)]
pub struct PriceTable {
    models: BTreeMap<String, ModelPricing>,
}

impl Default for PriceTable {
    fn default() -> Self {
        let mut models = BTreeMap::new();
        models.insert("claude-3-haiku-20240307".to_string(), ModelPricing::new(0.25, 1.25));
        models.insert("gemini-2.0-flash".to_string(), ModelPricing::new(0.10, 0.40));
        models.insert("gpt-4o-mini".to_string(), ModelPricing::new(0.15, 0.60));
        Self { models }
    }
}

impl PriceTable {
    pub fn from_map(models: BTreeMap<String, ModelPricing>) -> Self {
        Self { models }
    }

    pub fn into_map(self) -> BTreeMap<String, ModelPricing> {
        self.models
    }

    pub fn with_model(mut self, model: impl Into<String>, pricing: ModelPricing) -> Self {
        self.models.insert(model.into(), pricing);
        self
    }

    pub fn get(&self, model: &str) -> Option<&ModelPricing> {
        self.models.get(model)
    }

    /// Cost of one call; unknown models are free but logged
    pub fn cost(&self, model: &str, usage: &Usage) -> f64 {
        match self.models.get(model) {
            Some(pricing) => pricing.cost(usage.input_tokens, usage.output_tokens),
            None => {
                warn!(model, "no pricing configured for model, recording zero cost");
                0.0
            }
        }
    }
}

/// Length/4 token approximation used when the oracle reports no usage
pub fn estimate_tokens(text: &str) -> u64 {
    text.chars().count().div_ceil(4) as u64
}
