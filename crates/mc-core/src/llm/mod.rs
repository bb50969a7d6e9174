//! LLM API client and the classification oracle seam
//!
//! Supports both Claude API and OpenAI-compatible APIs

mod client;
mod types;

use async_trait::async_trait;

use crate::Result;

pub use client::LlmClient;
pub use types::*;

/// Raw reply from a classification oracle
#[derive(Debug, Clone, Default)]
pub struct OracleReply {
    pub text: String,
    /// Provider-reported usage, when available
    pub usage: Option<Usage>,
}

/// External model that turns a routing prompt into a reply
#[async_trait]
pub trait ClassificationOracle: Send + Sync {
    /// Model identifier used for pricing and audit
    fn model(&self) -> &str;

    async fn classify(&self, prompt: &str) -> Result<OracleReply>;
}
