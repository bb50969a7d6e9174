//! Target selection: the expertise classifier for tasks and the cost-aware
//! router for chat

mod expertise;
mod mentions;
mod pipeline;
mod pricing;
pub(crate) mod router;

pub use expertise::ExpertiseTable;
pub use mentions::extract_mentions;
pub use pipeline::{ChatOutcome, ChatPipeline, IncomingMessage, WakeResult};
pub use pricing::{ModelPricing, PriceTable, estimate_tokens};
pub use router::{AgentProfile, EXPLICIT_MENTIONS, MessageRouter, NO_MODEL, RouteOutcome};
