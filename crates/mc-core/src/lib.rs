//! mc-core: Mission Control core library
//!
//! Routing and delivery orchestration for a small fleet of agents: the
//! expertise classifier, the cost-aware chat router, the notification
//! delivery tracker, the task state machine and the SQLite store behind them.

pub mod agents;
pub mod config;
pub mod delivery;
pub mod error;
pub mod llm;
pub mod model;
pub mod outbound;
pub mod routing;
pub mod store;
pub mod tasks;

pub use agents::AgentRegistry;
pub use config::{
    ApiConfig, Config, LlmConfig, LlmProvider, NotifierConfig, RoutingConfig, SchedulerConfig, StoreConfig,
};
pub use delivery::DeliveryTracker;
pub use error::{Error, Result};
pub use llm::{ClassificationOracle, LlmClient, OracleReply};
pub use outbound::{Alert, Audience, DeliveryOutcome, NullSink, OutboundJob, OutboundSink, WakeReason, WakeRequest};
pub use routing::{ChatOutcome, ChatPipeline, ExpertiseTable, IncomingMessage, MessageRouter, PriceTable, RouteOutcome};
pub use store::Store;
pub use tasks::{AutoTransitionOutcome, InboxReport, TaskService};
