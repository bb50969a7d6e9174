//! Inbound chat handling
//!
//! Owns the daily spend ceiling, records a decision for every routing call,
//! removes the author from the targets and dispatches one wake per live target.

use chrono::{DateTime, NaiveTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::mentions::extract_mentions;
use super::router::{MessageRouter, NO_MODEL, RouteOutcome};
use crate::Result;
use crate::delivery::DeliveryTracker;
use crate::model::{
    Activity, ActivityDetail, ActivityKind, NewNotification, NewRouterDecision, NotificationKind, Reference,
    RouterDecision, RouterStats,
};
use crate::outbound::{Alert, DeliveryOutcome, OutboundJob, OutboundSink, WakeReason, WakeRequest};
use crate::store::Store;

/// Chat message as received from the chat surface
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingMessage {
    pub message_id: String,
    pub author_id: String,
    pub author_name: String,
    pub content: String,
    /// Known mention targets; extracted from `content` when absent
    #[serde(default)]
    pub mentions: Option<Vec<String>>,
    /// Preceding chat lines as `author: text`, oldest first
    #[serde(default)]
    pub context: Vec<String>,
}

/// Per-target dispatch result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WakeResult {
    pub target: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WakeResult {
    fn from_outcome(target: &str, outcome: DeliveryOutcome) -> Self {
        Self {
            target: target.to_string(),
            success: outcome.success,
            result: outcome.result,
            error: outcome.error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatOutcome {
    /// Live targets, author excluded
    pub targets: Vec<String>,
    pub reasoning: String,
    pub cost: f64,
    pub wake_results: Vec<WakeResult>,
}

pub struct ChatPipeline {
    router: MessageRouter,
    store: Arc<Store>,
    tracker: DeliveryTracker,
    outbound: Arc<dyn OutboundSink>,
    /// USD per UTC day; zero or less disables the ceiling
    daily_cost_limit: f64,
    owner_key: Option<String>,
}

impl ChatPipeline {
    pub fn new(router: MessageRouter, store: Arc<Store>, outbound: Arc<dyn OutboundSink>) -> Self {
        Self {
            router,
            tracker: DeliveryTracker::new(store.clone()),
            store,
            outbound,
            daily_cost_limit: 0.0,
            owner_key: None,
        }
    }

    pub fn with_daily_cost_limit(mut self, limit: f64) -> Self {
        self.daily_cost_limit = limit;
        self
    }

    /// Key that addresses the human owner instead of an agent
    pub fn with_owner_key(mut self, key: Option<String>) -> Self {
        self.owner_key = key.map(|k| k.to_lowercase());
        self
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    /// Route without persisting; the author is already excluded.
    /// Caller-supplied mentions are taken as given.
    pub async fn route_message(
        &self,
        content: &str,
        author_id: &str,
        mentions: &[String],
        context: &[String],
    ) -> Result<RouteOutcome> {
        let mut outcome = self.decide(content, author_id, mentions, context).await?;
        outcome.targets = outcome.live_targets(author_id);
        Ok(outcome)
    }

    pub fn record_decision(&self, decision: NewRouterDecision) -> Result<RouterDecision> {
        self.store.insert_decision(decision, Utc::now())
    }

    pub fn recent_decisions(&self, limit: usize) -> Result<Vec<RouterDecision>> {
        self.store.recent_decisions(limit)
    }

    pub fn stats_since(&self, since: DateTime<Utc>) -> Result<RouterStats> {
        Ok(RouterStats::from_decisions(&self.store.decisions_since(since)?))
    }

    /// Full inbound flow for one chat message
    pub async fn handle(&self, message: IncomingMessage) -> Result<ChatOutcome> {
        let mentions = match &message.mentions {
            Some(mentions) => mentions.clone(),
            None => extract_mentions(&message.content),
        };

        let outcome = self
            .decide(&message.content, &message.author_id, &mentions, &message.context)
            .await?;
        let live = outcome.live_targets(&message.author_id);

        self.record_decision(NewRouterDecision {
            message_id: message.message_id.clone(),
            targets: outcome.targets.clone(),
            reasoning: outcome.reasoning.clone(),
            model: outcome.model.clone(),
            cost: outcome.cost,
            triggered: !live.is_empty(),
        })?;

        let author_agent_id = match self.store.agent_by_key(&message.author_id.to_lowercase()) {
            Ok(agent) => agent.map(|a| a.id),
            Err(e) => {
                warn!(error = %e, "author lookup failed");
                None
            }
        };

        let wake_results = join_all(
            live.iter()
                .map(|target| self.deliver(target, &message, author_agent_id.clone())),
        )
        .await;

        if !live.is_empty() {
            self.store.log_activity(
                Activity::new(
                    ActivityKind::Mention,
                    format!("{} mentioned {}", message.author_name, live.join(", ")),
                )
                .by_agent(author_agent_id)
                .on_message(&message.message_id)
                .with_detail(ActivityDetail::Mention {
                    message_id: message.message_id.clone(),
                    targets: live.clone(),
                }),
            );
        }

        info!(
            message_id = %message.message_id,
            targets = ?live,
            cost = outcome.cost,
            "chat message handled"
        );

        Ok(ChatOutcome {
            targets: live,
            reasoning: outcome.reasoning,
            cost: outcome.cost,
            wake_results,
        })
    }

    /// Budget gate, then the router. Mentions cost nothing and always pass.
    async fn decide(
        &self,
        content: &str,
        author_id: &str,
        mentions: &[String],
        context: &[String],
    ) -> Result<RouteOutcome> {
        if mentions.is_empty() && self.daily_cost_limit > 0.0 {
            let spent = self.store.routing_cost_since(start_of_day(Utc::now()))?;
            if spent >= self.daily_cost_limit {
                warn!(spent, limit = self.daily_cost_limit, "daily routing budget exhausted");
                return Ok(RouteOutcome {
                    targets: Vec::new(),
                    reasoning: format!(
                        "Daily cost limit reached (${:.2}), classification skipped",
                        self.daily_cost_limit
                    ),
                    cost: 0.0,
                    model: NO_MODEL.to_string(),
                });
            }
        }

        Ok(self.router.route(content, author_id, mentions, context).await)
    }

    async fn deliver(&self, target: &str, message: &IncomingMessage, from_agent_id: Option<String>) -> WakeResult {
        if self.owner_key.as_deref() == Some(target) {
            let outcome = self
                .outbound
                .dispatch(OutboundJob::Broadcast(Alert::OwnerMention {
                    author: message.author_name.clone(),
                    content: message.content.clone(),
                }))
                .await;
            return WakeResult::from_outcome(target, outcome);
        }

        let agent = match self.store.agent_by_key(target) {
            Ok(Some(agent)) => agent,
            Ok(None) => {
                warn!(target, "routed to unknown agent");
                return WakeResult::from_outcome(target, DeliveryOutcome::failed("unknown agent"));
            }
            Err(e) => return WakeResult::from_outcome(target, DeliveryOutcome::failed(e.to_string())),
        };

        let notification = match self.tracker.create(
            NewNotification::new(
                &agent.id,
                NotificationKind::Mention,
                format!("New message from {}", message.author_name),
                &message.content,
            )
            .from_agent(from_agent_id)
            .with_reference(Reference::message(&message.message_id)),
        ) {
            Ok(notification) => notification,
            Err(e) => {
                warn!(target, error = %e, "failed to create mention notification");
                return WakeResult::from_outcome(target, DeliveryOutcome::failed(e.to_string()));
            }
        };

        let outcome = self
            .outbound
            .dispatch(OutboundJob::Wake(WakeRequest {
                agent_key: agent.session_key,
                agent_name: agent.name,
                notification_id: Some(notification.id),
                reason: WakeReason::Mention {
                    message_id: message.message_id.clone(),
                    author_name: message.author_name.clone(),
                    content: message.content.clone(),
                },
            }))
            .await;
        WakeResult::from_outcome(target, outcome)
    }
}

/// 00:00 UTC of the given instant's day
fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}
