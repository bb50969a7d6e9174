//! Route definitions
//!
//! Defines all HTTP API endpoints.

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::handlers::{activities, agents, chat, health, notifications, policies, router, tasks};
use crate::server::AppState;

/// Create the API router
pub fn routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(health))
        // Inbound chat callback
        .route("/chat/webhook", post(chat::webhook))
        // Router
        .route("/api/router/route", post(router::route))
        .route(
            "/api/router/decisions",
            get(router::recent_decisions).post(router::record_decision),
        )
        .route("/api/router/stats", get(router::stats))
        // Tasks
        .route("/api/tasks", get(tasks::list).post(tasks::create))
        .route("/api/tasks/classify-inbox", post(tasks::classify_inbox))
        .route(
            "/api/tasks/{id}",
            get(tasks::get).patch(tasks::update).delete(tasks::delete),
        )
        .route("/api/tasks/{id}/status", post(tasks::update_status))
        .route("/api/tasks/{id}/assign", post(tasks::assign))
        .route("/api/tasks/{id}/auto-transition", post(tasks::auto_transition))
        // Notifications
        .route("/api/notifications/undelivered", get(notifications::undelivered))
        .route(
            "/api/notifications/{id}/delivery-attempt",
            post(notifications::record_delivery_attempt),
        )
        .route("/api/notifications/{id}/acknowledge", post(notifications::acknowledge))
        .route("/api/notifications/{id}/read", post(notifications::mark_read))
        // Agents
        .route("/api/agents", get(agents::list).post(agents::register))
        .route("/api/agents/{key}", patch(agents::update))
        .route("/api/agents/{key}/heartbeat", post(agents::heartbeat))
        .route("/api/agents/{key}/status", post(agents::update_status))
        .route("/api/agents/{key}/notifications", get(agents::notifications))
        .route(
            "/api/agents/{key}/notifications/read-all",
            post(agents::mark_all_read),
        )
        .route(
            "/api/agents/{key}/notifications/unread-count",
            get(agents::unread_count),
        )
        // Policies and activity
        .route("/api/policies", get(policies::list))
        .route(
            "/api/policies/{name}",
            get(policies::get).put(policies::set).delete(policies::remove),
        )
        .route("/api/activities", get(activities::feed))
}
