//! Integration tests for the API layer.
//!
//! Each test starts a real server on a random port backed by an in-memory
//! store, a fixed classification oracle and an outbound sink that accepts
//! every job.

use async_trait::async_trait;
use mc_api::{AppState, build_app};
use mc_core::llm::Usage;
use mc_core::model::NewAgent;
use mc_core::routing::AgentProfile;
use mc_core::{
    AgentRegistry, ApiConfig, ChatPipeline, ClassificationOracle, DeliveryOutcome, ExpertiseTable, MessageRouter,
    OracleReply, OutboundJob, OutboundSink, PriceTable, Store, TaskService,
};
use serde_json::Value;
use std::sync::Arc;

const MODEL: &str = "claude-3-haiku-20240307";

/// Always routes to the accountant
struct FixedOracle;

#[async_trait]
impl ClassificationOracle for FixedOracle {
    fn model(&self) -> &str {
        MODEL
    }

    async fn classify(&self, _prompt: &str) -> mc_core::Result<OracleReply> {
        Ok(OracleReply {
            text: r#"{"targets": ["ksiegowy"], "reasoning": "invoice question"}"#.to_string(),
            usage: Some(Usage {
                input_tokens: 1000,
                output_tokens: 100,
            }),
        })
    }
}

struct AcceptingSink;

#[async_trait]
impl OutboundSink for AcceptingSink {
    fn enqueue(&self, _job: OutboundJob) {}

    async fn dispatch(&self, job: OutboundJob) -> DeliveryOutcome {
        DeliveryOutcome::ok(format!("accepted {}", job.label()))
    }
}

/// Spin up a test server on a random port and return the base URL.
async fn start_test_server() -> String {
    let store = Arc::new(Store::in_memory().unwrap());
    let agents = AgentRegistry::new(store.clone());
    for (key, name) in [("main", "Gilfoyl"), ("ksiegowy", "Feliks"), ("assistant", "Zosia")] {
        agents
            .register(NewAgent {
                session_key: key.to_string(),
                name: name.to_string(),
                emoji: None,
                role: "test".to_string(),
                description: None,
            })
            .unwrap();
    }

    let sink: Arc<dyn OutboundSink> = Arc::new(AcceptingSink);
    let router = MessageRouter::new(
        Arc::new(FixedOracle),
        AgentProfile::default_roster(),
        "main",
        PriceTable::default(),
    );
    let chat = ChatPipeline::new(router, store.clone(), sink.clone());
    let tasks = TaskService::new(store.clone(), ExpertiseTable::default(), sink);

    let app = build_app(AppState::new(store, tasks, chat), &ApiConfig::default());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

/// Send a request with an optional JSON body and return (status, body_string).
async fn send(method: reqwest::Method, base: &str, path: &str, json: Option<&str>) -> (u16, String) {
    let client = reqwest::Client::new();
    let mut req = client.request(method, format!("{}{}", base, path));
    if let Some(json) = json {
        req = req.header("content-type", "application/json").body(json.to_string());
    }
    let resp = req.send().await.unwrap();
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap();
    (status, body)
}

async fn get(base: &str, path: &str) -> (u16, String) {
    send(reqwest::Method::GET, base, path, None).await
}

async fn post_json(base: &str, path: &str, json: &str) -> (u16, String) {
    send(reqwest::Method::POST, base, path, Some(json)).await
}

fn parse(body: &str) -> Value {
    serde_json::from_str(body).unwrap()
}

// ============================================================================
// Health endpoint
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let base = start_test_server().await;
    let (status, body) = get(&base, "/health").await;
    assert_eq!(status, 200);
    let json = parse(&body);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "mission-control");
}

// ============================================================================
// Chat webhook
// ============================================================================

#[tokio::test]
async fn test_webhook_extracts_mentions() {
    let base = start_test_server().await;
    let (status, body) = post_json(
        &base,
        "/chat/webhook",
        r#"{"messageId": "m-1", "authorId": "main", "authorName": "Gilfoyl", "content": "@Assistant book the dentist"}"#,
    )
    .await;
    assert_eq!(status, 200);

    let json = parse(&body);
    assert_eq!(json["ok"], true);
    assert_eq!(json["targets"], serde_json::json!(["assistant"]));
    assert_eq!(json["reasoning"], "Explicit mentions");
    assert_eq!(json["wakeResults"][0]["target"], "assistant");
    assert_eq!(json["wakeResults"][0]["success"], true);

    let (status, body) = get(&base, "/api/notifications/undelivered?agent=assistant").await;
    assert_eq!(status, 200);
    let pending = parse(&body);
    assert_eq!(pending.as_array().unwrap().len(), 1);
    assert_eq!(pending[0]["title"], "New message from Gilfoyl");
}

#[tokio::test]
async fn test_webhook_routes_through_oracle() {
    let base = start_test_server().await;
    let (status, body) = post_json(
        &base,
        "/chat/webhook",
        r#"{"messageId": "m-2", "authorId": "assistant", "authorName": "Zosia", "content": "who pays this invoice?", "mentions": []}"#,
    )
    .await;
    assert_eq!(status, 200);

    let json = parse(&body);
    assert_eq!(json["targets"], serde_json::json!(["ksiegowy"]));
    assert!((json["cost"].as_f64().unwrap() - 0.000375).abs() < 1e-12);

    let (_, body) = get(&base, "/api/router/stats").await;
    let stats = parse(&body);
    assert_eq!(stats["total_messages"], 1);
    assert_eq!(stats["triggered_count"], 1);

    let (_, body) = get(&base, "/api/router/decisions?limit=5").await;
    let decisions = parse(&body);
    assert_eq!(decisions[0]["message_id"], "m-2");
    assert_eq!(decisions[0]["model"], MODEL);
}

#[tokio::test]
async fn test_webhook_never_targets_author() {
    let base = start_test_server().await;
    let (status, body) = post_json(
        &base,
        "/chat/webhook",
        r#"{"messageId": "m-3", "authorId": "ksiegowy", "authorName": "Feliks", "content": "invoice sent"}"#,
    )
    .await;
    assert_eq!(status, 200);

    let json = parse(&body);
    assert!(json["targets"].as_array().unwrap().is_empty());
    assert!(json["wakeResults"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_webhook_requires_message_id() {
    let base = start_test_server().await;
    let (status, body) = post_json(
        &base,
        "/chat/webhook",
        r#"{"messageId": " ", "authorId": "main", "authorName": "Gilfoyl", "content": "hi"}"#,
    )
    .await;
    assert_eq!(status, 400);
    assert!(parse(&body)["error"].as_str().unwrap().contains("messageId"));
}

// ============================================================================
// Router endpoints
// ============================================================================

#[tokio::test]
async fn test_route_explicit_mentions() {
    let base = start_test_server().await;
    let (status, body) = post_json(
        &base,
        "/api/router/route",
        r#"{"content": "anything at all", "author_id": "main", "mentions": ["zosia"]}"#,
    )
    .await;
    assert_eq!(status, 200);

    let json = parse(&body);
    assert_eq!(json["targets"], serde_json::json!(["zosia"]));
    assert_eq!(json["reasoning"], "Explicit mentions");
    assert_eq!(json["cost"].as_f64().unwrap(), 0.0);

    // routing alone persists nothing
    let (_, body) = get(&base, "/api/router/decisions").await;
    assert!(parse(&body).as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_record_decision() {
    let base = start_test_server().await;
    let (status, body) = post_json(
        &base,
        "/api/router/decisions",
        r#"{"message_id": "m-9", "targets": ["main"], "reasoning": "manual", "model": "none", "cost": 0.5, "triggered": true}"#,
    )
    .await;
    assert_eq!(status, 201);
    assert_eq!(parse(&body)["message_id"], "m-9");

    let (_, body) = get(&base, "/api/router/stats?hours=1").await;
    let stats = parse(&body);
    assert_eq!(stats["total_cost"].as_f64().unwrap(), 0.5);

    let (status, _) = get(&base, "/api/router/stats?hours=0").await;
    assert_eq!(status, 400);
}

// ============================================================================
// Task endpoints
// ============================================================================

#[tokio::test]
async fn test_task_completion_is_stable() {
    let base = start_test_server().await;
    let (status, body) = post_json(
        &base,
        "/api/tasks",
        r#"{"title": "File VAT return", "assignees": ["ksiegowy"], "created_by": "main"}"#,
    )
    .await;
    assert_eq!(status, 201);
    let task = parse(&body);
    assert_eq!(task["status"], "assigned");
    let id = task["id"].as_str().unwrap().to_string();

    let (status, body) = post_json(
        &base,
        &format!("/api/tasks/{}/status", id),
        r#"{"status": "done", "actor": "ksiegowy"}"#,
    )
    .await;
    assert_eq!(status, 200);
    let completed_at = parse(&body)["completed_at"].clone();
    assert!(completed_at.is_string());

    let (_, body) = get(&base, &format!("/api/tasks/{}", id)).await;
    assert_eq!(parse(&body)["completed_at"], completed_at);

    let (_, body) = get(&base, "/api/tasks?status=done").await;
    assert_eq!(parse(&body).as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_auto_transition_gated_by_priority() {
    let base = start_test_server().await;

    for (priority, expect_transition) in [("medium", true), ("urgent", false)] {
        let (_, body) = post_json(
            &base,
            "/api/tasks",
            &format!(r#"{{"title": "Reconcile", "priority": "{}", "assignees": ["ksiegowy"]}}"#, priority),
        )
        .await;
        let id = parse(&body)["id"].as_str().unwrap().to_string();

        // back to the inbox with its assignees kept
        let (status, _) = post_json(&base, &format!("/api/tasks/{}/status", id), r#"{"status": "inbox"}"#).await;
        assert_eq!(status, 200);

        let (status, body) = post_json(&base, &format!("/api/tasks/{}/auto-transition", id), "{}").await;
        assert_eq!(status, 200);
        let outcome = parse(&body);
        assert_eq!(outcome["transitioned"], expect_transition);
        if expect_transition {
            assert_eq!(outcome["from"], "inbox");
            assert_eq!(outcome["to"], "assigned");
        } else {
            assert_eq!(outcome["reason"], "no matching transition");
        }
    }
}

#[tokio::test]
async fn test_classify_inbox() {
    let base = start_test_server().await;
    post_json(&base, "/api/tasks", r#"{"title": "Send the faktura to the client"}"#).await;

    let (status, body) = post_json(&base, "/api/tasks/classify-inbox", "{}").await;
    assert_eq!(status, 200);
    let report = parse(&body);
    assert_eq!(report["assigned"], 1);
    assert_eq!(report["total"], 1);

    let (_, body) = get(&base, "/api/agents/ksiegowy/notifications/unread-count").await;
    assert_eq!(parse(&body)["count"], 1);
}

#[tokio::test]
async fn test_task_errors() {
    let base = start_test_server().await;

    let (status, body) = get(&base, "/api/tasks/does-not-exist").await;
    assert_eq!(status, 404);
    assert!(parse(&body)["error"].as_str().unwrap().contains("not found"));

    let (status, _) = get(&base, "/api/tasks?status=someday").await;
    assert_eq!(status, 400);

    let (status, _) = post_json(&base, "/api/tasks", r#"{"title": "x", "assignees": ["ghost"]}"#).await;
    assert_eq!(status, 404);

    let (status, _) = post_json(&base, "/api/tasks", r#"{"title": "  "}"#).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_task_patch_and_delete() {
    let base = start_test_server().await;
    let (_, body) = post_json(&base, "/api/tasks", r#"{"title": "Draft"}"#).await;
    let id = parse(&body)["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        reqwest::Method::PATCH,
        &base,
        &format!("/api/tasks/{}", id),
        Some(r#"{"title": "Final", "actor": "main"}"#),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(parse(&body)["title"], "Final");

    let (status, _) = send(reqwest::Method::DELETE, &base, &format!("/api/tasks/{}?actor=main", id), None).await;
    assert_eq!(status, 204);

    let (status, _) = get(&base, &format!("/api/tasks/{}", id)).await;
    assert_eq!(status, 404);
}

// ============================================================================
// Notification endpoints
// ============================================================================

#[tokio::test]
async fn test_delivery_attempts_accumulate() {
    let base = start_test_server().await;
    post_json(&base, "/api/tasks", r#"{"title": "Plan launch", "assignees": ["assistant"]}"#).await;

    let (_, body) = get(&base, "/api/notifications/undelivered?agent=assistant").await;
    let id = parse(&body)[0]["id"].as_str().unwrap().to_string();

    for expected in 1..=2 {
        let (status, body) = post_json(&base, &format!("/api/notifications/{}/delivery-attempt", id), "{}").await;
        assert_eq!(status, 200);
        let json = parse(&body);
        assert_eq!(json["delivered"], true);
        assert_eq!(json["delivery_attempts"], expected);
    }

    let (_, body) = get(&base, "/api/notifications/undelivered?agent=assistant").await;
    assert!(parse(&body).as_array().unwrap().is_empty());

    let (status, body) = post_json(&base, &format!("/api/notifications/{}/acknowledge", id), "{}").await;
    assert_eq!(status, 200);
    assert!(parse(&body)["acknowledged_at"].is_string());

    let (status, body) = post_json(&base, "/api/notifications/missing/delivery-attempt", "{}").await;
    assert_eq!(status, 200);
    assert_eq!(body, "null");

    let (status, _) = post_json(&base, "/api/notifications/missing/read", "{}").await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_undelivered_unknown_agent_is_empty() {
    let base = start_test_server().await;
    let (status, body) = get(&base, "/api/notifications/undelivered?agent=ghost").await;
    assert_eq!(status, 200);
    assert_eq!(body, "[]");
}

// ============================================================================
// Agent endpoints
// ============================================================================

#[tokio::test]
async fn test_agent_lifecycle() {
    let base = start_test_server().await;
    let (status, body) = post_json(
        &base,
        "/api/agents",
        r#"{"session_key": "marketing", "name": "Maverick", "role": "growth"}"#,
    )
    .await;
    assert_eq!(status, 201);
    assert_eq!(parse(&body)["status"], "idle");

    let (status, _) = post_json(
        &base,
        "/api/agents",
        r#"{"session_key": "marketing", "name": "Again", "role": "growth"}"#,
    )
    .await;
    assert_eq!(status, 400);

    let (status, body) = post_json(&base, "/api/agents/marketing/status", r#"{"status": "active"}"#).await;
    assert_eq!(status, 200);
    assert_eq!(parse(&body)["status"], "active");

    let (status, body) = send(
        reqwest::Method::PATCH,
        &base,
        "/api/agents/marketing",
        Some(r#"{"emoji": "📈"}"#),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(parse(&body)["emoji"], "📈");

    let (status, _) = post_json(&base, "/api/agents/ghost/heartbeat", "{}").await;
    assert_eq!(status, 404);

    let (_, body) = get(&base, "/api/agents").await;
    assert_eq!(parse(&body).as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_agent_notifications_read_all() {
    let base = start_test_server().await;
    post_json(&base, "/api/tasks", r#"{"title": "One", "assignees": ["assistant"]}"#).await;
    post_json(&base, "/api/tasks", r#"{"title": "Two", "assignees": ["assistant"]}"#).await;

    let (_, body) = get(&base, "/api/agents/assistant/notifications?unread_only=true").await;
    assert_eq!(parse(&body).as_array().unwrap().len(), 2);

    let (status, body) = post_json(&base, "/api/agents/assistant/notifications/read-all", "{}").await;
    assert_eq!(status, 200);
    assert_eq!(parse(&body)["updated"], 2);

    let (_, body) = get(&base, "/api/agents/assistant/notifications/unread-count").await;
    assert_eq!(parse(&body)["count"], 0);

    let (_, body) = get(&base, "/api/agents/assistant/notifications").await;
    assert_eq!(parse(&body).as_array().unwrap().len(), 2);
}

// ============================================================================
// Policy and activity endpoints
// ============================================================================

#[tokio::test]
async fn test_policy_roundtrip() {
    let base = start_test_server().await;

    let (status, body) = get(&base, "/api/policies/auto_approve").await;
    assert_eq!(status, 200);
    assert_eq!(body, "null");

    let (status, _) = send(
        reqwest::Method::PUT,
        &base,
        "/api/policies/auto_approve",
        Some(r#"{"value": {"enabled": "yes"}}"#),
    )
    .await;
    assert_eq!(status, 400);

    let (status, body) = send(
        reqwest::Method::PUT,
        &base,
        "/api/policies/auto_approve",
        Some(r#"{"value": {"enabled": false, "allowedPriorities": ["low"]}, "description": "manual only"}"#),
    )
    .await;
    assert_eq!(status, 200);
    let policy = parse(&body);
    assert_eq!(policy["value"]["enabled"], false);
    assert_eq!(policy["description"], "manual only");

    let (_, body) = get(&base, "/api/policies").await;
    assert_eq!(parse(&body).as_array().unwrap().len(), 1);

    // a bare switch-off is accepted and stops auto-approval
    let (status, body) = send(
        reqwest::Method::PUT,
        &base,
        "/api/policies/auto_approve",
        Some(r#"{"value": {"enabled": false}}"#),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(parse(&body)["value"]["allowedPriorities"], serde_json::json!(["low", "medium"]));

    let (_, body) = post_json(&base, "/api/tasks", r#"{"title": "Rotate keys", "assignees": ["main"]}"#).await;
    let id = parse(&body)["id"].as_str().unwrap().to_string();
    let (status, body) = post_json(&base, &format!("/api/tasks/{}/auto-transition", id), "{}").await;
    assert_eq!(status, 200);
    let outcome = parse(&body);
    assert_eq!(outcome["transitioned"], false);
    assert_eq!(outcome["reason"], "auto_approve disabled");

    let (_, body) = send(reqwest::Method::DELETE, &base, "/api/policies/auto_approve", None).await;
    assert_eq!(parse(&body)["removed"], true);
    let (_, body) = send(reqwest::Method::DELETE, &base, "/api/policies/auto_approve", None).await;
    assert_eq!(parse(&body)["removed"], false);
}

#[tokio::test]
async fn test_activity_feed() {
    let base = start_test_server().await;
    post_json(&base, "/api/tasks", r#"{"title": "Audit infra", "created_by": "main"}"#).await;

    let (status, body) = get(&base, "/api/activities?limit=10&agent=main").await;
    assert_eq!(status, 200);
    let feed = parse(&body);
    assert_eq!(feed[0]["kind"], "task_created");

    let (_, body) = get(&base, "/api/activities?agent=ghost").await;
    assert_eq!(body, "[]");

    let (status, _) = get(&base, "/api/activities?limit=0").await;
    assert_eq!(status, 400);
}
