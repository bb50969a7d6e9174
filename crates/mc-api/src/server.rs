//! HTTP API Server
//!
//! Builds the application router and runs it on the configured port.

use axum::Router;
use axum::http::HeaderValue;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use mc_core::{AgentRegistry, ApiConfig, ChatPipeline, DeliveryTracker, Store, TaskService};

use crate::routes::routes;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub tasks: TaskService,
    pub agents: AgentRegistry,
    pub notifications: DeliveryTracker,
    pub chat: Arc<ChatPipeline>,
}

impl AppState {
    pub fn new(store: Arc<Store>, tasks: TaskService, chat: ChatPipeline) -> Self {
        Self {
            agents: AgentRegistry::new(store.clone()),
            notifications: DeliveryTracker::new(store.clone()),
            store,
            tasks,
            chat: Arc::new(chat),
        }
    }
}

/// Router with middleware and state applied
pub fn build_app(state: AppState, config: &ApiConfig) -> Router {
    Router::new()
        .merge(routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(config.allowed_origins.as_deref()))
        .with_state(state)
}

fn cors_layer(allowed_origins: Option<&[String]>) -> CorsLayer {
    let Some(origins) = allowed_origins else {
        return CorsLayer::permissive();
    };

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Start the HTTP API server
pub async fn start_server(config: ApiConfig, state: AppState) -> anyhow::Result<()> {
    let app = build_app(state, &config);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("HTTP API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
