//! mission-control: Mission Control Main Binary
//!
//! Wires the store, router, outbound queue, maintenance scheduler and HTTP
//! API together and runs until Ctrl+C.
//!
//! Usage:
//!   mission-control                   - Start the server
//!   mission-control --config <path>   - Start with an explicit config file
//!   mission-control --help            - Show help

use mc_api::AppState;
use mc_core::{ChatPipeline, Config, DeliveryTracker, LlmClient, MessageRouter, OutboundSink, Store, TaskService};
use mc_notify::OutboundQueue;
use mc_schedule::{ScheduleConfig, Scheduler};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Run mode
#[derive(Debug, PartialEq, Eq)]
enum RunMode {
    /// Server mode (HTTP API + outbound queue + scheduler)
    Server { config_path: Option<String> },
    /// Show help
    Help,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let mode = parse_args(std::env::args().skip(1))?;

    let config_path = match mode {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("mission-control {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        RunMode::Server { config_path } => config_path,
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Load .env file
    dotenvy::dotenv().ok();

    let config = match &config_path {
        Some(path) => Config::from_toml_file(path),
        None => Config::load(),
    }
    .map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    tracing::info!("Starting mission-control...");
    tracing::info!("Routing model: {}", config.llm.model);

    run_server(config).await
}

/// Parse command line arguments (program name already skipped)
fn parse_args<I>(args: I) -> anyhow::Result<RunMode>
where
    I: IntoIterator<Item = String>,
{
    let mut config_path = None;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(RunMode::Help),
            "--version" | "-v" => return Ok(RunMode::Version),
            "--config" | "-c" => match args.next() {
                Some(path) => config_path = Some(path),
                None => anyhow::bail!("--config requires a path"),
            },
            other => anyhow::bail!("unknown argument: {} (see --help)", other),
        }
    }

    Ok(RunMode::Server { config_path })
}

/// Print help message
fn print_help() {
    println!("mission-control - agent routing and delivery orchestration");
    println!();
    println!("Usage:");
    println!("  mission-control                  Start the server");
    println!("  mission-control --config <path>  Load configuration from <path>");
    println!("  mission-control --help           Show this help message");
    println!("  mission-control --version        Show version");
    println!();
    println!("Without --config, ./mission-control.toml is read when present.");
    println!();
    println!("Environment Variables:");
    println!("  LLM_API_KEY              Routing model API key (optional; fallback routing without it)");
    println!("  LLM_MODEL                Model name (default: claude-3-haiku-20240307)");
    println!("  LLM_PROVIDER             Provider: claude or openai (default: claude)");
    println!("  LLM_BASE_URL             Custom API endpoint");
    println!("  DB_PATH                  SQLite database path");
    println!("  API_PORT                 HTTP API port (default: 3000)");
    println!("  API_ALLOWED_ORIGINS      Comma separated CORS origins");
    println!("  TELEGRAM_BOT_TOKEN       Team channel bot token");
    println!("  TELEGRAM_TEAM_CHAT_ID    Team chat id");
    println!("  TELEGRAM_OWNER_CHAT_ID   Owner chat id (default: team chat)");
    println!("  AGENT_WAKE_URL           Agent wake endpoint, {{session_key}} is substituted");
    println!("  ROUTER_DAILY_COST_LIMIT  Daily routing spend ceiling in USD (0 disables)");
    println!("  ROUTER_OWNER_KEY         Mention key that denotes the owner");
    println!("  SCHEDULE_ENABLED         Enable maintenance jobs (default: true)");
    println!("  SCHEDULE_CONFIG_PATH     Path to schedule TOML");
}

/// Run server mode
async fn run_server(config: Config) -> anyhow::Result<()> {
    let store = Arc::new(
        Store::new(&config.store.db_path).map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))?,
    );
    tracing::info!("Store opened at {}", config.store.db_path);

    // Outbound queue (team channel + agent waker)
    let (queue, queue_handle) = OutboundQueue::from_config(&config.notifier, DeliveryTracker::new(store.clone()))
        .map_err(|e| anyhow::anyhow!("Failed to start outbound queue: {}", e))?;
    let outbound: Arc<dyn OutboundSink> = Arc::new(queue.clone());

    // Routing oracle
    let llm_client = LlmClient::new(&config.llm).map_err(|e| anyhow::anyhow!("Failed to create LLM client: {}", e))?;
    if !llm_client.is_configured() {
        tracing::warn!("LLM_API_KEY not set, chat routing falls back to {}", config.routing.coordinator);
    }
    let router = MessageRouter::new(
        Arc::new(llm_client),
        config.routing.agents.clone(),
        config.routing.coordinator.clone(),
        config.llm.price_table(),
    );
    let chat = ChatPipeline::new(router, store.clone(), outbound.clone())
        .with_daily_cost_limit(config.routing.daily_cost_limit)
        .with_owner_key(config.routing.owner_key.clone());

    let tasks = TaskService::new(store.clone(), config.routing.expertise_table(), outbound);
    let state = AppState::new(store, tasks, chat);

    match state.agents.seed_roster(&config.routing.agents) {
        Ok(0) => {}
        Ok(added) => tracing::info!("Registered {} roster agents", added),
        Err(e) => tracing::warn!("Failed to seed agent roster: {}", e),
    }

    // Maintenance scheduler
    let scheduler_handle = if config.scheduler.enabled {
        match ScheduleConfig::load(config.scheduler.config_path.as_deref()) {
            Ok(schedule) => {
                let jobs = schedule.enabled_jobs().len();
                let handle = Scheduler::new(schedule, state.tasks.clone(), state.agents.clone()).start();
                tracing::info!("Scheduler started with {} jobs", jobs);
                Some(handle)
            }
            Err(e) => {
                tracing::warn!("Scheduler disabled, failed to load schedule: {}", e);
                None
            }
        }
    } else {
        tracing::info!("Scheduler is disabled");
        None
    };

    // Start HTTP API server
    let api_config = config.api.clone();
    let api_port = api_config.port;
    let api_handle = tokio::spawn(async move {
        if let Err(e) = mc_api::start_server(api_config, state).await {
            tracing::error!("HTTP API error: {}", e);
        }
    });
    tracing::info!("HTTP API server started on port {}", api_port);

    tracing::info!("mission-control initialized successfully");
    tracing::info!("Press Ctrl+C to exit");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    api_handle.abort();

    if let Some(handle) = scheduler_handle {
        handle.stop().await;
    }

    queue_handle.stop().await;
    let stats = queue.stats();
    tracing::info!(
        enqueued = stats.enqueued,
        delivered = stats.delivered,
        failed = stats.failed,
        dropped = stats.dropped,
        "outbound queue drained"
    );

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_is_server() {
        assert_eq!(parse_args(args(&[])).unwrap(), RunMode::Server { config_path: None });
    }

    #[test]
    fn test_config_path() {
        assert_eq!(
            parse_args(args(&["--config", "prod.toml"])).unwrap(),
            RunMode::Server {
                config_path: Some("prod.toml".to_string())
            }
        );
        assert!(parse_args(args(&["--config"])).is_err());
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(parse_args(args(&["-h"])).unwrap(), RunMode::Help);
        assert_eq!(parse_args(args(&["--version"])).unwrap(), RunMode::Version);
        assert_eq!(parse_args(args(&["--config", "x.toml", "--help"])).unwrap(), RunMode::Help);
    }

    #[test]
    fn test_unknown_argument() {
        assert!(parse_args(args(&["--cli"])).is_err());
    }
}
