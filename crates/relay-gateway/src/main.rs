use std::net::SocketAddr;
use std::sync::Arc;

use relay_agent::anthropic::AnthropicProvider;
use relay_agent::ollama::OllamaProvider;
use relay_agent::prompt::PromptBuilder;
use relay_agent::provider::LlmProvider;
use relay_agent::runtime::AgentRuntime;
use relay_core::config::{LlmConfig, LlmProviderKind, RelayConfig};
use relay_hooks::EventBus;
use relay_memory::manager::MemoryManager;
use relay_pause::PauseGate;
use relay_plan::PlanEngine;
use relay_scheduler::{SchedulerEngine, SchedulerHandle};
use relay_sessions::SessionManager;
use relay_terminal::manager::TerminalManager;
use relay_users::ledger::AuthLedger;
use relay_users::resolver::UserResolver;
use tokio::sync::watch;
use tracing::{info, warn};

mod app;
mod http;
mod mcp_bridge;
mod stop;
mod tools;
mod update;
mod ws;

/// Build the configured LLM provider. Only Anthropic and a local
/// OpenAI-compatible endpoint are supported — see `LlmProviderKind`.
fn build_provider(cfg: &LlmConfig) -> Box<dyn LlmProvider> {
    match cfg.provider {
        LlmProviderKind::Anthropic => {
            let key = cfg.api_key.clone().unwrap_or_default();
            if key.is_empty() {
                warn!("no LLM api_key configured; requests to Anthropic will fail");
            }
            Box::new(AnthropicProvider::new(key, None))
        }
        LlmProviderKind::Local => Box::new(OllamaProvider::new(cfg.local_endpoint.clone())),
    }
}

fn open_db(path: &str) -> anyhow::Result<rusqlite::Connection> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = rusqlite::Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA busy_timeout=3000;")?;
    Ok(conn)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_gateway=info,tower_http=debug".into()),
        )
        .init();

    // load config: explicit path > RELAY_CONFIG env > ~/.relay/relay.toml
    let config_path = std::env::var("RELAY_CONFIG").ok();
    let config = RelayConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("config load failed ({}), using defaults", e);
        RelayConfig::default()
    });

    crate::http::webhooks::warn_on_open_endpoints(&config.webhooks);

    // One connection per persisted store (C3/C4/C5/C10 + cross-channel identity).
    let context_conn = open_db(&config.database.context_path)?;
    relay_sessions::db::init_db(&context_conn)?;
    let sessions = SessionManager::new(context_conn);

    let memory_conn = open_db(&config.database.memory_path)?;
    relay_memory::db::init_db(&memory_conn)?;
    let memory = MemoryManager::new(memory_conn);

    let users_conn = open_db(&config.database.users_path)?;
    let users = UserResolver::new(users_conn)?;

    let default_level = config
        .auth
        .default_level
        .parse()
        .unwrap_or(relay_core::types::PermissionLevel::Public);
    let auth = AuthLedger::new(
        &config.auth.admin_users,
        &config.auth.operator_users,
        &config.auth.trusted_users,
        default_level,
        config.auth.rate_limit_per_minute,
        config.auth.sudo_timeout_seconds,
    );

    // SchedulerHandle and SchedulerEngine hold independent connections to the
    // same database file: one serves CRUD for tool/WS callers, the other
    // drives the 1-second poll loop.
    let scheduler_handle_conn = open_db(&config.database.scheduler_path)?;
    let scheduler = SchedulerHandle::new(scheduler_handle_conn)?;
    let scheduler_engine_conn = open_db(&config.database.scheduler_path)?;
    let scheduler_engine = SchedulerEngine::new(scheduler_engine_conn, None)?;

    let plan_conn = open_db(&config.database.plans_path)?;
    // Only `create_plan` (decomposition) is wired, not `execute_plan`, so the
    // plan engine gets its own provider instance and an empty tool catalog.
    let plan_engine = PlanEngine::open(
        build_provider(&config.llm),
        Vec::new(),
        config.llm.model.clone(),
        plan_conn,
    )?;

    let terminal = TerminalManager::new();
    let bus = EventBus::new();
    let pause = PauseGate::new();

    let agent_provider = build_provider(&config.llm);
    let prompt = PromptBuilder::load(None, None);
    let agent = AgentRuntime::new(agent_provider, prompt, config.llm.model.clone());

    let state = Arc::new(app::AppState::new(
        config.clone(),
        agent,
        users,
        auth,
        memory,
        sessions,
        scheduler,
        terminal,
        bus,
        pause,
        plan_engine,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Start order: bus workers, scheduler, transports.
    state.bus.start();

    if config.scheduler.enabled {
        let engine_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            scheduler_engine.run(engine_shutdown).await;
        });
        let heartbeat_shutdown = shutdown_rx.clone();
        tokio::spawn(relay_scheduler::run_heartbeat(
            config.scheduler.heartbeat_file.clone(),
            config.scheduler.heartbeat_interval,
            heartbeat_shutdown,
        ));
    }

    if let Some(discord_cfg) = config.discord.clone() {
        let discord_state = Arc::clone(&state);
        tokio::spawn(async move {
            let adapter = relay_discord::DiscordAdapter::new(&discord_cfg, discord_state);
            adapter.run(None).await;
        });
    }

    if let Some(signal_cfg) = config.signal.clone() {
        let signal_state = Arc::clone(&state);
        tokio::spawn(async move {
            let adapter = relay_signal::SignalAdapter::new(&signal_cfg, signal_state);
            adapter.run().await;
        });
    }

    let router = app::build_router(Arc::clone(&state));
    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;
    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    info!("relay gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            wait_for_shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await?;

    state.bus.stop().await;
    info!("relay gateway stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
