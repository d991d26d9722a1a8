use axum::{
    routing::{get, post},
    Router,
};
use dashmap::DashMap;
use relay_agent::pipeline::context::PlanCreator;
use relay_agent::runtime::AgentRuntime;
use relay_core::config::RelayConfig;
use relay_core::types::ChannelOutbound;
use relay_hooks::EventBus;
use relay_memory::manager::MemoryManager;
use relay_pause::PauseGate;
use relay_plan::PlanEngine;
use relay_scheduler::SchedulerHandle;
use relay_sessions::SessionManager;
use relay_terminal::manager::TerminalManager;
use relay_users::ledger::AuthLedger;
use relay_users::resolver::UserResolver;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::ws::broadcast::EventBroadcaster;

/// Central shared state — passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: RelayConfig,
    pub event_seq: AtomicU64,
    #[allow(dead_code)]
    pub presence_version: AtomicU64,
    pub broadcaster: EventBroadcaster,
    pub agent: AgentRuntime,
    pub users: UserResolver,
    /// C2 authorization ledger: permission levels, sudo grants, rate limits.
    pub auth: AuthLedger,
    pub memory: MemoryManager,
    pub sessions: SessionManager,
    pub scheduler: SchedulerHandle,
    /// Terminal subsystem — tokio::sync::Mutex because create_session, kill,
    /// exec_background, and job_kill are async and must be awaited while the
    /// lock is held.
    pub terminal: tokio::sync::Mutex<TerminalManager>,
    /// Typed pub/sub bus — scheduler triggers and webhook events are
    /// published here; C11 subscribers consume them.
    pub bus: EventBus,
    /// Pause/resume gate shared by the `/pause` and `/resume` slash commands.
    pub pause: Arc<PauseGate>,
    /// Decomposes `create_plan` tool calls into persisted, steppable plans.
    pub plan_engine: PlanEngine,
    /// Active WS connections: conn_id -> message sender.
    pub ws_clients: DashMap<String, mpsc::Sender<String>>,
    /// Notification queue for HTTP/terminal clients: session_key -> pending messages.
    /// Drained by `GET /notifications`.
    pub notifications: DashMap<String, Vec<String>>,
    /// Active pipeline operations: session_key -> CancellationToken.
    /// `/stop` cancels all tokens to abort running tool loops.
    pub active_operations: DashMap<String, CancellationToken>,
    /// Outbound channel senders for cross-channel messaging.
    /// Key: channel name (e.g. "discord"), Value: sender for `ChannelOutbound` messages.
    pub channel_senders: DashMap<String, mpsc::Sender<ChannelOutbound>>,
}

impl AppState {
    pub fn new(
        config: RelayConfig,
        agent: AgentRuntime,
        users: UserResolver,
        auth: AuthLedger,
        memory: MemoryManager,
        sessions: SessionManager,
        scheduler: SchedulerHandle,
        terminal: TerminalManager,
        bus: EventBus,
        pause: Arc<PauseGate>,
        plan_engine: PlanEngine,
    ) -> Self {
        Self {
            config,
            event_seq: AtomicU64::new(0),
            presence_version: AtomicU64::new(0),
            broadcaster: EventBroadcaster::new(),
            agent,
            users,
            auth,
            memory,
            sessions,
            scheduler,
            terminal: tokio::sync::Mutex::new(terminal),
            bus,
            pause,
            plan_engine,
            ws_clients: DashMap::new(),
            notifications: DashMap::new(),
            active_operations: DashMap::new(),
            channel_senders: DashMap::new(),
        }
    }

    /// Monotonically increasing sequence for broadcast events.
    pub fn next_seq(&self) -> u64 {
        self.event_seq.fetch_add(1, Ordering::Relaxed)
    }
}

impl relay_agent::pipeline::MessageContext for AppState {
    fn agent(&self) -> &relay_agent::runtime::AgentRuntime {
        &self.agent
    }

    fn memory(&self) -> &relay_memory::manager::MemoryManager {
        &self.memory
    }

    fn terminal(&self) -> &tokio::sync::Mutex<relay_terminal::manager::TerminalManager> {
        &self.terminal
    }

    fn scheduler(&self) -> &relay_scheduler::SchedulerHandle {
        &self.scheduler
    }

    fn users(&self) -> &relay_users::resolver::UserResolver {
        &self.users
    }

    fn auth(&self) -> &relay_users::ledger::AuthLedger {
        &self.auth
    }

    fn pause(&self) -> &Arc<PauseGate> {
        &self.pause
    }

    fn plan(&self) -> &dyn PlanCreator {
        self
    }

    fn connected_channels(&self) -> Vec<String> {
        self.channel_senders
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    fn send_to_channel(&self, channel: &str, recipient: &str, message: &str) -> Result<(), String> {
        let sender = self
            .channel_senders
            .get(channel)
            .ok_or_else(|| format!("channel '{}' is not connected", channel))?;
        sender
            .try_send(ChannelOutbound {
                recipient: recipient.to_string(),
                message: message.to_string(),
            })
            .map_err(|e| format!("failed to send to '{}': {}", channel, e))
    }

    fn gateway_port(&self) -> Option<u16> {
        Some(self.config.gateway.port)
    }

    fn database_path(&self) -> Option<&str> {
        Some(&self.config.database.context_path)
    }
}

#[async_trait::async_trait]
impl PlanCreator for AppState {
    async fn create_plan(&self, goal: &str, channel: &str, context: &str) -> Result<String, String> {
        let plan = self
            .plan_engine
            .create_plan(goal, channel, context)
            .await
            .map_err(|e| e.to_string())?;
        let summary = plan
            .steps
            .iter()
            .map(|s| format!("{}. {}", s.id, s.description))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(format!("Plan {} created with {} step(s):\n{}", plan.id, plan.steps.len(), summary))
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(crate::http::ui::ui_handler))
        .route("/health", get(crate::http::health::health_handler))
        .route("/chat", post(crate::http::chat::chat_handler))
        .route(
            "/notifications",
            get(crate::http::notifications::notifications_handler),
        )
        .route("/ws", get(crate::ws::connection::ws_handler))
        .route(
            "/v1/chat/completions",
            post(crate::http::openai_compat::chat_completions),
        )
        .route(
            "/webhooks/{source}",
            post(crate::http::webhooks::webhook_handler),
        )
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
