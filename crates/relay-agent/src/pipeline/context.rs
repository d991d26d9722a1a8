//! Shared context interface for all channel adapters.
//!
//! `MessageContext` is the single trait that every channel host (gateway, discord,
//! future telegram, etc.) must implement. It replaces the old `DiscordAppContext`
//! and lets the pipeline crate stay channel-agnostic.

use relay_memory::manager::MemoryManager;
use relay_pause::PauseGate;
use relay_scheduler::SchedulerHandle;
use relay_terminal::manager::TerminalManager;

use crate::runtime::AgentRuntime;

/// Narrow seam onto C10 (the plan engine) that avoids a circular dependency:
/// `relay-plan` already depends on `relay-agent` for its tool trait, so
/// `relay-agent` cannot depend on `relay-plan` back. Implementors live in the
/// channel host crate and wrap a `relay_plan::engine::PlanEngine`.
#[async_trait::async_trait]
pub trait PlanCreator: Send + Sync {
    /// Hand a goal to the plan engine and return the new plan's id.
    async fn create_plan(&self, goal: &str, channel: &str, context: &str) -> Result<String, String>;
}

/// Minimal context interface required by the shared message pipeline.
///
/// Implemented by `AppState` in `relay-gateway` and any future channel host.
/// Defined here (in `relay-agent`) to avoid circular dependency: all channel
/// crates depend on `relay-agent`; `relay-agent` depends only on `relay-core`,
/// `relay-memory`, `relay-scheduler`, and `relay-terminal`.
pub trait MessageContext: Send + Sync {
    fn agent(&self) -> &AgentRuntime;
    fn memory(&self) -> &MemoryManager;
    fn terminal(&self) -> &tokio::sync::Mutex<TerminalManager>;
    fn scheduler(&self) -> &SchedulerHandle;
    fn plan(&self) -> &dyn PlanCreator;
    fn users(&self) -> &relay_users::resolver::UserResolver;
    /// C2 authorization ledger: computes a user's effective `PermissionLevel`
    /// and enforces sudo/rate-limit state.
    fn auth(&self) -> &relay_users::ledger::AuthLedger;
    /// C6 pause gate: backs the `/pause`, `/resume`, and `/status` slash commands.
    fn pause(&self) -> &std::sync::Arc<PauseGate>;
    fn connected_channels(&self) -> Vec<String>;
    fn send_to_channel(&self, channel: &str, recipient: &str, message: &str) -> Result<(), String>;
    fn gateway_port(&self) -> Option<u16>;
    fn database_path(&self) -> Option<&str>;
}
