use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_WEBHOOK_PORT: u16 = 18790;
pub const DEFAULT_WEBHOOK_BIND: &str = "127.0.0.1";

/// Wire protocol version exchanged in the `hello-ok` handshake response.
pub const PROTOCOL_VERSION: u32 = 1;
/// Largest single WS frame payload accepted, in bytes.
pub const MAX_PAYLOAD_BYTES: usize = 1_048_576;
/// A connection must complete `connect`/`hello-ok` within this window or is dropped.
pub const HANDSHAKE_TIMEOUT_MS: u64 = 10_000;
/// Idle WS connections are pinged at this interval.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Top-level config (relay.toml + RELAY_* env overrides, RELAY_LLM__API_KEY style nesting).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub llm: LlmConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub discord: Option<DiscordConfig>,
    #[serde(default)]
    pub signal: Option<SignalConfig>,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub chunker: ChunkerConfig,
    #[serde(default)]
    pub webhooks: WebhooksConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    #[serde(default)]
    pub auth: GatewayAuthConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_gateway_bind(),
            port: default_gateway_port(),
            auth: GatewayAuthConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    None,
    Token,
    Password,
}

impl Default for AuthMode {
    fn default() -> Self {
        AuthMode::None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GatewayAuthConfig {
    #[serde(default)]
    pub mode: AuthMode,
    pub token: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LlmProviderKind {
    Anthropic,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: LlmProviderKind,
    #[serde(default = "default_model")]
    pub model: String,
    pub api_key: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: u32,
    #[serde(default = "default_rate_limit_rpm")]
    pub rate_limit_rpm: u32,
    pub local_endpoint: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::Anthropic,
            model: default_model(),
            api_key: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_context_tokens: default_max_context_tokens(),
            rate_limit_rpm: default_rate_limit_rpm(),
            local_endpoint: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub token: String,
    #[serde(default)]
    pub guild_ids: Vec<String>,
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    #[serde(default = "bool_true")]
    pub require_mention: bool,
    #[serde(default = "bool_true")]
    pub dm_allowed: bool,
    #[serde(default = "bool_true")]
    pub slash_commands: bool,
    #[serde(default)]
    pub auto_thread: bool,
    #[serde(default = "bool_true")]
    pub ack_reactions: bool,
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: u64,
    #[serde(default = "default_discord_status")]
    pub status: String,
    pub activity_name: Option<String>,
    pub activity_type: Option<String>,
    #[serde(default = "default_voice_transcription")]
    pub voice_transcription: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SignalMode {
    Cli,
    Rest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    pub phone_number: String,
    #[serde(default = "default_signal_mode")]
    pub mode: SignalMode,
    pub signal_cli_path: Option<String>,
    pub rest_api_url: Option<String>,
    pub data_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub admin_users: Vec<String>,
    #[serde(default)]
    pub operator_users: Vec<String>,
    #[serde(default)]
    pub trusted_users: Vec<String>,
    #[serde(default = "default_level")]
    pub default_level: String,
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,
    #[serde(default = "default_sudo_timeout_secs")]
    pub sudo_timeout_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_users: Vec::new(),
            operator_users: Vec::new(),
            trusted_users: Vec::new(),
            default_level: default_level(),
            rate_limit_per_minute: default_rate_limit_per_minute(),
            sudo_timeout_seconds: default_sudo_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,
    #[serde(default = "default_heartbeat_file")]
    pub heartbeat_file: String,
    #[serde(default = "bool_true")]
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: default_heartbeat_interval(),
            heartbeat_file: default_heartbeat_file(),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    #[serde(default = "default_discord_limit")]
    pub discord_limit: usize,
    #[serde(default = "default_signal_limit")]
    pub signal_limit: usize,
    #[serde(default = "default_typing_delay")]
    pub typing_delay_ms_per_char: f64,
    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            discord_limit: default_discord_limit(),
            signal_limit: default_signal_limit(),
            typing_delay_ms_per_char: default_typing_delay(),
            min_chunk_size: default_min_chunk_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEndpointConfig {
    /// Identifier used in the route and matched by substring for auth/normalization
    /// dispatch, e.g. a name containing "github" routes through GitHub handling.
    pub name: String,
    pub path: String,
    pub secret: Option<String>,
    pub channel: String,
    pub prompt_template: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WebhooksConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_webhook_bind")]
    pub bind: String,
    #[serde(default = "default_webhook_port")]
    pub port: u16,
    #[serde(default)]
    pub endpoints: Vec<WebhookEndpointConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_context_db_path")]
    pub context_path: String,
    #[serde(default = "default_memory_db_path")]
    pub memory_path: String,
    #[serde(default = "default_scheduler_db_path")]
    pub scheduler_path: String,
    #[serde(default = "default_plans_db_path")]
    pub plans_path: String,
    #[serde(default = "default_users_db_path")]
    pub users_path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            context_path: default_context_db_path(),
            memory_path: default_memory_db_path(),
            scheduler_path: default_scheduler_db_path(),
            plans_path: default_plans_db_path(),
            users_path: default_users_db_path(),
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_model() -> String {
    "claude-sonnet-4-6".to_string()
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_context_tokens() -> u32 {
    100_000
}
fn default_rate_limit_rpm() -> u32 {
    50
}
fn default_command_prefix() -> String {
    "/".to_string()
}
fn default_max_attachment_bytes() -> u64 {
    8 * 1024 * 1024
}
fn default_discord_status() -> String {
    "online".to_string()
}
fn default_voice_transcription() -> String {
    "none".to_string()
}
fn default_signal_mode() -> SignalMode {
    SignalMode::Cli
}
fn default_level() -> String {
    "public".to_string()
}
fn default_rate_limit_per_minute() -> u32 {
    10
}
fn default_sudo_timeout_secs() -> u64 {
    3600
}
fn default_heartbeat_interval() -> u64 {
    30
}
fn default_heartbeat_file() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.relay/heartbeat", home)
}
fn default_discord_limit() -> usize {
    1900
}
fn default_signal_limit() -> usize {
    2000
}
fn default_typing_delay() -> f64 {
    15.0
}
fn default_min_chunk_size() -> usize {
    100
}
fn default_gateway_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_gateway_port() -> u16 {
    8787
}
fn default_webhook_bind() -> String {
    DEFAULT_WEBHOOK_BIND.to_string()
}
fn default_webhook_port() -> u16 {
    DEFAULT_WEBHOOK_PORT
}
fn default_data_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.relay", home)
}
fn default_context_db_path() -> String {
    format!("{}/context.db", default_data_dir())
}
fn default_memory_db_path() -> String {
    format!("{}/memory.db", default_data_dir())
}
fn default_scheduler_db_path() -> String {
    format!("{}/scheduler.db", default_data_dir())
}
fn default_plans_db_path() -> String {
    format!("{}/plans.db", default_data_dir())
}
fn default_users_db_path() -> String {
    format!("{}/users.db", default_data_dir())
}

impl RelayConfig {
    /// Load config from a TOML file with RELAY_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.relay/relay.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: RelayConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("RELAY_").split("__"))
            .extract()
            .map_err(|e| crate::error::RelayError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    format!("{}/relay.toml", default_data_dir())
}
