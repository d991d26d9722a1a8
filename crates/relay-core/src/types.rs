use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a user (UUIDv7 — time-sortable for easier log correlation).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new() -> Self {
        // UUIDv7 includes timestamp — sortable and traceable in logs
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifies which agent instance handles a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(name: &str) -> Self {
        Self(name.to_string())
    }

    /// The default single-agent setup uses "main".
    pub fn main() -> Self {
        Self("main".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// User-centric session key.
///
/// Breaking change from OpenClaw: sessions belong to users, not channels.
/// Format: `user:{user_id}:agent:{agent_id}:{session_name}`
///
/// Alice on Telegram + Alice on Discord = same session `user:u2:agent:main:main`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey(pub String);

impl SessionKey {
    pub fn for_user(user_id: &UserId, agent_id: &AgentId, session: &str) -> Self {
        Self(format!("user:{}:agent:{}:{}", user_id, agent_id, session))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-connection identifier (random UUID, not persisted).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnId(pub String);

impl ConnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Total-ordered permission level: PUBLIC < TRUSTED < OPERATOR < ADMIN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    #[default]
    Public,
    Trusted,
    Operator,
    Admin,
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionLevel::Public => write!(f, "public"),
            PermissionLevel::Trusted => write!(f, "trusted"),
            PermissionLevel::Operator => write!(f, "operator"),
            PermissionLevel::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for PermissionLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "public" => Ok(PermissionLevel::Public),
            "trusted" => Ok(PermissionLevel::Trusted),
            "operator" => Ok(PermissionLevel::Operator),
            "admin" => Ok(PermissionLevel::Admin),
            other => Err(format!("unknown permission level: {}", other)),
        }
    }
}

/// An attachment on an inbound message (filename + content type + a fetch URL
/// or local path, depending on transport).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub content_type: Option<String>,
    pub url: String,
    pub size: Option<u64>,
}

/// Transport-agnostic inbound message envelope. Every transport adapter
/// (Discord, Signal) normalizes into this shape before publishing
/// `message.incoming`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub transport: String,
    pub channel: String,
    pub user_id: String,
    pub user_name: Option<String>,
    pub content: String,
    pub message_id: Option<String>,
    pub group_id: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Transport-agnostic outbound message envelope, consumed by transport
/// adapters subscribed to `message.outgoing`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub transport: String,
    pub channel: String,
    pub content: String,
    pub reply_to: Option<String>,
}

/// A cross-channel delivery request: a tool or slash command on one transport
/// asking another connected transport to deliver a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelOutbound {
    pub recipient: String,
    pub message: String,
}

/// The four event kinds the bus dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    MessageIncoming,
    MessageOutgoing,
    SchedulerTrigger,
    WebhookReceived,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::MessageIncoming => "message.incoming",
            EventKind::MessageOutgoing => "message.outgoing",
            EventKind::SchedulerTrigger => "scheduler.trigger",
            EventKind::WebhookReceived => "webhook.received",
        }
    }
}

/// Payload carried by a `scheduler.trigger` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerTrigger {
    pub job_name: String,
    pub expression: String,
    pub action: String,
}

/// Payload carried by a `webhook.received` event — the normalized shape
/// produced by the webhook ingress regardless of source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub source: String,
    pub event_type: String,
    pub summary: String,
    pub payload: serde_json::Value,
    pub channel_target: String,
}

/// A tagged event flowing through the bus. Exactly one payload variant is
/// populated per `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub id: String,
    pub created_at: i64,
    pub incoming: Option<InboundMessage>,
    pub outgoing: Option<OutboundMessage>,
    pub scheduler: Option<SchedulerTrigger>,
    pub webhook: Option<WebhookEvent>,
}

impl Event {
    pub fn incoming(msg: InboundMessage, now: i64) -> Self {
        Self {
            kind: EventKind::MessageIncoming,
            id: Uuid::now_v7().to_string(),
            created_at: now,
            incoming: Some(msg),
            outgoing: None,
            scheduler: None,
            webhook: None,
        }
    }

    pub fn outgoing(msg: OutboundMessage, now: i64) -> Self {
        Self {
            kind: EventKind::MessageOutgoing,
            id: Uuid::now_v7().to_string(),
            created_at: now,
            incoming: None,
            outgoing: Some(msg),
            scheduler: None,
            webhook: None,
        }
    }

    pub fn scheduler_trigger(trigger: SchedulerTrigger, now: i64) -> Self {
        Self {
            kind: EventKind::SchedulerTrigger,
            id: Uuid::now_v7().to_string(),
            created_at: now,
            incoming: None,
            outgoing: None,
            scheduler: Some(trigger),
            webhook: None,
        }
    }

    pub fn webhook_received(webhook: WebhookEvent, now: i64) -> Self {
        Self {
            kind: EventKind::WebhookReceived,
            id: Uuid::now_v7().to_string(),
            created_at: now,
            incoming: None,
            outgoing: None,
            scheduler: None,
            webhook: Some(webhook),
        }
    }
}
