pub mod config;
pub mod error;
pub mod reminder;
pub mod types;
pub mod update;

pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use types::{
    AgentId, Attachment, ConnId, Event, EventKind, InboundMessage, OutboundMessage,
    PermissionLevel, SchedulerTrigger, SessionKey, UserId, WebhookEvent,
};
