use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("WebSocket protocol error: {0}")]
    Protocol(String),

    #[error("Method not found: {method}")]
    MethodNotFound { method: String },

    #[error("Permission denied: {reason}")]
    PermissionDenied { reason: String },

    #[error("User not found: {id}")]
    UserNotFound { id: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("LLM provider error: {0}")]
    LlmProvider(String),

    #[error("Channel error ({channel}): {reason}")]
    Channel { channel: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Request timeout after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Transport authentication failed ({transport}): {reason}")]
    TransportAuth { transport: String, reason: String },

    #[error("Transport unavailable ({transport}): {reason}")]
    TransportUnavailable { transport: String, reason: String },

    #[error("Provider rate limited: retry after {retry_after_secs:?}s")]
    ProviderRateLimited { retry_after_secs: Option<u64> },

    #[error("Provider server error ({status}): {body}")]
    ProviderServerError { status: u16, body: String },

    #[error("Provider returned an invalid response: {0}")]
    ProviderInvalidResponse(String),

    #[error("Tool blocked by safety policy: {0}")]
    ToolBlocked(String),

    #[error("Tool timed out after {secs}s")]
    ToolTimeout { secs: u64 },

    #[error("Webhook request unauthorized: {0}")]
    WebhookUnauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Short error code string sent to clients in WS RES frames.
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::Config(_) => "CONFIG_ERROR",
            RelayError::AuthFailed(_) => "AUTH_FAILED",
            RelayError::Protocol(_) => "PROTOCOL_ERROR",
            RelayError::MethodNotFound { .. } => "METHOD_NOT_FOUND",
            RelayError::PermissionDenied { .. } => "PERMISSION_DENIED",
            RelayError::UserNotFound { .. } => "USER_NOT_FOUND",
            RelayError::Database(_) => "DATABASE_ERROR",
            RelayError::LlmProvider(_) => "LLM_PROVIDER_ERROR",
            RelayError::Channel { .. } => "CHANNEL_ERROR",
            RelayError::Serialization(_) => "SERIALIZATION_ERROR",
            RelayError::Io(_) => "IO_ERROR",
            RelayError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            RelayError::Timeout { .. } => "TIMEOUT",
            RelayError::TransportAuth { .. } => "TRANSPORT_AUTH",
            RelayError::TransportUnavailable { .. } => "TRANSPORT_UNAVAILABLE",
            RelayError::ProviderRateLimited { .. } => "PROVIDER_RATE_LIMITED",
            RelayError::ProviderServerError { .. } => "PROVIDER_SERVER_ERROR",
            RelayError::ProviderInvalidResponse(_) => "PROVIDER_INVALID_RESPONSE",
            RelayError::ToolBlocked(_) => "TOOL_BLOCKED",
            RelayError::ToolTimeout { .. } => "TOOL_TIMEOUT",
            RelayError::WebhookUnauthorized(_) => "WEBHOOK_UNAUTHORIZED",
            RelayError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
