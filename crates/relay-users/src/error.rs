use thiserror::Error;

/// All auth-layer errors. Kept separate from RelayError so callers can map
/// them to appropriate transport/command responses without coupling layers.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("Unknown sudo request: {0}")]
    UnknownRequest(u64),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid binding entry: {0}")]
    InvalidBinding(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, UserError>;
