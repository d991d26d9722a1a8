use relay_core::types::PermissionLevel;
use serde::{Deserialize, Serialize};

/// The only platforms a bare (transport-less) config identifier applies to.
pub const BARE_ID_PLATFORMS: &[&str] = &["discord", "signal"];

/// A resolved (transport, user) key used throughout the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthKey {
    pub transport: String,
    pub user_id: String,
}

impl AuthKey {
    pub fn new(transport: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            transport: transport.into(),
            user_id: user_id.into(),
        }
    }
}

/// A live sudo grant: elevated level until an absolute expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SudoGrant {
    pub level: PermissionLevel,
    /// Unix seconds.
    pub expires_at: i64,
}

impl SudoGrant {
    pub fn is_live(&self, now: i64) -> bool {
        now < self.expires_at
    }
}

/// A pending sudo request awaiting admin approval or denial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SudoRequest {
    pub id: u64,
    pub transport: String,
    pub user_id: String,
    pub requested_level: PermissionLevel,
    pub action: String,
    pub created_at: i64,
}
