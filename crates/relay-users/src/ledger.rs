use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use relay_core::types::PermissionLevel;
use tracing::{info, warn};

use crate::db::build_bindings;
use crate::types::{AuthKey, SudoGrant, SudoRequest};

const RATE_WINDOW_SECS: i64 = 60;

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// The authorization ledger: static config bindings, live sudo grants, a
/// pending-request queue, and per-key rate windows.
///
/// Grants and rate windows are process-wide mutable state; each gets its own
/// lock so a rate check never blocks behind a concurrent sudo approval.
pub struct AuthLedger {
    bindings: HashMap<AuthKey, PermissionLevel>,
    default_level: PermissionLevel,
    rate_limit_per_minute: u32,
    sudo_timeout_seconds: u64,

    grants: DashMap<AuthKey, SudoGrant>,
    rate_windows: DashMap<AuthKey, Vec<i64>>,
    pending: Mutex<Vec<SudoRequest>>,
    next_request_id: Mutex<u64>,
}

impl AuthLedger {
    pub fn new(
        admin_users: &[String],
        operator_users: &[String],
        trusted_users: &[String],
        default_level: PermissionLevel,
        rate_limit_per_minute: u32,
        sudo_timeout_seconds: u64,
    ) -> Self {
        Self {
            bindings: build_bindings(admin_users, operator_users, trusted_users),
            default_level,
            rate_limit_per_minute,
            sudo_timeout_seconds,
            grants: DashMap::new(),
            rate_windows: DashMap::new(),
            pending: Mutex::new(Vec::new()),
            next_request_id: Mutex::new(1),
        }
    }

    /// Effective permission level: live sudo grant first, then the static
    /// binding, then the configured default.
    pub fn level(&self, transport: &str, user_id: &str) -> PermissionLevel {
        let key = AuthKey::new(transport, user_id);
        if let Some(grant) = self.grants.get(&key) {
            if grant.is_live(now_secs()) {
                return grant.level;
            }
        }
        self.bindings
            .get(&key)
            .copied()
            .unwrap_or(self.default_level)
    }

    pub fn check(&self, transport: &str, user_id: &str, required: PermissionLevel) -> bool {
        self.level(transport, user_id) >= required
    }

    /// Prune timestamps older than the rate window; accept iff still under
    /// the limit, appending `now` only on acceptance.
    pub fn allow_rate(&self, transport: &str, user_id: &str) -> bool {
        let key = AuthKey::new(transport, user_id);
        let now = now_secs();
        let mut entry = self.rate_windows.entry(key).or_default();
        entry.retain(|ts| now - *ts < RATE_WINDOW_SECS);
        if entry.len() as u32 >= self.rate_limit_per_minute {
            return false;
        }
        entry.push(now);
        true
    }

    pub fn request_sudo(
        &self,
        transport: &str,
        user_id: &str,
        requested_level: PermissionLevel,
        action: &str,
    ) -> u64 {
        let mut next_id = self.next_request_id.lock().unwrap();
        let id = *next_id;
        *next_id += 1;
        drop(next_id);

        let request = SudoRequest {
            id,
            transport: transport.to_string(),
            user_id: user_id.to_string(),
            requested_level,
            action: action.to_string(),
            created_at: now_secs(),
        };
        info!(request_id = id, transport, user_id, ?requested_level, "sudo requested");
        self.pending.lock().unwrap().push(request);
        id
    }

    pub fn approve_sudo(
        &self,
        request_id: u64,
        approver_transport: &str,
        approver_user: &str,
    ) -> bool {
        if !self.check(approver_transport, approver_user, PermissionLevel::Admin) {
            warn!(request_id, approver_user, "sudo approval rejected: not admin");
            return false;
        }

        let mut pending = self.pending.lock().unwrap();
        let Some(pos) = pending.iter().position(|r| r.id == request_id) else {
            return false;
        };
        let request = pending.remove(pos);
        drop(pending);

        let key = AuthKey::new(&request.transport, &request.user_id);
        let expires_at = now_secs() + self.sudo_timeout_seconds as i64;
        self.grants.insert(
            key,
            SudoGrant {
                level: request.requested_level,
                expires_at,
            },
        );
        info!(request_id, user_id = %request.user_id, "sudo approved");
        true
    }

    pub fn deny_sudo(&self, request_id: u64) -> bool {
        let mut pending = self.pending.lock().unwrap();
        let before = pending.len();
        pending.retain(|r| r.id != request_id);
        pending.len() != before
    }

    pub fn revoke_sudo(&self, transport: &str, user_id: &str) -> bool {
        self.grants.remove(&AuthKey::new(transport, user_id)).is_some()
    }

    pub fn list_pending(&self) -> Vec<SudoRequest> {
        self.pending.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> AuthLedger {
        AuthLedger::new(
            &["discord:admin".to_string()],
            &[],
            &[],
            PermissionLevel::Public,
            5,
            3600,
        )
    }

    #[test]
    fn rate_limit_boundary() {
        let l = ledger();
        for _ in 0..5 {
            assert!(l.allow_rate("discord", "u"));
        }
        assert!(!l.allow_rate("discord", "u"));
    }

    #[test]
    fn sudo_lifecycle_grants_and_expires() {
        let l = AuthLedger::new(&["discord:admin".to_string()], &[], &[], PermissionLevel::Public, 50, 0);
        let id = l.request_sudo("discord", "u", PermissionLevel::Operator, "do a thing");
        assert!(l.approve_sudo(id, "discord", "admin"));
        // timeout 0 means the grant is already expired by the time we check.
        assert_eq!(l.level("discord", "u"), PermissionLevel::Public);
    }

    #[test]
    fn non_admin_cannot_approve() {
        let l = ledger();
        let id = l.request_sudo("discord", "u", PermissionLevel::Operator, "do a thing");
        assert!(!l.approve_sudo(id, "discord", "u"));
        assert_eq!(l.level("discord", "u"), PermissionLevel::Public);
    }
}
