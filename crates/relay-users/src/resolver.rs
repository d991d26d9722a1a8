//! Cross-channel identity resolution.
//!
//! Maps an inbound `(channel, identifier)` pair — a Discord snowflake, a
//! Signal phone number — onto a stable Relay user id, auto-creating a new
//! user on first contact. [`AuthLedger`](crate::ledger::AuthLedger) decides
//! *what* a resolved user may do; `UserResolver` only decides *who* they are.

use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::Result;

/// A Relay user, as seen by the identity resolver. Intentionally minimal —
/// display metadata, preferences, and quotas live in `relay-memory`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
}

/// A linked channel identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub channel: String,
    pub identifier: String,
    pub linked_at: String,
}

/// Result of resolving an inbound `(channel, identifier)` pair.
pub struct ResolvedUser {
    user: User,
}

impl ResolvedUser {
    pub fn user(&self) -> &User {
        &self.user
    }
}

/// SQLite-backed channel-identity resolver, shared across all channel hosts.
pub struct UserResolver {
    db: Mutex<Connection>,
}

impl UserResolver {
    pub fn new(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS user_identities (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL,
                channel     TEXT NOT NULL,
                identifier  TEXT NOT NULL,
                linked_at   TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                UNIQUE(channel, identifier)
            );
            CREATE INDEX IF NOT EXISTS idx_user_identities_user
                ON user_identities(user_id);",
        )?;
        Ok(Self { db: Mutex::new(conn) })
    }

    /// Resolve a `(channel, identifier)` pair to a Relay user, creating a new
    /// user and identity row on first contact.
    pub fn resolve(&self, channel: &str, identifier: &str) -> Result<ResolvedUser> {
        let db = self.db.lock().unwrap();
        let existing: Option<String> = db
            .query_row(
                "SELECT user_id FROM user_identities WHERE channel = ?1 AND identifier = ?2",
                params![channel, identifier],
                |row| row.get(0),
            )
            .optional()?;

        let user_id = match existing {
            Some(id) => id,
            None => {
                let user_id = Uuid::now_v7().to_string();
                let now = chrono::Utc::now().to_rfc3339();
                db.execute(
                    "INSERT INTO user_identities (id, user_id, channel, identifier, linked_at, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                    params![Uuid::now_v7().to_string(), user_id, channel, identifier, now],
                )?;
                user_id
            }
        };

        Ok(ResolvedUser { user: User { id: user_id } })
    }

    /// List every identity linked to a Relay user, oldest link first.
    pub fn list_identities(&self, user_id: &str) -> Result<Vec<Identity>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT channel, identifier, linked_at FROM user_identities
             WHERE user_id = ?1 ORDER BY linked_at ASC",
        )?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok(Identity {
                    channel: row.get(0)?,
                    identifier: row.get(1)?,
                    linked_at: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Re-point a `(channel, identifier)` pair at `target_user_id`, merging it
    /// in. Creates the identity row if it doesn't exist yet.
    pub fn self_link(&self, source_channel: &str, source_identifier: &str, target_user_id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        let existing: Option<String> = db
            .query_row(
                "SELECT id FROM user_identities WHERE channel = ?1 AND identifier = ?2",
                params![source_channel, source_identifier],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            Some(id) => {
                db.execute(
                    "UPDATE user_identities SET user_id = ?1, linked_at = ?2 WHERE id = ?3",
                    params![target_user_id, now, id],
                )?;
            }
            None => {
                db.execute(
                    "INSERT INTO user_identities (id, user_id, channel, identifier, linked_at, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                    params![
                        Uuid::now_v7().to_string(),
                        target_user_id,
                        source_channel,
                        source_identifier,
                        now
                    ],
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> UserResolver {
        UserResolver::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn resolve_creates_a_new_user_on_first_contact() {
        let r = resolver();
        let resolved = r.resolve("discord", "123").unwrap();
        assert!(!resolved.user().id.is_empty());
    }

    #[test]
    fn resolve_is_stable_across_calls() {
        let r = resolver();
        let first = r.resolve("discord", "123").unwrap();
        let second = r.resolve("discord", "123").unwrap();
        assert_eq!(first.user().id, second.user().id);
    }

    #[test]
    fn self_link_merges_a_second_channel_into_the_target_user() {
        let r = resolver();
        let discord_user = r.resolve("discord", "123").unwrap();
        let signal_user = r.resolve("signal", "+15551234567").unwrap();
        assert_ne!(discord_user.user().id, signal_user.user().id);

        r.self_link("signal", "+15551234567", &discord_user.user().id).unwrap();
        let merged = r.resolve("signal", "+15551234567").unwrap();
        assert_eq!(merged.user().id, discord_user.user().id);

        let identities = r.list_identities(&discord_user.user().id).unwrap();
        assert_eq!(identities.len(), 2);
    }

    #[test]
    fn list_identities_orders_oldest_first() {
        let r = resolver();
        let u = r.resolve("discord", "1").unwrap();
        r.self_link("signal", "+1", &u.user().id).unwrap();
        let identities = r.list_identities(&u.user().id).unwrap();
        assert_eq!(identities[0].channel, "discord");
        assert_eq!(identities[1].channel, "signal");
    }
}
