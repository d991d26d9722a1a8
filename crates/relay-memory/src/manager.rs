use std::collections::HashMap;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use crate::error::MemoryError;
use crate::types::*;

/// Maximum rendered context size in characters (~1500 tokens).
const MAX_CONTEXT_CHARS: usize = 6000;
/// Cache entries expire after 5 minutes.
const CACHE_TTL_SECS: i64 = 300;
/// Maximum cache entries before eviction.
const MAX_CACHE_ENTRIES: usize = 256;

/// Manages per-user memory and conversation history.
///
/// Thread-safe: wraps SQLite connection in Mutex and keeps an in-memory
/// cache of rendered UserContext to avoid rebuilding on every message.
pub struct MemoryManager {
    db: Mutex<Connection>,
    cache: Mutex<HashMap<String, UserContext>>,
}

impl MemoryManager {
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Store or update a memory entry. Higher confidence wins on conflict.
    /// Automatically syncs the FTS5 index.
    pub fn learn(
        &self,
        user_id: &str,
        category: MemoryCategory,
        key: &str,
        value: &str,
        confidence: f64,
        source: MemorySource,
    ) -> Result<(), MemoryError> {
        let db = self.db.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        let cat = category.to_string();
        let src = source.to_string();

        // Check existing confidence — only overwrite if new confidence >= old
        let existing: Option<(i64, f64)> = db
            .query_row(
                "SELECT id, confidence FROM user_memory
                 WHERE user_id = ?1 AND category = ?2 AND key = ?3",
                rusqlite::params![user_id, cat, key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .ok();

        match existing {
            Some((id, old_conf)) if confidence < old_conf => {
                debug!(
                    user_id,
                    key,
                    old_conf,
                    new_conf = confidence,
                    "skipping learn: existing confidence is higher"
                );
                return Ok(());
            }
            Some((id, _)) => {
                db.execute(
                    "UPDATE user_memory SET value = ?1, confidence = ?2, source = ?3,
                     updated_at = ?4 WHERE id = ?5",
                    rusqlite::params![value, confidence, src, now, id],
                )?;
                // Sync FTS: delete old, insert new
                db.execute(
                    "INSERT INTO user_memory_fts(user_memory_fts, rowid, key, value)
                     VALUES('delete', ?1, ?2, ?3)",
                    rusqlite::params![id, key, value],
                )?;
                db.execute(
                    "INSERT INTO user_memory_fts(rowid, key, value) VALUES(?1, ?2, ?3)",
                    rusqlite::params![id, key, value],
                )?;
            }
            None => {
                db.execute(
                    "INSERT INTO user_memory (user_id, category, key, value, confidence,
                     source, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                    rusqlite::params![user_id, cat, key, value, confidence, src, now],
                )?;
                let id = db.last_insert_rowid();
                db.execute(
                    "INSERT INTO user_memory_fts(rowid, key, value) VALUES(?1, ?2, ?3)",
                    rusqlite::params![id, key, value],
                )?;
            }
        }

        // Invalidate cached context for this user
        self.invalidate_cache(user_id);
        Ok(())
    }

    /// Delete a specific memory ("forget that I'm vegetarian").
    pub fn forget(
        &self,
        user_id: &str,
        category: MemoryCategory,
        key: &str,
    ) -> Result<(), MemoryError> {
        let db = self.db.lock().unwrap();
        let cat = category.to_string();

        // Get the row first for FTS cleanup
        let row: Option<(i64, String)> = db
            .query_row(
                "SELECT id, value FROM user_memory
                 WHERE user_id = ?1 AND category = ?2 AND key = ?3",
                rusqlite::params![user_id, cat, key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .ok();

        if let Some((id, value)) = row {
            db.execute(
                "INSERT INTO user_memory_fts(user_memory_fts, rowid, key, value)
                 VALUES('delete', ?1, ?2, ?3)",
                rusqlite::params![id, key, value],
            )?;
            db.execute(
                "DELETE FROM user_memory WHERE id = ?1",
                rusqlite::params![id],
            )?;
            self.invalidate_cache(user_id);
            Ok(())
        } else {
            Err(MemoryError::NotFound {
                category: cat,
                key: key.to_string(),
            })
        }
    }

    /// Substring search (case-sensitive, `LIKE`-style) over key or value,
    /// most-recently-updated first. `user_id = "*"` searches across all users.
    pub fn search(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<UserMemory>, MemoryError> {
        let db = self.db.lock().unwrap();
        let rows = if user_id == "*" {
            let mut stmt = db.prepare(
                "SELECT id, user_id, category, key, value, confidence,
                        source, expires_at, created_at, updated_at
                 FROM user_memory
                 WHERE (key GLOB ?1 OR value GLOB ?1)
                 ORDER BY updated_at DESC
                 LIMIT ?2",
            )?;
            let glob = format!("*{query}*");
            stmt.query_map(rusqlite::params![glob, limit], row_to_memory)?
                .filter_map(|r| r.ok())
                .collect()
        } else {
            let mut stmt = db.prepare(
                "SELECT id, user_id, category, key, value, confidence,
                        source, expires_at, created_at, updated_at
                 FROM user_memory
                 WHERE user_id = ?1 AND (key GLOB ?2 OR value GLOB ?2)
                 ORDER BY updated_at DESC
                 LIMIT ?3",
            )?;
            let glob = format!("*{query}*");
            stmt.query_map(rusqlite::params![user_id, glob, limit], row_to_memory)?
                .filter_map(|r| r.ok())
                .collect()
        };
        Ok(rows)
    }

    /// Upsert a memory entry, preserving `created_at` on update (unlike
    /// [`MemoryManager::learn`], this never compares confidence — an explicit
    /// `set` always wins).
    pub fn set(
        &self,
        user_id: &str,
        category: MemoryCategory,
        key: &str,
        value: &str,
        source: MemorySource,
    ) -> Result<(), MemoryError> {
        let db = self.db.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        let cat = category.to_string();
        let src = source.to_string();

        let existing: Option<i64> = db
            .query_row(
                "SELECT id FROM user_memory WHERE user_id = ?1 AND category = ?2 AND key = ?3",
                rusqlite::params![user_id, cat, key],
                |row| row.get(0),
            )
            .ok();

        match existing {
            Some(id) => {
                db.execute(
                    "UPDATE user_memory SET value = ?1, source = ?2, confidence = 1.0,
                     updated_at = ?3 WHERE id = ?4",
                    rusqlite::params![value, src, now, id],
                )?;
                db.execute(
                    "INSERT INTO user_memory_fts(user_memory_fts, rowid, key, value)
                     VALUES('delete', ?1, ?2, ?3)",
                    rusqlite::params![id, key, value],
                )?;
                db.execute(
                    "INSERT INTO user_memory_fts(rowid, key, value) VALUES(?1, ?2, ?3)",
                    rusqlite::params![id, key, value],
                )?;
            }
            None => {
                db.execute(
                    "INSERT INTO user_memory (user_id, category, key, value, confidence,
                     source, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, 1.0, ?5, ?6, ?6)",
                    rusqlite::params![user_id, cat, key, value, src, now],
                )?;
                let id = db.last_insert_rowid();
                db.execute(
                    "INSERT INTO user_memory_fts(rowid, key, value) VALUES(?1, ?2, ?3)",
                    rusqlite::params![id, key, value],
                )?;
            }
        }
        drop(db);
        self.invalidate_cache(user_id);
        Ok(())
    }

    /// Fetch a single memory entry by its (user, category, key) triple.
    pub fn get(
        &self,
        user_id: &str,
        category: MemoryCategory,
        key: &str,
    ) -> Result<Option<UserMemory>, MemoryError> {
        let db = self.db.lock().unwrap();
        let cat = category.to_string();
        let row = db
            .query_row(
                "SELECT id, user_id, category, key, value, confidence,
                        source, expires_at, created_at, updated_at
                 FROM user_memory WHERE user_id = ?1 AND category = ?2 AND key = ?3",
                rusqlite::params![user_id, cat, key],
                row_to_memory,
            )
            .optional()?;
        Ok(row)
    }

    /// Delete a single entry. Returns `true` if a row was removed.
    pub fn delete(
        &self,
        user_id: &str,
        category: MemoryCategory,
        key: &str,
    ) -> Result<bool, MemoryError> {
        let db = self.db.lock().unwrap();
        let cat = category.to_string();
        let row: Option<(i64, String)> = db
            .query_row(
                "SELECT id, value FROM user_memory
                 WHERE user_id = ?1 AND category = ?2 AND key = ?3",
                rusqlite::params![user_id, cat, key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .ok();
        let Some((id, value)) = row else {
            return Ok(false);
        };
        db.execute(
            "INSERT INTO user_memory_fts(user_memory_fts, rowid, key, value)
             VALUES('delete', ?1, ?2, ?3)",
            rusqlite::params![id, key, value],
        )?;
        db.execute(
            "DELETE FROM user_memory WHERE id = ?1",
            rusqlite::params![id],
        )?;
        drop(db);
        self.invalidate_cache(user_id);
        Ok(true)
    }

    /// List every entry in a category, most-recently-updated first.
    pub fn list_category(
        &self,
        user_id: &str,
        category: MemoryCategory,
    ) -> Result<Vec<UserMemory>, MemoryError> {
        let db = self.db.lock().unwrap();
        let cat = category.to_string();
        let mut stmt = db.prepare(
            "SELECT id, user_id, category, key, value, confidence,
                    source, expires_at, created_at, updated_at
             FROM user_memory
             WHERE user_id = ?1 AND category = ?2
             ORDER BY updated_at DESC",
        )?;
        let rows = stmt.query_map(rusqlite::params![user_id, cat], row_to_memory)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Delete every entry for a user. Returns the number of rows removed.
    pub fn clear(&self, user_id: &str) -> Result<usize, MemoryError> {
        let db = self.db.lock().unwrap();
        let ids: Vec<i64> = {
            let mut stmt = db.prepare("SELECT id FROM user_memory WHERE user_id = ?1")?;
            stmt.query_map(rusqlite::params![user_id], |row| row.get(0))?
                .filter_map(|r| r.ok())
                .collect()
        };
        for id in &ids {
            let _ = db.execute(
                "INSERT INTO user_memory_fts(user_memory_fts, rowid, key, value)
                 SELECT 'delete', id, key, value FROM user_memory WHERE id = ?1",
                rusqlite::params![id],
            );
        }
        let n = db.execute(
            "DELETE FROM user_memory WHERE user_id = ?1",
            rusqlite::params![user_id],
        )?;
        drop(db);
        self.invalidate_cache(user_id);
        Ok(n)
    }

    /// Render every memory for a user as `[category] key: value` lines,
    /// ordered by category then key, stopping once the next line would push
    /// past `max_tokens * 4` characters (a rough 4-chars-per-token budget).
    pub fn export_context(&self, user_id: &str, max_tokens: u32) -> Result<String, MemoryError> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, user_id, category, key, value, confidence,
                    source, expires_at, created_at, updated_at
             FROM user_memory
             WHERE user_id = ?1
             ORDER BY category, key",
        )?;
        let memories: Vec<UserMemory> = stmt
            .query_map(rusqlite::params![user_id], row_to_memory)?
            .filter_map(|r| r.ok())
            .collect();

        let budget = (max_tokens as usize) * 4;
        let mut out = String::new();
        for mem in &memories {
            let line = format!("[{}] {}: {}\n", mem.category, mem.key, mem.value);
            if out.len() + line.len() > budget {
                break;
            }
            out.push_str(&line);
        }
        Ok(out)
    }

    /// Load all memories for a user and render into a prompt section.
    /// Results are cached for 5 minutes to avoid repeated DB hits.
    pub fn build_user_context(&self, user_id: &str) -> Result<UserContext, MemoryError> {
        // Check cache first
        if let Some(cached) = self.get_cached(user_id) {
            return Ok(cached);
        }

        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, user_id, category, key, value, confidence,
                    source, expires_at, created_at, updated_at
             FROM user_memory
             WHERE user_id = ?1 AND (expires_at IS NULL OR expires_at > ?2)
             ORDER BY
                CASE category
                    WHEN 'instruction' THEN 0
                    WHEN 'preference' THEN 1
                    WHEN 'fact' THEN 2
                    WHEN 'context' THEN 3
                END,
                confidence DESC",
        )?;
        let now = chrono::Utc::now().to_rfc3339();
        let memories: Vec<UserMemory> = stmt
            .query_map(rusqlite::params![user_id, now], row_to_memory)?
            .filter_map(|r| r.ok())
            .collect();

        let rendered = render_context(&memories);
        let ctx = UserContext {
            user_id: user_id.to_string(),
            rendered,
            memory_count: memories.len(),
            built_at: chrono::Utc::now(),
        };

        // Store in cache
        let mut cache = self.cache.lock().unwrap();
        if cache.len() >= MAX_CACHE_ENTRIES {
            // Evict oldest entry
            let oldest_key = cache
                .iter()
                .min_by_key(|(_, v)| v.built_at)
                .map(|(k, _)| k.clone());
            if let Some(k) = oldest_key {
                cache.remove(&k);
            }
        }
        cache.insert(user_id.to_string(), ctx.clone());
        Ok(ctx)
    }

    /// Store a conversation message for history and cost tracking.
    pub fn save_message(&self, msg: &ConversationMessage) -> Result<(), MemoryError> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO conversations
             (user_id, session_key, channel, role, content, model_used,
              tokens_in, tokens_out, cost_usd, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rusqlite::params![
                msg.user_id,
                msg.session_key,
                msg.channel,
                msg.role,
                msg.content,
                msg.model_used,
                msg.tokens_in,
                msg.tokens_out,
                msg.cost_usd,
                msg.created_at,
            ],
        )?;
        Ok(())
    }

    /// Retrieve recent conversation history for a session.
    pub fn get_history(
        &self,
        session_key: &str,
        limit: usize,
    ) -> Result<Vec<ConversationMessage>, MemoryError> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, user_id, session_key, channel, role, content,
                    model_used, tokens_in, tokens_out, cost_usd, created_at
             FROM conversations
             WHERE session_key = ?1
             ORDER BY created_at DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![session_key, limit], |row| {
            Ok(ConversationMessage {
                id: row.get(0)?,
                user_id: row.get(1)?,
                session_key: row.get(2)?,
                channel: row.get(3)?,
                role: row.get(4)?,
                content: row.get(5)?,
                model_used: row.get(6)?,
                tokens_in: row.get(7)?,
                tokens_out: row.get(8)?,
                cost_usd: row.get(9)?,
                created_at: row.get(10)?,
            })
        })?;
        // Reverse so oldest first
        let mut msgs: Vec<_> = rows.filter_map(|r| r.ok()).collect();
        msgs.reverse();
        Ok(msgs)
    }

    /// Count conversation turns stored for a session.
    pub fn count_turns(&self, session_key: &str) -> Result<usize, MemoryError> {
        let db = self.db.lock().unwrap();
        let count: i64 = db.query_row(
            "SELECT COUNT(*) FROM conversations WHERE session_key = ?1",
            rusqlite::params![session_key],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Retrieve the oldest `limit` turns for a session, ascending order.
    ///
    /// Used by compaction (`pipeline::compact`) to pick the batch to
    /// summarize-and-delete, and by the token-bounded context fit
    /// (`pipeline::fit`) to find the older half of a session's history.
    pub fn get_oldest_turns(
        &self,
        session_key: &str,
        limit: usize,
    ) -> Result<Vec<ConversationMessage>, MemoryError> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, user_id, session_key, channel, role, content,
                    model_used, tokens_in, tokens_out, cost_usd, created_at
             FROM conversations
             WHERE session_key = ?1
             ORDER BY created_at ASC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![session_key, limit], |row| {
            Ok(ConversationMessage {
                id: row.get(0)?,
                user_id: row.get(1)?,
                session_key: row.get(2)?,
                channel: row.get(3)?,
                role: row.get(4)?,
                content: row.get(5)?,
                model_used: row.get(6)?,
                tokens_in: row.get(7)?,
                tokens_out: row.get(8)?,
                cost_usd: row.get(9)?,
                created_at: row.get(10)?,
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Delete specific conversation rows by id. Returns the number removed.
    ///
    /// Used to drop turns that have been folded into an extracted-fact
    /// (compaction) or synthetic summary (context fit).
    pub fn delete_turns(&self, ids: &[i64]) -> Result<usize, MemoryError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let db = self.db.lock().unwrap();
        let placeholders = std::iter::repeat("?")
            .take(ids.len())
            .collect::<Vec<_>>()
            .join(",");
        let sql = format!("DELETE FROM conversations WHERE id IN ({placeholders})");
        let params = rusqlite::params_from_iter(ids.iter());
        let deleted = db.execute(&sql, params)?;
        Ok(deleted)
    }

    /// Bulk-delete every turn belonging to a session. Returns the number removed.
    ///
    /// Backs the `/forget` slash command (C3 `forget(transport, channel)`).
    /// Channel identity is folded into `session_key` under the user-centric
    /// session design, so this clears one user's history on one channel.
    pub fn forget(&self, session_key: &str) -> Result<usize, MemoryError> {
        let db = self.db.lock().unwrap();
        let deleted = db.execute(
            "DELETE FROM conversations WHERE session_key = ?1",
            rusqlite::params![session_key],
        )?;
        Ok(deleted)
    }

    /// Turn count and total character count for a session.
    ///
    /// Backs the `/context` slash command (C3 `stats(transport, channel)`).
    pub fn stats(&self, session_key: &str) -> Result<(usize, usize), MemoryError> {
        let db = self.db.lock().unwrap();
        let (count, total_chars): (i64, Option<i64>) = db.query_row(
            "SELECT COUNT(*), SUM(LENGTH(content)) FROM conversations WHERE session_key = ?1",
            rusqlite::params![session_key],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((count as usize, total_chars.unwrap_or(0) as usize))
    }

    /// Record a tool invocation for hot-topic tracking. Transparent to the AI.
    pub fn log_tool_call(&self, tool_name: &str, session_key: &str) -> Result<(), MemoryError> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO tool_usage (tool_name, session_key, created_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![tool_name, session_key, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Most frequently invoked tool names over the last `days` days.
    pub fn get_top_tools(&self, days: u32, limit: usize) -> Result<Vec<String>, MemoryError> {
        let db = self.db.lock().unwrap();
        let since = (chrono::Utc::now() - chrono::Duration::days(days as i64)).to_rfc3339();
        let mut stmt = db.prepare(
            "SELECT tool_name, COUNT(*) as uses FROM tool_usage
             WHERE created_at >= ?1
             GROUP BY tool_name
             ORDER BY uses DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![since, limit], |row| row.get::<_, String>(0))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Knowledge entries whose topic or tags overlap with the given tool names.
    /// Falls back to the most recently updated entries when no overlap is found.
    pub fn get_hot_topics(
        &self,
        top_tools: &[String],
        limit: usize,
    ) -> Result<Vec<KnowledgeEntry>, MemoryError> {
        let db = self.db.lock().unwrap();
        if top_tools.is_empty() {
            return Ok(Vec::new());
        }
        let pattern = top_tools.join(" OR ");
        let mut stmt = db.prepare(
            "SELECT k.id, k.topic, k.content, k.tags, k.created_at, k.updated_at
             FROM knowledge k
             JOIN knowledge_fts f ON k.id = f.rowid
             WHERE knowledge_fts MATCH ?1
             ORDER BY rank
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![pattern, limit], row_to_knowledge);
        let entries: Vec<KnowledgeEntry> = match rows {
            Ok(rows) => rows.filter_map(|r| r.ok()).collect(),
            Err(_) => Vec::new(),
        };
        if !entries.is_empty() {
            return Ok(entries);
        }

        // No FTS match (e.g. tool names don't appear verbatim in any entry) —
        // fall back to the most recently touched entries so the index isn't empty.
        let mut stmt = db.prepare(
            "SELECT id, topic, content, tags, created_at, updated_at
             FROM knowledge
             ORDER BY updated_at DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(rusqlite::params![limit], row_to_knowledge)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Full-text search over the knowledge base.
    pub fn knowledge_search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<KnowledgeEntry>, MemoryError> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT k.id, k.topic, k.content, k.tags, k.created_at, k.updated_at
             FROM knowledge k
             JOIN knowledge_fts f ON k.id = f.rowid
             WHERE knowledge_fts MATCH ?1
             ORDER BY rank
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![query, limit], row_to_knowledge)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Upsert a knowledge base entry by topic, keeping the FTS5 index in sync.
    pub fn knowledge_write(&self, topic: &str, content: &str, tags: &str) -> Result<(), MemoryError> {
        let db = self.db.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();

        let existing: Option<i64> = db
            .query_row(
                "SELECT id FROM knowledge WHERE topic = ?1",
                rusqlite::params![topic],
                |row| row.get(0),
            )
            .ok();

        let id = match existing {
            Some(id) => {
                db.execute(
                    "UPDATE knowledge SET content = ?1, tags = ?2, updated_at = ?3 WHERE id = ?4",
                    rusqlite::params![content, tags, now, id],
                )?;
                db.execute(
                    "INSERT INTO knowledge_fts(knowledge_fts, rowid, topic, content, tags)
                     VALUES('delete', ?1, ?2, ?3, ?4)",
                    rusqlite::params![id, topic, content, tags],
                )?;
                id
            }
            None => {
                db.execute(
                    "INSERT INTO knowledge (topic, content, tags, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)",
                    rusqlite::params![topic, content, tags, now],
                )?;
                db.last_insert_rowid()
            }
        };
        db.execute(
            "INSERT INTO knowledge_fts(rowid, topic, content, tags) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![id, topic, content, tags],
        )?;
        Ok(())
    }

    fn get_cached(&self, user_id: &str) -> Option<UserContext> {
        let cache = self.cache.lock().unwrap();
        let ctx = cache.get(user_id)?;
        let age = chrono::Utc::now()
            .signed_duration_since(ctx.built_at)
            .num_seconds();
        if age < CACHE_TTL_SECS {
            Some(ctx.clone())
        } else {
            None
        }
    }

    fn invalidate_cache(&self, user_id: &str) {
        let mut cache = self.cache.lock().unwrap();
        cache.remove(user_id);
    }
}

/// Render memories into a text block for prompt injection.
/// Priority: instruction > preference > fact > context.
/// Truncates to MAX_CONTEXT_CHARS.
fn render_context(memories: &[UserMemory]) -> String {
    let mut out = String::with_capacity(MAX_CONTEXT_CHARS);
    let mut current_cat = String::new();

    for mem in memories {
        let cat = mem.category.to_string();
        if cat != current_cat {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("## {}\n", capitalize(&cat)));
            current_cat = cat;
        }
        let line = format!("- {}: {}\n", mem.key, mem.value);
        if out.len() + line.len() > MAX_CONTEXT_CHARS {
            break;
        }
        out.push_str(&line);
    }
    out
}

fn capitalize(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().to_string() + c.as_str(),
    }
}

fn row_to_knowledge(row: &rusqlite::Row<'_>) -> rusqlite::Result<KnowledgeEntry> {
    Ok(KnowledgeEntry {
        id: row.get(0)?,
        topic: row.get(1)?,
        content: row.get(2)?,
        tags: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn row_to_memory(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserMemory> {
    let cat_str: String = row.get(2)?;
    let src_str: String = row.get(6)?;
    Ok(UserMemory {
        id: row.get(0)?,
        user_id: row.get(1)?,
        category: cat_str.parse().unwrap_or(MemoryCategory::Context),
        key: row.get(3)?,
        value: row.get(4)?,
        confidence: row.get(5)?,
        source: src_str.parse().unwrap_or(MemorySource::Inferred),
        expires_at: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;

    fn manager() -> MemoryManager {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        MemoryManager::new(conn)
    }

    #[test]
    fn counts_turns_for_a_session() {
        let mgr = manager();
        assert_eq!(mgr.count_turns("discord:general").unwrap(), 0);
        mgr.save_message(&ConversationMessage {
            id: 0,
            user_id: None,
            session_key: "discord:general".into(),
            channel: "discord".into(),
            role: "user".into(),
            content: "hi".into(),
            model_used: None,
            tokens_in: 0,
            tokens_out: 0,
            cost_usd: 0.0,
            created_at: chrono::Utc::now().to_rfc3339(),
        })
        .unwrap();
        assert_eq!(mgr.count_turns("discord:general").unwrap(), 1);
    }

    #[test]
    fn knowledge_write_then_search_round_trips() {
        let mgr = manager();
        mgr.knowledge_write("claude_models", "Sonnet and Opus are available.", "ai,models")
            .unwrap();
        let found = mgr.knowledge_search("sonnet", 5).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].topic, "claude_models");

        // Overwrite — same topic, new content.
        mgr.knowledge_write("claude_models", "Opus only now.", "ai,models")
            .unwrap();
        let found = mgr.knowledge_search("opus", 5).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].content, "Opus only now.");
    }

    #[test]
    fn top_tools_ranks_by_frequency() {
        let mgr = manager();
        for _ in 0..3 {
            mgr.log_tool_call("search_files", "discord:general").unwrap();
        }
        mgr.log_tool_call("write_file", "discord:general").unwrap();
        let top = mgr.get_top_tools(30, 5).unwrap();
        assert_eq!(top.first().map(String::as_str), Some("search_files"));
    }

    #[test]
    fn hot_topics_falls_back_when_no_match() {
        let mgr = manager();
        mgr.knowledge_write("unrelated", "nothing to do with tools", "misc")
            .unwrap();
        let hot = mgr
            .get_hot_topics(&["search_files".to_string()], 5)
            .unwrap();
        assert_eq!(hot.len(), 1);
        assert_eq!(hot[0].topic, "unrelated");
    }
}

    #[test]
    fn set_preserves_created_at_on_update() {
        let mgr = manager();
        mgr.set("u1", MemoryCategory::Fact, "diet", "vegetarian", MemorySource::UserSaid)
            .unwrap();
        let first = mgr.get("u1", MemoryCategory::Fact, "diet").unwrap().unwrap();

        mgr.set("u1", MemoryCategory::Fact, "diet", "vegan", MemorySource::UserSaid)
            .unwrap();
        let second = mgr.get("u1", MemoryCategory::Fact, "diet").unwrap().unwrap();

        assert_eq!(second.value, "vegan");
        assert_eq!(second.created_at, first.created_at);
    }

    #[test]
    fn delete_reports_whether_a_row_was_removed() {
        let mgr = manager();
        assert!(!mgr.delete("u1", MemoryCategory::Fact, "nope").unwrap());
        mgr.set("u1", MemoryCategory::Fact, "k", "v", MemorySource::UserSaid)
            .unwrap();
        assert!(mgr.delete("u1", MemoryCategory::Fact, "k").unwrap());
        assert!(mgr.get("u1", MemoryCategory::Fact, "k").unwrap().is_none());
    }

    #[test]
    fn list_category_orders_most_recently_updated_first() {
        let mgr = manager();
        mgr.set("u1", MemoryCategory::Fact, "a", "1", MemorySource::UserSaid)
            .unwrap();
        mgr.set("u1", MemoryCategory::Fact, "b", "2", MemorySource::UserSaid)
            .unwrap();
        mgr.set("u1", MemoryCategory::Fact, "b", "2-updated", MemorySource::UserSaid)
            .unwrap();
        let list = mgr.list_category("u1", MemoryCategory::Fact).unwrap();
        assert_eq!(list[0].key, "b");
    }

    #[test]
    fn clear_removes_everything_and_returns_count() {
        let mgr = manager();
        mgr.set("u1", MemoryCategory::Fact, "a", "1", MemorySource::UserSaid)
            .unwrap();
        mgr.set("u1", MemoryCategory::Preference, "b", "2", MemorySource::UserSaid)
            .unwrap();
        let n = mgr.clear("u1").unwrap();
        assert_eq!(n, 2);
        assert!(mgr.list_category("u1", MemoryCategory::Fact).unwrap().is_empty());
    }

    #[test]
    fn export_context_orders_by_category_then_key() {
        let mgr = manager();
        mgr.set("u1", MemoryCategory::Preference, "theme", "dark", MemorySource::UserSaid)
            .unwrap();
        mgr.set("u1", MemoryCategory::Fact, "diet", "vegan", MemorySource::UserSaid)
            .unwrap();
        let rendered = mgr.export_context("u1", 1000).unwrap();
        let fact_pos = rendered.find("[fact]").unwrap();
        let pref_pos = rendered.find("[preference]").unwrap();
        assert!(fact_pos < pref_pos, "fact should sort before preference");
    }

    #[test]
    fn export_context_stops_at_token_budget() {
        let mgr = manager();
        for i in 0..50 {
            mgr.set(
                "u1",
                MemoryCategory::Fact,
                &format!("k{i}"),
                &"x".repeat(50),
                MemorySource::UserSaid,
            )
            .unwrap();
        }
        let rendered = mgr.export_context("u1", 20).unwrap();
        assert!(rendered.len() <= 80);
    }

    #[test]
    fn search_is_case_sensitive_substring() {
        let mgr = manager();
        mgr.set("u1", MemoryCategory::Fact, "City", "Seattle", MemorySource::UserSaid)
            .unwrap();
        assert_eq!(mgr.search("u1", "Seattle", 5).unwrap().len(), 1);
        assert_eq!(mgr.search("u1", "seattle", 5).unwrap().len(), 0);
    }
}
