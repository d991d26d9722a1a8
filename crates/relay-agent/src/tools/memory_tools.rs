//! Thin wrappers over C4 (the memory store): `memory_search`, `memory_set`,
//! `memory_delete`.

use std::sync::Arc;
use std::str::FromStr;

use async_trait::async_trait;
use relay_core::types::PermissionLevel;
use relay_memory::types::{MemoryCategory, MemorySource};

use crate::pipeline::context::MessageContext;

use super::{Tool, ToolResult};

fn parse_category(input: &serde_json::Value) -> Result<MemoryCategory, ToolResult> {
    match input.get("category").and_then(|v| v.as_str()) {
        Some(c) => MemoryCategory::from_str(c)
            .map_err(|e| ToolResult::error(format!("invalid category: {e}"))),
        None => Err(ToolResult::error("missing required parameter: category")),
    }
}

// ---------------------------------------------------------------------------
// memory_search
// ---------------------------------------------------------------------------

pub struct MemorySearchTool<C: MessageContext + 'static> {
    ctx: Arc<C>,
}

impl<C: MessageContext + 'static> MemorySearchTool<C> {
    pub fn new(ctx: Arc<C>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl<C: MessageContext + 'static> Tool for MemorySearchTool<C> {
    fn name(&self) -> &str {
        "memory_search"
    }

    fn required_permission(&self) -> PermissionLevel {
        PermissionLevel::Trusted
    }

    fn description(&self) -> &str {
        "Search stored user memory (facts, preferences, instructions) by substring \
         match on key or value. Case-sensitive."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "user_id": {"type": "string", "description": "User to search memory for."},
                "query": {"type": "string", "description": "Substring to search for."}
            },
            "required": ["user_id", "query"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let user_id = match input.get("user_id").and_then(|v| v.as_str()) {
            Some(u) => u,
            None => return ToolResult::error("missing required parameter: user_id"),
        };
        let query = match input.get("query").and_then(|v| v.as_str()) {
            Some(q) => q,
            None => return ToolResult::error("missing required parameter: query"),
        };

        match self.ctx.memory().search(user_id, query, 10) {
            Ok(rows) if rows.is_empty() => ToolResult::success("No matching memories found."),
            Ok(rows) => {
                let mut out = String::new();
                for r in &rows {
                    out.push_str(&format!("[{}] {}: {}\n", r.category, r.key, r.value));
                }
                ToolResult::success(out)
            }
            Err(e) => ToolResult::error(format!("memory_search failed: {e}")),
        }
    }
}

// ---------------------------------------------------------------------------
// memory_set
// ---------------------------------------------------------------------------

pub struct MemorySetTool<C: MessageContext + 'static> {
    ctx: Arc<C>,
}

impl<C: MessageContext + 'static> MemorySetTool<C> {
    pub fn new(ctx: Arc<C>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl<C: MessageContext + 'static> Tool for MemorySetTool<C> {
    fn name(&self) -> &str {
        "memory_set"
    }

    fn required_permission(&self) -> PermissionLevel {
        PermissionLevel::Operator
    }

    fn description(&self) -> &str {
        "Store or update a user memory entry (instruction, preference, fact, or context)."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "user_id": {"type": "string"},
                "category": {"type": "string", "enum": ["instruction", "preference", "fact", "context"]},
                "key": {"type": "string"},
                "value": {"type": "string"}
            },
            "required": ["user_id", "category", "key", "value"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let user_id = match input.get("user_id").and_then(|v| v.as_str()) {
            Some(u) => u,
            None => return ToolResult::error("missing required parameter: user_id"),
        };
        let category = match parse_category(&input) {
            Ok(c) => c,
            Err(e) => return e,
        };
        let key = match input.get("key").and_then(|v| v.as_str()) {
            Some(k) => k,
            None => return ToolResult::error("missing required parameter: key"),
        };
        let value = match input.get("value").and_then(|v| v.as_str()) {
            Some(v) => v,
            None => return ToolResult::error("missing required parameter: value"),
        };

        match self
            .ctx
            .memory()
            .set(user_id, category, key, value, MemorySource::AdminSet)
        {
            Ok(()) => ToolResult::success(format!("Saved {key}.")),
            Err(e) => ToolResult::error(format!("memory_set failed: {e}")),
        }
    }
}

// ---------------------------------------------------------------------------
// memory_delete
// ---------------------------------------------------------------------------

pub struct MemoryDeleteTool<C: MessageContext + 'static> {
    ctx: Arc<C>,
}

impl<C: MessageContext + 'static> MemoryDeleteTool<C> {
    pub fn new(ctx: Arc<C>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl<C: MessageContext + 'static> Tool for MemoryDeleteTool<C> {
    fn name(&self) -> &str {
        "memory_delete"
    }

    fn required_permission(&self) -> PermissionLevel {
        PermissionLevel::Operator
    }

    fn description(&self) -> &str {
        "Delete a single user memory entry by category and key."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "user_id": {"type": "string"},
                "category": {"type": "string", "enum": ["instruction", "preference", "fact", "context"]},
                "key": {"type": "string"}
            },
            "required": ["user_id", "category", "key"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let user_id = match input.get("user_id").and_then(|v| v.as_str()) {
            Some(u) => u,
            None => return ToolResult::error("missing required parameter: user_id"),
        };
        let category = match parse_category(&input) {
            Ok(c) => c,
            Err(e) => return e,
        };
        let key = match input.get("key").and_then(|v| v.as_str()) {
            Some(k) => k,
            None => return ToolResult::error("missing required parameter: key"),
        };

        match self.ctx.memory().delete(user_id, category, key) {
            Ok(true) => ToolResult::success(format!("Deleted {key}.")),
            Ok(false) => ToolResult::success(format!("No entry found for {key}.")),
            Err(e) => ToolResult::error(format!("memory_delete failed: {e}")),
        }
    }
}
