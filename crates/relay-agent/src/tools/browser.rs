//! `browser` tool — out of scope per the spec's Non-goals. Registered so the
//! catalog and permission story stay uniform even though no automation backs
//! it; invoking it always returns a not-implemented error.

use std::sync::Arc;

use async_trait::async_trait;
use relay_core::types::PermissionLevel;

use crate::pipeline::context::MessageContext;

use super::{Tool, ToolResult};

pub struct BrowserTool<C: MessageContext + 'static> {
    #[allow(dead_code)]
    ctx: Arc<C>,
}

impl<C: MessageContext + 'static> BrowserTool<C> {
    pub fn new(ctx: Arc<C>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl<C: MessageContext + 'static> Tool for BrowserTool<C> {
    fn name(&self) -> &str {
        "browser"
    }

    fn required_permission(&self) -> PermissionLevel {
        PermissionLevel::Operator
    }

    fn description(&self) -> &str {
        "Not implemented. Browser automation is out of scope for this deployment."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {"type": "string"},
                "action": {"type": "string"}
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, _input: serde_json::Value) -> ToolResult {
        ToolResult::error("browser automation is not implemented in this deployment")
    }
}
