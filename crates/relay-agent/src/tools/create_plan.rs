//! `create_plan` tool — hands a goal to C10 (the plan engine) via the
//! [`crate::pipeline::context::PlanCreator`] seam and returns the new plan id.

use std::sync::Arc;

use async_trait::async_trait;
use relay_core::types::PermissionLevel;

use crate::pipeline::context::MessageContext;

use super::{Tool, ToolResult};

pub struct CreatePlanTool<C: MessageContext + 'static> {
    ctx: Arc<C>,
    channel: String,
}

impl<C: MessageContext + 'static> CreatePlanTool<C> {
    pub fn new(ctx: Arc<C>, channel: impl Into<String>) -> Self {
        Self { ctx, channel: channel.into() }
    }
}

#[async_trait]
impl<C: MessageContext + 'static> Tool for CreatePlanTool<C> {
    fn name(&self) -> &str {
        "create_plan"
    }

    fn required_permission(&self) -> PermissionLevel {
        PermissionLevel::Trusted
    }

    fn description(&self) -> &str {
        "Decompose a multi-step goal into a tracked plan. Returns the plan id; \
         use the scheduler or ask to execute it once reviewed."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "goal": {"type": "string", "description": "The goal to decompose into steps."},
                "context": {"type": "string", "description": "Optional extra context for the planner."}
            },
            "required": ["goal"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let goal = match input.get("goal").and_then(|v| v.as_str()) {
            Some(g) => g,
            None => return ToolResult::error("missing required parameter: goal"),
        };
        let context = input.get("context").and_then(|v| v.as_str()).unwrap_or("");

        match self.ctx.plan().create_plan(goal, &self.channel, context).await {
            Ok(plan_id) => ToolResult::success(format!("Created plan {plan_id}.")),
            Err(e) => ToolResult::error(format!("create_plan failed: {e}")),
        }
    }
}
