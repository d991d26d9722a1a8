//! `schedule_job` tool — thin wrapper over C5's scheduler CRUD.

use std::sync::Arc;

use async_trait::async_trait;
use relay_core::types::PermissionLevel;
use relay_scheduler::Schedule;

use crate::pipeline::context::MessageContext;

use super::{Tool, ToolResult};

pub struct ScheduleJobTool<C: MessageContext + 'static> {
    ctx: Arc<C>,
}

impl<C: MessageContext + 'static> ScheduleJobTool<C> {
    pub fn new(ctx: Arc<C>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl<C: MessageContext + 'static> Tool for ScheduleJobTool<C> {
    fn name(&self) -> &str {
        "schedule_job"
    }

    fn required_permission(&self) -> PermissionLevel {
        PermissionLevel::Operator
    }

    fn description(&self) -> &str {
        "Create a scheduled job. `schedule` is a tagged object matching one of: \
         {\"kind\":\"once\",\"at\":<rfc3339>}, {\"kind\":\"interval\",\"every_secs\":<u64>}, \
         {\"kind\":\"daily\",\"hour\":<u8>,\"minute\":<u8>}, \
         {\"kind\":\"weekly\",\"day\":<0-6>,\"hour\":<u8>,\"minute\":<u8>}, \
         {\"kind\":\"cron\",\"expression\":<5 or 6 field cron string>}."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "description": "Unique job name."},
                "schedule": {"type": "object", "description": "Tagged schedule object, see description."},
                "action": {"type": "string", "description": "Arbitrary payload forwarded to the job handler."}
            },
            "required": ["name", "schedule", "action"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let name = match input.get("name").and_then(|v| v.as_str()) {
            Some(n) => n,
            None => return ToolResult::error("missing required parameter: name"),
        };
        let action = match input.get("action").and_then(|v| v.as_str()) {
            Some(a) => a,
            None => return ToolResult::error("missing required parameter: action"),
        };
        let schedule: Schedule = match input.get("schedule") {
            Some(v) => match serde_json::from_value(v.clone()) {
                Ok(s) => s,
                Err(e) => return ToolResult::error(format!("invalid schedule: {e}")),
            },
            None => return ToolResult::error("missing required parameter: schedule"),
        };

        match self.ctx.scheduler().add_job(name, schedule, action) {
            Ok(job) => ToolResult::success(format!("Created job '{}' (id {}).", job.name, job.id)),
            Err(e) => ToolResult::error(format!("schedule_job failed: {e}")),
        }
    }
}
