//! Plan creation, execution, and persistence.
//!
//! Flow: an operator asks for something multi-step → `create_plan` asks the
//! LLM to decompose it into 2-8 concrete steps → `execute_plan` runs each
//! step (tool call or pure reasoning), persisting progress after every step
//! so a crash mid-plan leaves a resumable record instead of a dangling one.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::{info, warn};
use uuid::Uuid;

use relay_agent::provider::{ChatRequest, LlmProvider, Message, Role};
use relay_agent::tools::Tool;
use relay_core::types::PermissionLevel;

use crate::db;
use crate::error::Result;
use crate::types::{FailureAction, Plan, PlanStatus, PlanStep, StepStatus};

/// Hard cap on steps a single plan may contain.
pub const MAX_STEPS: usize = 8;
/// Hard cap on tool invocations across a plan's execution — remaining steps
/// are marked skipped once this budget is exhausted.
pub const MAX_TOOL_INVOCATIONS: usize = 15;

const CREATE_PLAN_PROMPT: &str = "Decompose the following goal into 2-8 concrete steps. Each \
step should be a single action. For steps that use a tool, specify the tool name. For \
reasoning/analysis steps, set tool to null.\n\n\
Available tools: {tools}\n\n\
Respond with ONLY a JSON object:\n\
{{\"steps\": [{{\"description\": \"...\", \"tool\": \"tool_name_or_null\"}}]}}\n\n\
Goal: {goal}\n\n\
Context: {context}";

const FAILURE_PROMPT: &str = "Step {step_id} failed with error: {error}\n\n\
Current plan state:\n{plan_state}\n\n\
Should we retry this step, skip it, or abort the plan?\n\
Respond with ONLY a JSON object: {{\"action\": \"retry\" | \"skip\" | \"abort\"}}";

/// Callback invoked after each step completes, `(transport, channel, text)`.
pub type ProgressFn =
    Box<dyn Fn(String, String, String) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct PlanEngine {
    llm: Box<dyn LlmProvider>,
    tools: HashMap<String, Box<dyn Tool>>,
    model: String,
    db: Mutex<Connection>,
}

impl PlanEngine {
    pub fn open(
        llm: Box<dyn LlmProvider>,
        tools: Vec<Box<dyn Tool>>,
        model: impl Into<String>,
        conn: Connection,
    ) -> Result<Self> {
        db::init_db(&conn)?;
        let tool_map = tools.into_iter().map(|t| (t.name().to_string(), t)).collect();
        Ok(Self {
            llm,
            tools: tool_map,
            model: model.into(),
            db: Mutex::new(conn),
        })
    }

    pub fn save_plan(&self, plan: &Plan) -> Result<()> {
        db::save_plan(&self.db.lock().unwrap(), plan)
    }

    pub fn load_plan(&self, plan_id: &str) -> Result<Option<Plan>> {
        db::load_plan(&self.db.lock().unwrap(), plan_id)
    }

    pub fn list_pending(&self) -> Result<Vec<Plan>> {
        db::list_pending(&self.db.lock().unwrap())
    }

    /// Ask the LLM to decompose `goal` into a bounded step list and persist
    /// the new plan in `planning` status.
    pub async fn create_plan(
        &self,
        goal: &str,
        channel: &str,
        context: &str,
    ) -> Result<Plan> {
        let tool_names = if self.tools.is_empty() {
            "none".to_string()
        } else {
            self.tools.keys().cloned().collect::<Vec<_>>().join(", ")
        };
        let prompt = CREATE_PLAN_PROMPT
            .replace("{tools}", &tool_names)
            .replace("{goal}", goal)
            .replace(
                "{context}",
                if context.is_empty() {
                    "No additional context."
                } else {
                    context
                },
            );

        let content = self.complete(&prompt, 1024).await;
        let steps = parse_steps(content.as_deref().unwrap_or(""));

        let plan = Plan::new(
            format!("{:.12}", Uuid::now_v7().simple()),
            goal.to_string(),
            steps,
            channel.to_string(),
        );
        self.save_plan(&plan)?;
        Ok(plan)
    }

    /// Execute every step in order, persisting after each one. Stops early
    /// if a step's failure handler decides to abort, or once the plan's
    /// tool-invocation budget is exhausted (remaining steps are skipped).
    pub async fn execute_plan(
        &self,
        mut plan: Plan,
        user_level: PermissionLevel,
        progress: Option<&ProgressFn>,
    ) -> Result<Plan> {
        plan.status = PlanStatus::Executing;
        let mut tool_invocations = 0usize;
        let total = plan.steps.len();

        let mut idx = 0;
        while idx < plan.steps.len() {
            if tool_invocations >= MAX_TOOL_INVOCATIONS {
                plan.steps[idx].status = StepStatus::Skipped;
                plan.steps[idx].error = Some("tool invocation cap reached".to_string());
                idx += 1;
                continue;
            }

            plan.steps[idx].status = StepStatus::Running;
            plan.updated_at = chrono::Utc::now();
            self.save_plan(&plan)?;

            let retried = self.run_step(&mut plan, idx, user_level, &mut tool_invocations).await;

            if plan.steps[idx].status == StepStatus::Failed {
                let action = self.handle_failure(&plan, idx).await;
                match action {
                    FailureAction::Abort => {
                        plan.status = PlanStatus::Failed;
                        break;
                    }
                    FailureAction::Skip => {
                        plan.steps[idx].status = StepStatus::Skipped;
                    }
                    FailureAction::Retry if !retried => {
                        self.run_step(&mut plan, idx, user_level, &mut tool_invocations)
                            .await;
                        if plan.steps[idx].status == StepStatus::Failed {
                            plan.steps[idx].status = StepStatus::Skipped;
                        }
                    }
                    FailureAction::Retry => {
                        // already retried once for this step; don't loop forever
                        plan.steps[idx].status = StepStatus::Skipped;
                    }
                }
            }

            if let Some(cb) = progress {
                if let Some((transport, chan)) = plan.channel.split_once(':') {
                    let done = plan.done_count();
                    let step = &plan.steps[idx];
                    let icon = match step.status {
                        StepStatus::Done => "+",
                        StepStatus::Failed => "x",
                        _ => "~",
                    };
                    let text = format!(
                        "Step {}/{total} {}: {} [{icon}]",
                        step.id, step.status, step.description
                    );
                    let _ = done;
                    cb(transport.to_string(), chan.to_string(), text).await;
                }
            }

            idx += 1;
        }

        if plan.status != PlanStatus::Failed {
            plan.status = PlanStatus::Completed;
        }
        plan.updated_at = chrono::Utc::now();
        self.save_plan(&plan)?;
        Ok(plan)
    }

    /// Run a single step in place. Returns `true` if this call was itself a
    /// retry (used so the caller only retries once per step).
    async fn run_step(
        &self,
        plan: &mut Plan,
        idx: usize,
        user_level: PermissionLevel,
        tool_invocations: &mut usize,
    ) -> bool {
        let step_id = plan.steps[idx].id;
        let description = plan.steps[idx].description.clone();
        let tool_name = plan.steps[idx].tool.clone();

        match tool_name {
            None => {
                let summary = self.summarize_results(plan);
                let prompt = format!(
                    "Plan goal: {}\nCurrent step: {description}\nPrevious results: {summary}",
                    plan.goal
                );
                let content = self.complete(&prompt, 512).await;
                let step = &mut plan.steps[idx];
                step.status = StepStatus::Done;
                step.result = content;
            }
            Some(name) => {
                let Some(tool) = self.tools.get(&name) else {
                    let step = &mut plan.steps[idx];
                    step.status = StepStatus::Failed;
                    step.error = Some(format!("unknown tool: {name}"));
                    return false;
                };

                if user_level < tool.required_permission() {
                    let step = &mut plan.steps[idx];
                    step.status = StepStatus::Failed;
                    step.error = Some(format!("permission denied for {name}"));
                    return false;
                }

                let result = tool
                    .execute(serde_json::json!({ "command": description }))
                    .await;
                *tool_invocations += 1;

                let step = &mut plan.steps[idx];
                if result.is_error {
                    step.status = StepStatus::Failed;
                    step.error = Some(result.content);
                } else {
                    step.status = StepStatus::Done;
                    step.result = Some(result.content);
                }
            }
        }

        info!(step = step_id, status = %plan.steps[idx].status, "plan step finished");
        false
    }

    async fn handle_failure(&self, plan: &Plan, idx: usize) -> FailureAction {
        let step = &plan.steps[idx];
        let plan_state = plan
            .steps
            .iter()
            .map(|s| format!("  {}. [{}] {}", s.id, s.status, s.description))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = FAILURE_PROMPT
            .replace("{step_id}", &step.id.to_string())
            .replace("{error}", step.error.as_deref().unwrap_or("unknown"))
            .replace("{plan_state}", &plan_state);

        match self.complete(&prompt, 64).await {
            Some(content) => {
                match serde_json::from_str::<serde_json::Value>(content.trim()) {
                    Ok(v) => v
                        .get("action")
                        .and_then(|a| a.as_str())
                        .map(FailureAction::parse)
                        .unwrap_or(FailureAction::Skip),
                    Err(_) => FailureAction::Skip,
                }
            }
            None => {
                warn!(step = step.id, "failure-handling LLM call errored, defaulting to skip");
                FailureAction::Skip
            }
        }
    }

    fn summarize_results(&self, plan: &Plan) -> String {
        let parts: Vec<String> = plan
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Done)
            .filter_map(|s| {
                s.result
                    .as_ref()
                    .map(|r| format!("Step {}: {}", s.id, &r[..r.len().min(200)]))
            })
            .collect();
        if parts.is_empty() {
            "No results yet.".to_string()
        } else {
            parts.join("\n")
        }
    }

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Option<String> {
        let req = ChatRequest {
            model: self.model.clone(),
            system: String::new(),
            system_prompt: None,
            messages: vec![Message {
                role: Role::User,
                content: prompt.to_string(),
            }],
            max_tokens,
            stream: false,
            thinking: None,
            tools: Vec::new(),
            raw_messages: None,
        };
        match self.llm.send(&req).await {
            Ok(resp) => Some(resp.content),
            Err(e) => {
                warn!(error = %e, "plan engine LLM call failed");
                None
            }
        }
    }
}

fn parse_steps(content: &str) -> Vec<PlanStep> {
    let fallback = || vec![PlanStep::new(1, "Execute the goal directly", None)];

    let mut text = content.trim();
    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            text = after[..end].trim();
        }
    }

    let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else {
        warn!(content = %&content[..content.len().min(200)], "plan_parse_failed");
        return fallback();
    };

    let Some(raw_steps) = value.get("steps").and_then(|s| s.as_array()) else {
        return fallback();
    };

    let steps: Vec<PlanStep> = raw_steps
        .iter()
        .take(MAX_STEPS)
        .enumerate()
        .map(|(i, raw)| {
            let tool = raw
                .get("tool")
                .and_then(|t| t.as_str())
                .filter(|t| *t != "null")
                .map(|t| t.to_string());
            let description = raw
                .get("description")
                .and_then(|d| d.as_str())
                .unwrap_or("Step")
                .to_string();
            PlanStep::new((i + 1) as u32, description, tool)
        })
        .collect();

    if steps.is_empty() {
        fallback()
    } else {
        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_json_steps() {
        let content = "```json\n{\"steps\": [\
            {\"description\": \"look up the file\", \"tool\": \"read_file\"}, \
            {\"description\": \"summarize it\", \"tool\": null}]}\n```";
        let steps = parse_steps(content);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].tool.as_deref(), Some("read_file"));
        assert_eq!(steps[1].tool, None);
    }

    #[test]
    fn caps_steps_at_max() {
        let many: Vec<_> = (0..20)
            .map(|i| format!("{{\"description\": \"s{i}\", \"tool\": null}}"))
            .collect();
        let content = format!("{{\"steps\": [{}]}}", many.join(","));
        assert_eq!(parse_steps(&content).len(), MAX_STEPS);
    }

    #[test]
    fn unparseable_content_falls_back_to_single_step() {
        let steps = parse_steps("not json at all");
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].tool, None);
    }
}
