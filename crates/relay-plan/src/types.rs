use serde::{Deserialize, Serialize};

/// One step of a plan, decomposed by the LLM at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: u32,
    pub description: String,
    /// Tool name, or `None` for a reasoning-only step.
    pub tool: Option<String>,
    pub parameters: Option<serde_json::Value>,
    pub status: StepStatus,
    pub result: Option<String>,
    pub error: Option<String>,
}

impl PlanStep {
    pub fn new(id: u32, description: impl Into<String>, tool: Option<String>) -> Self {
        Self {
            id,
            description: description.into(),
            tool,
            parameters: None,
            status: StepStatus::Pending,
            result: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Done,
    Failed,
    Skipped,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Done => "done",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Planning,
    Executing,
    Completed,
    Failed,
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PlanStatus::Planning => "planning",
            PlanStatus::Executing => "executing",
            PlanStatus::Completed => "completed",
            PlanStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub goal: String,
    pub steps: Vec<PlanStep>,
    pub status: PlanStatus,
    /// `"<transport>:<channel>"`, used to route progress updates.
    pub channel: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Plan {
    pub fn new(id: String, goal: String, steps: Vec<PlanStep>, channel: String) -> Self {
        let now = chrono::Utc::now();
        Self {
            id,
            goal,
            steps,
            status: PlanStatus::Planning,
            channel,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn done_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.status, StepStatus::Done | StepStatus::Failed | StepStatus::Skipped))
            .count()
    }
}

/// Outcome of asking the LLM how to proceed after a failed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    Retry,
    Skip,
    Abort,
}

impl FailureAction {
    pub fn parse(s: &str) -> Self {
        match s {
            "retry" => FailureAction::Retry,
            "abort" => FailureAction::Abort,
            _ => FailureAction::Skip,
        }
    }
}
