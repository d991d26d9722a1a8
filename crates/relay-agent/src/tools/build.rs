//! Tool registry — builds the canonical tool list for any channel adapter.

use std::sync::Arc;

use crate::pipeline::context::MessageContext;
use crate::provider::ToolDefinition;

use super::bash_session::BashSessionTool;
use super::browser::BrowserTool;
use super::create_plan::CreatePlanTool;
use super::execute_command::ExecuteCommandTool;
use super::knowledge::{KnowledgeSearchTool, KnowledgeWriteTool};
use super::link_identity::LinkIdentityTool;
use super::memory_tools::{MemoryDeleteTool, MemorySearchTool, MemorySetTool};
use super::reminder::ReminderTool;
use super::schedule_job::ScheduleJobTool;
use super::send_message::SendMessageTool;
use super::skill::{format_skill_index, load_skills, SkillReadTool};
use super::{to_definitions, Tool};

/// Tool list plus the rendered skill index for the volatile prompt tier.
pub struct BuiltTools {
    pub tools: Vec<Box<dyn Tool>>,
    pub skill_index: String,
}

/// Build the full list of tools available to the AI for a given request.
///
/// `channel_name` and `channel_id` are forwarded to `ReminderTool` so it can
/// embed the correct delivery target in the persisted job action.
/// `current_user_id` is forwarded to `LinkIdentityTool` for self-service
/// cross-channel identity linking.
pub fn build_tools<C: MessageContext + 'static>(
    ctx: Arc<C>,
    channel_name: &str,
    channel_id: Option<u64>,
    current_user_id: Option<&str>,
) -> BuiltTools {
    let mut tools: Vec<Box<dyn Tool>> = vec![
        Box::new(super::read_file::ReadFileTool),
        Box::new(super::write_file::WriteFileTool),
        Box::new(super::list_files::ListFilesTool),
        Box::new(super::search_files::SearchFilesTool),
        Box::new(ExecuteCommandTool::new(Arc::clone(&ctx))),
        Box::new(BashSessionTool::new(Arc::clone(&ctx))),
        Box::new(ReminderTool::new(
            Arc::clone(&ctx),
            channel_name,
            channel_id,
        )),
        Box::new(KnowledgeSearchTool::new(Arc::clone(&ctx))),
        Box::new(KnowledgeWriteTool::new(Arc::clone(&ctx))),
        Box::new(super::patch_file::PatchFileTool),
        Box::new(SendMessageTool::new(Arc::clone(&ctx))),
        Box::new(LinkIdentityTool::new(
            Arc::clone(&ctx),
            current_user_id.map(|s| s.to_string()),
        )),
        Box::new(MemorySearchTool::new(Arc::clone(&ctx))),
        Box::new(MemorySetTool::new(Arc::clone(&ctx))),
        Box::new(MemoryDeleteTool::new(Arc::clone(&ctx))),
        Box::new(ScheduleJobTool::new(Arc::clone(&ctx))),
        Box::new(CreatePlanTool::new(Arc::clone(&ctx), channel_name)),
        Box::new(BrowserTool::new(Arc::clone(&ctx))),
    ];

    // Load script plugins from ~/.relay/tools/ — no restart needed after adding a plugin,
    // tools are re-scanned on each build_tools() call (i.e. each new message).
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let tools_dir = std::path::Path::new(&home).join(".relay/tools");
    tools.extend(super::script_tool::load_script_tools(&tools_dir));

    let skills = load_skills();
    let skill_index = format_skill_index(&skills);
    if !skills.is_empty() {
        tools.push(Box::new(SkillReadTool::new(skills)));
    }

    BuiltTools { tools, skill_index }
}

/// Convert a tool list to API-level definitions for the LLM request.
pub fn tool_definitions(tools: &[Box<dyn Tool>]) -> Vec<ToolDefinition> {
    to_definitions(tools)
}
