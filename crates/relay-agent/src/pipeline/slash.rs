//! Shared slash command handler — intercepted before the AI pipeline.
//!
//! Handles the full command-verb union (C12): `/forget`, `/context`,
//! `/summarize`, `/jobs`, `/sudo`, `/memory`, `/pause`, `/resume`,
//! `/status`, `/help`, plus `/model`/`/version`/`/tools`/`/reload`/`/config`
//! retained from the teacher's own dispatcher. Shared across all channels
//! (gateway WS, Discord, Signal). Channel-specific commands (e.g. `/stop`
//! for the gateway) are handled locally in each channel adapter.

use relay_core::types::PermissionLevel;
use tracing::info;

use crate::pipeline::fit::summarize_session;
use crate::pipeline::MessageContext;

/// Known model aliases for user-friendly switching.
const MODEL_ALIASES: &[(&str, &str)] = &[
    ("opus", "claude-opus-4-6"),
    ("sonnet", "claude-sonnet-4-6"),
    ("haiku", "claude-haiku-4-5"),
];

/// Resolve a model alias ("opus", "haiku") or full model ID to a canonical model string.
fn resolve_model_alias(input: &str) -> Option<&'static str> {
    let lower = input.to_lowercase();
    for &(alias, full) in MODEL_ALIASES {
        if lower == alias || lower == full {
            return Some(full);
        }
    }
    None
}

/// Handle shared slash commands before sending to the AI.
///
/// Returns `Some(response)` if the message was a recognized command,
/// `None` if it should be forwarded to the AI pipeline.
///
/// `session_key` scopes `/forget`, `/context`, and `/summarize` (C3).
/// `transport`/`user_id`/`user_level` scope `/sudo` (C2) and the
/// OPERATOR-gated `/pause`/`/resume` and ADMIN-gated `/memory clear` (C6/C4).
///
/// Recognized commands:
///   `/help`              — list all available commands
///   `/version`           — show version and protocol info
///   `/model [name]`      — show or switch the active model
///   `/tools`             — list all available tools
///   `/reload`            — reload workspace prompt from disk
///   `/config`            — show runtime configuration summary
///   `/forget`            — clear this session's conversation history (C3)
///   `/context`           — show turn count and character stats (C3)
///   `/summarize`         — summarize this session's history (C3)
///   `/jobs`              — list scheduled jobs (C5)
///   `/sudo <reason>`     — request a temporary permission elevation (C2)
///   `/sudo approve <id>` — approve a pending sudo request (ADMIN)
///   `/sudo deny <id>`    — deny a pending sudo request (ADMIN)
///   `/sudo revoke`       — revoke your own active sudo grant
///   `/memory [search <q>|clear]` — show, search, or clear stored memories (C4)
///   `/pause [<duration>]` — pause autonomous triggers (OPERATOR) (C6)
///   `/resume`            — resume autonomous triggers (OPERATOR) (C6)
///   `/status`            — pause state plus queued event count (C6)
#[allow(clippy::too_many_arguments)]
pub async fn handle_slash_command<C: MessageContext>(
    message: &str,
    ctx: &C,
    session_key: &str,
    transport: &str,
    user_id: &str,
    user_level: PermissionLevel,
) -> Option<String> {
    let trimmed = message.trim();

    // /help
    if trimmed.eq_ignore_ascii_case("/help") {
        return Some(
            "**Relay Commands**\n\
             - `/help` — show this help\n\
             - `/version` — show version info\n\
             - `/model [name]` — show or switch model (`opus`, `sonnet`, `haiku`)\n\
             - `/tools` — list available AI tools\n\
             - `/reload` — reload workspace prompt from disk\n\
             - `/config` — show runtime configuration\n\
             - `/forget` — clear this conversation's history\n\
             - `/context` — show history stats for this conversation\n\
             - `/summarize` — summarize this conversation's history\n\
             - `/jobs` — list scheduled jobs\n\
             - `/sudo <reason>` / `/sudo approve <id>` / `/sudo deny <id>` / `/sudo revoke`\n\
             - `/memory [search <q>|clear]` — view, search, or clear stored memories\n\
             - `/pause [<duration>]` / `/resume` / `/status` — autonomous-trigger gate\n\
             - `/stop` — emergency stop (gateway only)"
                .to_string(),
        );
    }

    // /forget — clear this session's conversation history (C3).
    if trimmed.eq_ignore_ascii_case("/forget") {
        let count = ctx.memory().forget(session_key).unwrap_or(0);
        return Some(format!("Forgot {count} message(s) from this conversation."));
    }

    // /context — turn count and char stats for this session (C3).
    if trimmed.eq_ignore_ascii_case("/context") {
        return Some(match ctx.memory().stats(session_key) {
            Ok((count, total_chars)) => {
                format!("**Context stats**\n- Turns: {count}\n- Characters: {total_chars}")
            }
            Err(e) => format!("Failed to read context stats: {e}"),
        });
    }

    // /summarize — summarize this session's full history via the provider (C3).
    if trimmed.eq_ignore_ascii_case("/summarize") {
        return Some(match summarize_session(ctx, session_key).await {
            Some(summary) => format!("**Summary**\n{summary}"),
            None => "Nothing to summarize, or summarization failed.".to_string(),
        });
    }

    // /jobs — list scheduled jobs (C5).
    if trimmed.eq_ignore_ascii_case("/jobs") {
        return Some(match ctx.scheduler().list_jobs() {
            Ok(jobs) if jobs.is_empty() => "No scheduled jobs.".to_string(),
            Ok(jobs) => {
                let mut out = format!("**Scheduled jobs** ({}):\n", jobs.len());
                for job in &jobs {
                    out.push_str(&format!(
                        "- `{}` [{}] next: {}\n",
                        job.name,
                        job.status,
                        job.next_run.as_deref().unwrap_or("n/a")
                    ));
                }
                out
            }
            Err(e) => format!("Failed to list jobs: {e}"),
        });
    }

    // /sudo ...
    if let Some(response) = handle_sudo(trimmed, ctx, transport, user_id).await {
        return Some(response);
    }

    // /memory [search <q>|clear]
    if let Some(response) = handle_memory(trimmed, ctx, user_id, user_level).await {
        return Some(response);
    }

    // /pause [<duration>] — requires OPERATOR (C6).
    if let Some(rest) = strip_command(trimmed, "/pause") {
        if user_level < PermissionLevel::Operator {
            return Some("`/pause` requires OPERATOR permission.".to_string());
        }
        let duration = rest.filter(|s| !s.is_empty());
        ctx.pause().pause(duration).await;
        return Some(match duration {
            Some(d) => format!("Paused. Auto-resuming after `{d}` (if a valid duration)."),
            None => "Paused indefinitely. Use `/resume` to continue.".to_string(),
        });
    }

    // /resume — requires OPERATOR (C6).
    if trimmed.eq_ignore_ascii_case("/resume") {
        if user_level < PermissionLevel::Operator {
            return Some("`/resume` requires OPERATOR permission.".to_string());
        }
        let drained = ctx.pause().resume().await;
        return Some(format!("Resumed. {drained} buffered event(s) released."));
    }

    // /status — pause state plus queued count (C6).
    if trimmed.eq_ignore_ascii_case("/status") {
        let paused = ctx.pause().is_paused().await;
        let queued = ctx.pause().queue_len().await;
        return Some(format!(
            "**Status**\n- Paused: {paused}\n- Queued events: {queued}"
        ));
    }

    // /version
    if trimmed.eq_ignore_ascii_case("/version") {
        return Some(format!(
            "**Relay v{}**\n- Protocol: v{}\n- Provider: `{}`",
            env!("CARGO_PKG_VERSION"),
            relay_core::config::PROTOCOL_VERSION,
            ctx.agent().provider().name(),
        ));
    }

    // /model [name]
    if trimmed.eq_ignore_ascii_case("/model") {
        let model = ctx.agent().get_model().await;
        return Some(format!(
            "Current model: **{}**\n\nAvailable: `/model opus` | `/model sonnet` | `/model haiku`",
            model
        ));
    }

    if let Some(arg) = trimmed
        .strip_prefix("/model ")
        .or_else(|| trimmed.strip_prefix("/model\t"))
    {
        let arg = arg.trim();
        if let Some(resolved) = resolve_model_alias(arg) {
            let previous = ctx.agent().set_model(resolved.to_string()).await;
            info!(previous = %previous, new = %resolved, "model switched via /model command");
            return Some(format!(
                "Model switched: **{}** -> **{}**",
                previous, resolved
            ));
        }
        return Some(format!(
            "Unknown model: `{}`. Available: `opus`, `sonnet`, `haiku`",
            arg
        ));
    }

    // /tools
    if trimmed.eq_ignore_ascii_case("/tools") {
        return Some(build_tools_listing());
    }

    // /reload
    if trimmed.eq_ignore_ascii_case("/reload") {
        ctx.agent().reload_prompt().await;
        return Some(
            "Workspace prompt reloaded from disk. All `.md` files in `~/.relay/` re-read."
                .to_string(),
        );
    }

    // /config
    if trimmed.eq_ignore_ascii_case("/config") {
        let model = ctx.agent().get_model().await;
        let provider = ctx.agent().provider().name();
        let port = ctx
            .gateway_port()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let db = ctx.database_path().unwrap_or("N/A");
        return Some(format!(
            "**Relay Runtime**\n- Model: `{}`\n- Provider: `{}`\n- Port: `{}`\n- Database: `{}`",
            model, provider, port, db
        ));
    }

    // Not a recognized shared command.
    None
}

/// Case-insensitively strip `prefix` from `text`, returning the trimmed
/// remainder (`Some("")` if there was no argument) or `None` if `text`
/// doesn't start with `prefix` as a whole word.
fn strip_command<'a>(text: &'a str, prefix: &str) -> Option<Option<&'a str>> {
    if text.eq_ignore_ascii_case(prefix) {
        return Some(None);
    }
    let lower = text.to_lowercase();
    if lower.starts_with(&format!("{prefix} ")) || lower.starts_with(&format!("{prefix}\t")) {
        return Some(Some(text[prefix.len()..].trim()));
    }
    None
}

/// `/sudo <reason>` | `/sudo approve <id>` | `/sudo deny <id>` | `/sudo revoke` (C2).
async fn handle_sudo<C: MessageContext>(
    trimmed: &str,
    ctx: &C,
    transport: &str,
    user_id: &str,
) -> Option<String> {
    let arg = strip_command(trimmed, "/sudo")?;
    let arg = arg.unwrap_or("").trim();

    if arg.is_empty() {
        let pending = ctx.auth().list_pending();
        return Some(if pending.is_empty() {
            "No pending sudo requests. Usage: `/sudo <reason>` to request elevation.".to_string()
        } else {
            let mut out = format!("**Pending sudo requests** ({}):\n", pending.len());
            for req in &pending {
                out.push_str(&format!(
                    "- `{}` {}@{} wants {:?}: {}\n",
                    req.id, req.user_id, req.transport, req.requested_level, req.action
                ));
            }
            out
        });
    }

    if arg.eq_ignore_ascii_case("revoke") {
        return Some(if ctx.auth().revoke_sudo(transport, user_id) {
            "Sudo grant revoked.".to_string()
        } else {
            "No active sudo grant to revoke.".to_string()
        });
    }

    if let Some(id_str) = arg
        .strip_prefix("approve ")
        .or_else(|| arg.strip_prefix("Approve "))
    {
        return Some(match id_str.trim().parse::<u64>() {
            Ok(id) if ctx.auth().approve_sudo(id, transport, user_id) => {
                format!("Sudo request `{id}` approved.")
            }
            Ok(id) => format!("Could not approve `{id}` — not found, or you aren't ADMIN."),
            Err(_) => "Usage: `/sudo approve <id>`".to_string(),
        });
    }

    if let Some(id_str) = arg
        .strip_prefix("deny ")
        .or_else(|| arg.strip_prefix("Deny "))
    {
        return Some(match id_str.trim().parse::<u64>() {
            Ok(id) if ctx.auth().deny_sudo(id) => format!("Sudo request `{id}` denied."),
            Ok(id) => format!("Sudo request `{id}` not found."),
            Err(_) => "Usage: `/sudo deny <id>`".to_string(),
        });
    }

    // Anything else is a free-form reason: request Operator-level elevation.
    let id = ctx.auth().request_sudo(transport, user_id, PermissionLevel::Operator, arg);
    Some(format!(
        "Sudo request `{id}` submitted for review: \"{arg}\". An admin must run `/sudo approve {id}`."
    ))
}

/// `/memory [search <q>|clear]` (C4).
async fn handle_memory<C: MessageContext>(
    trimmed: &str,
    ctx: &C,
    user_id: &str,
    user_level: PermissionLevel,
) -> Option<String> {
    let arg = strip_command(trimmed, "/memory")?;
    let arg = arg.unwrap_or("").trim();

    if arg.is_empty() {
        return Some(match ctx.memory().export_context(user_id, 2000) {
            Ok(rendered) if rendered.is_empty() => "No memories stored.".to_string(),
            Ok(rendered) => format!("**Your memories**\n{rendered}"),
            Err(e) => format!("Failed to read memories: {e}"),
        });
    }

    if let Some(query) = arg.strip_prefix("search ") {
        let query = query.trim();
        return Some(match ctx.memory().search(user_id, query, 10) {
            Ok(results) if results.is_empty() => format!("No memories match `{query}`."),
            Ok(results) => {
                let mut out = format!("**Matches for `{query}`** ({}):\n", results.len());
                for mem in &results {
                    out.push_str(&format!("- **{}**: {}\n", mem.key, mem.value));
                }
                out
            }
            Err(e) => format!("Search failed: {e}"),
        });
    }

    if arg.eq_ignore_ascii_case("clear") {
        if user_level < PermissionLevel::Admin {
            return Some("`/memory clear` requires ADMIN permission.".to_string());
        }
        return Some(match ctx.memory().clear(user_id) {
            Ok(count) => format!("Cleared {count} memory entries."),
            Err(e) => format!("Failed to clear memories: {e}"),
        });
    }

    Some("Usage: `/memory`, `/memory search <q>`, or `/memory clear`.".to_string())
}

/// Build the `/tools` listing: built-in tools + script plugins + skills.
fn build_tools_listing() -> String {
    let mut out = String::from("**Relay Tools**\n\n");

    // Built-in tools
    out.push_str("**Built-in:**\n");
    for (name, desc) in crate::tools::tool_catalog() {
        out.push_str(&format!("- `{}` — {}\n", name, desc));
    }

    // Script plugins from ~/.relay/tools/
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let tools_dir = std::path::Path::new(&home).join(".relay/tools");
    if tools_dir.is_dir() {
        let scripts: Vec<String> = std::fs::read_dir(&tools_dir)
            .into_iter()
            .flatten()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .is_some_and(|ext| ext == "sh" || ext == "py" || ext == "js")
            })
            .map(|e| {
                e.path()
                    .file_stem()
                    .unwrap_or_default()
                    .to_string_lossy()
                    .to_string()
            })
            .collect();
        if !scripts.is_empty() {
            out.push_str(&format!("\n**Script plugins** ({}):\n", scripts.len()));
            for name in &scripts {
                out.push_str(&format!("- `{}`\n", name));
            }
        }
    }

    // Skills from ~/.relay/skills/
    let skills = crate::tools::skill::load_skills();
    if !skills.is_empty() {
        out.push_str(&format!("\n**Skills** ({}):\n", skills.len()));
        for skill in &skills {
            let tags = if skill.meta.tags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", skill.meta.tags.join(", "))
            };
            out.push_str(&format!(
                "- `{}` — {}{}\n",
                skill.meta.name, skill.meta.description, tags
            ));
        }
    }

    out
}
