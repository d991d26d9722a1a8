//! Per-envelope message handling for the Signal adapter.

use std::sync::Arc;

use tracing::warn;

use relay_core::config::SignalConfig;

use crate::context::SignalAppContext;
use crate::envelope::SignalEnvelope;

/// Handle one normalized inbound Signal envelope:
/// 1. Slash command interception (shared dispatcher, then local commands)
/// 2. User resolution via `UserResolver`
/// 3. Session key construction (DM vs. group)
/// 4. Attachment metadata → placeholder content blocks
/// 5. Non-streaming agentic pipeline invocation
/// 6. Reply delivery back through the same transport mode
pub async fn handle_envelope<C: SignalAppContext + 'static>(ctx: Arc<C>, config: SignalConfig, env: SignalEnvelope) {
    use relay_agent::pipeline::process_message_non_streaming;

    if env.sender.is_empty() {
        return;
    }
    if env.content.trim().is_empty() && env.attachments.is_empty() {
        return;
    }

    let content = env.content.trim().to_string();
    let channel = env.channel();

    let relay_user_id = match ctx.users().resolve("signal", &env.sender) {
        Ok(resolved) => resolved.user().id.clone(),
        Err(e) => {
            warn!(error = %e, sender = %env.sender, "signal: user resolution failed");
            env.sender.clone()
        }
    };

    let session_key = match &env.group_id {
        Some(gid) => format!("user:{}:signal:group_{}", relay_user_id, gid),
        None => format!("user:{}:signal:dm", relay_user_id),
    };

    let user_level = ctx.auth().level("signal", &relay_user_id);

    if content.starts_with('/') {
        if let Some(response) = relay_agent::pipeline::slash::handle_slash_command(
            &content,
            ctx.as_ref(),
            &session_key,
            "signal",
            &relay_user_id,
            user_level,
        )
        .await
        {
            send_reply(&config, &channel, &response).await;
            return;
        }
        if let Some(response) = handle_local_command(&content, &ctx, &session_key).await {
            send_reply(&config, &channel, &response).await;
            return;
        }
    }

    let text = if content.is_empty() {
        "[User sent attachment(s)]".to_string()
    } else {
        content
    };

    let attachment_blocks = crate::attach::to_content_blocks(&env.attachments);

    let response = match process_message_non_streaming(
        &ctx,
        &session_key,
        "signal",
        &text,
        None,
        None,
        None,
        user_level,
        Some(&relay_user_id),
        None,
        attachment_blocks,
    )
    .await
    {
        Ok(r) => r.content,
        Err(e) => {
            warn!(error = %e, session = %session_key, "signal: LLM pipeline failed");
            "\u{26a0}\u{fe0f} AI unavailable. Please try again later.".to_string()
        }
    };

    send_reply(&config, &channel, &response).await;
}

async fn send_reply(config: &SignalConfig, channel: &str, text: &str) {
    if let Err(e) = crate::send::send_message(config, channel, text).await {
        warn!(error = %e, channel = %channel, "signal: send failed");
    }
}

/// Commands local to the Signal adapter (not in the shared slash dispatcher) —
/// Signal has no native command UI, so `/clear` and `/whoami` live here the
/// same way they did in the adapter this one replaced.
async fn handle_local_command<C: SignalAppContext>(text: &str, ctx: &Arc<C>, session_key: &str) -> Option<String> {
    let trimmed = text.trim();

    if trimmed.eq_ignore_ascii_case("/clear") {
        let history = ctx.memory().get_history(session_key, 10_000).unwrap_or_default();
        let ids: Vec<i64> = history.iter().map(|m| m.id).collect();
        let count = ctx.memory().delete_turns(&ids).unwrap_or(0);
        return Some(format!(
            "Session cleared. Removed {count} messages. Starting a fresh conversation."
        ));
    }

    if trimmed.eq_ignore_ascii_case("/whoami") {
        return Some(format!(
            "Session key: `{session_key}`\n\nProvider: `{}`",
            ctx.agent().provider().name()
        ));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::AttachmentMeta;

    #[test]
    fn session_key_dm_format() {
        let env = SignalEnvelope {
            sender: "+1555".to_string(),
            content: "hi".to_string(),
            group_id: None,
            attachments: Vec::new(),
        };
        let key = match &env.group_id {
            Some(gid) => format!("user:{}:signal:group_{}", "u1", gid),
            None => format!("user:{}:signal:dm", "u1"),
        };
        assert_eq!(key, "user:u1:signal:dm");
    }

    #[test]
    fn session_key_group_format() {
        let env = SignalEnvelope {
            sender: "+1555".to_string(),
            content: "hi".to_string(),
            group_id: Some("abcGroup==".to_string()),
            attachments: vec![AttachmentMeta {
                filename: "x".to_string(),
                content_type: "text/plain".to_string(),
            }],
        };
        let key = match &env.group_id {
            Some(gid) => format!("user:{}:signal:group_{}", "u1", gid),
            None => format!("user:{}:signal:dm", "u1"),
        };
        assert_eq!(key, "user:u1:signal:group_abcGroup==");
        assert_eq!(env.attachments.len(), 1);
    }
}
