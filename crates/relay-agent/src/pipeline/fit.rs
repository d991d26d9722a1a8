//! Token-bounded context fit — keeps a session's history under a token
//! budget before it's sent to the LLM, summarizing older turns rather than
//! silently truncating them.
//!
//! Distinct from `compact.rs`: compaction permanently extracts facts from
//! old turns into `user_memory` and deletes them from SQLite, triggered by
//! turn count. This module only reshapes the in-memory message list for a
//! single request and never mutates the stored conversation history.

use tracing::warn;

use crate::provider::{ChatRequest, Message, Role};

use super::context::MessageContext;

/// Token budget for the message list handed to the LLM, excluding the
/// system prompt and the current turn. ~4 chars/token, matching the
/// heuristic `relay-memory::export_context` already uses.
const FIT_TOKEN_BUDGET: usize = 6000;
const CHARS_PER_TOKEN: usize = 4;
const SUMMARY_MODEL: &str = "claude-haiku-4-5-20251001";
const SUMMARY_MAX_WORDS: usize = 500;

fn estimate_tokens(messages: &[Message]) -> usize {
    messages.iter().map(|m| m.content.len()).sum::<usize>() / CHARS_PER_TOKEN
}

/// Fit `messages` under [`FIT_TOKEN_BUDGET`].
///
/// If already under budget, returns unchanged. Otherwise splits the list at
/// its midpoint, asks the provider to summarize the older half into
/// `<= 500` words, and replaces that half with one synthetic `user` message
/// carrying the summary in brackets. If the result is still over budget,
/// drops oldest messages one at a time. If summarization fails (network,
/// empty response), falls back to simple oldest-first trimming.
pub async fn fit_to_budget<C: MessageContext>(ctx: &C, mut messages: Vec<Message>) -> Vec<Message> {
    if estimate_tokens(&messages) <= FIT_TOKEN_BUDGET {
        return messages;
    }

    let mid = messages.len() / 2;
    let older: Vec<Message> = messages.drain(..mid).collect();
    let newer = messages;

    match summarize_messages(ctx, &older).await {
        Some(summary) => {
            let mut fitted = vec![Message {
                role: Role::User,
                content: format!("[Summary of earlier conversation: {summary}]"),
            }];
            fitted.extend(newer);
            trim_until_under_budget(fitted)
        }
        None => {
            warn!("context fit: summarization failed, falling back to trimming");
            trim_until_under_budget(newer)
        }
    }
}

/// Drop oldest messages until the list is under [`FIT_TOKEN_BUDGET`],
/// always keeping at least the most recent message.
fn trim_until_under_budget(mut messages: Vec<Message>) -> Vec<Message> {
    while messages.len() > 1 && estimate_tokens(&messages) > FIT_TOKEN_BUDGET {
        messages.remove(0);
    }
    messages
}

/// Ask a cheap model to summarize a batch of messages into <= 500 words.
/// Returns `None` on any provider or parse failure.
async fn summarize_messages<C: MessageContext>(ctx: &C, batch: &[Message]) -> Option<String> {
    if batch.is_empty() {
        return None;
    }

    let transcript: String = batch
        .iter()
        .map(|m| format!("{:?}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n\n");

    let req = ChatRequest {
        model: SUMMARY_MODEL.to_string(),
        system: format!(
            "Summarize the following conversation excerpt in {SUMMARY_MAX_WORDS} words or fewer. \
             Preserve concrete facts, decisions, and open threads. Write plain prose, no preamble."
        ),
        system_prompt: None,
        messages: vec![Message {
            role: Role::User,
            content: transcript,
        }],
        max_tokens: 800,
        stream: false,
        thinking: None,
        tools: Vec::new(),
        raw_messages: None,
    };

    match ctx.agent().provider().send(&req).await {
        Ok(resp) if !resp.content.trim().is_empty() => Some(resp.content.trim().to_string()),
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "context fit: summarization call failed");
            None
        }
    }
}

/// `summarize(transport, channel) -> string?` (C3): load a session's full
/// history and ask the provider for a summary, without deleting anything.
/// Backs the `/summarize` slash command.
pub async fn summarize_session<C: MessageContext>(ctx: &C, session_key: &str) -> Option<String> {
    let history = ctx.memory().get_history(session_key, 10_000).ok()?;
    if history.is_empty() {
        return None;
    }
    let messages: Vec<Message> = history
        .iter()
        .map(|m| Message {
            role: if m.role == "assistant" {
                Role::Assistant
            } else {
                Role::User
            },
            content: m.content.clone(),
        })
        .collect();
    summarize_messages(ctx, &messages).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_tokens_is_char_count_over_four() {
        let messages = vec![Message {
            role: Role::User,
            content: "a".repeat(400),
        }];
        assert_eq!(estimate_tokens(&messages), 100);
    }

    #[test]
    fn trim_keeps_at_least_one_message() {
        let messages = vec![
            Message {
                role: Role::User,
                content: "x".repeat(100_000),
            },
            Message {
                role: Role::Assistant,
                content: "y".repeat(100_000),
            },
        ];
        let trimmed = trim_until_under_budget(messages);
        assert_eq!(trimmed.len(), 1);
    }
}
