use relay_core::config::ChunkerConfig;

/// Split `text` into Discord-sized chunks using the shared C1 chunking
/// algorithm (prose/code aware, re-fences oversized code blocks).
///
/// Uses the default [`ChunkerConfig`] discord limit — adapters that load a
/// `RelayConfig` should prefer calling `relay_channels::chunk` directly with
/// the configured limit.
pub fn split_chunks(text: &str) -> Vec<String> {
    let cfg = ChunkerConfig::default();
    relay_channels::chunk(text, cfg.discord_limit, cfg.min_chunk_size)
}

/// Alias kept for call sites that split for immediate interactive replies
/// (slash command follow-ups); identical behavior to [`split_chunks`].
pub fn split_chunks_smart(text: &str) -> Vec<String> {
    split_chunks(text)
}

/// Proportional typing delay for a chunk of `len` characters, capped so a
/// very long chunk doesn't stall the reply for multiple seconds.
fn typing_delay(len: usize) -> std::time::Duration {
    let cfg = ChunkerConfig::default();
    let ms = (len as f64 * cfg.typing_delay_ms_per_char).min(2500.0);
    std::time::Duration::from_millis(ms as u64)
}

/// Send `text` to `channel_id`, chunked per [`split_chunks`], with a small
/// inter-chunk typing delay on multi-chunk replies.
pub async fn send_chunked(
    http: &serenity::http::Http,
    channel_id: serenity::model::id::ChannelId,
    text: &str,
) -> Result<(), serenity::Error> {
    let chunks = split_chunks(text);
    let multi = chunks.len() > 1;
    for chunk in chunks {
        if multi {
            let _ = channel_id.broadcast_typing(http).await;
            tokio::time::sleep(typing_delay(chunk.len())).await;
        }
        channel_id.say(http, &chunk).await?;
    }
    Ok(())
}

/// Send `text` to `channel_id`, chunked per [`split_chunks`]. If `reply_to`
/// is `Some`, the first chunk replies to that message; later chunks are
/// sent plain so a long answer doesn't spam reply arrows.
pub async fn send_response(
    http: &serenity::http::Http,
    channel_id: serenity::model::id::ChannelId,
    text: &str,
    reply_to: Option<serenity::model::id::MessageId>,
) -> Result<(), serenity::Error> {
    let chunks = split_chunks(text);
    let multi = chunks.len() > 1;
    for (i, chunk) in chunks.iter().enumerate() {
        if multi && i > 0 {
            let _ = channel_id.broadcast_typing(http).await;
            tokio::time::sleep(typing_delay(chunk.len())).await;
        }
        let mut msg = serenity::builder::CreateMessage::new().content(chunk);
        if i == 0 {
            if let Some(reply_id) = reply_to {
                msg = msg.reference_message((channel_id, reply_id));
            }
        }
        channel_id.send_message(http, msg).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_single_chunk() {
        let chunks = split_chunks("Hello, world!");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "Hello, world!");
    }

    #[test]
    fn long_text_splits_under_limit() {
        let line = "a".repeat(1000);
        let text = format!("{}\n\n{}", line, line);
        let chunks = split_chunks(&text);
        assert!(chunks.len() >= 2);
        for c in &chunks {
            assert!(c.len() <= ChunkerConfig::default().discord_limit);
        }
    }

    #[test]
    fn very_long_word_still_splits() {
        let text = "x".repeat(4000);
        let chunks = split_chunks(&text);
        assert!(chunks.len() >= 2);
        for c in &chunks {
            assert!(c.len() <= ChunkerConfig::default().discord_limit);
        }
    }

    #[test]
    fn smart_alias_matches_plain_split() {
        let text = "hello there, this is a test".repeat(200);
        assert_eq!(split_chunks(&text), split_chunks_smart(&text));
    }
}
