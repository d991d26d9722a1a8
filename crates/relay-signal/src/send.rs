//! Outbound message sending for the Signal adapter.

use relay_core::config::{ChunkerConfig, SignalConfig, SignalMode};

use crate::error::SignalError;

/// Split `text` into Signal-sized chunks using the shared C1 chunking
/// algorithm (prose/code aware).
pub fn split_chunks(text: &str) -> Vec<String> {
    let cfg = ChunkerConfig::default();
    relay_channels::chunk(text, cfg.signal_limit, cfg.min_chunk_size)
}

/// Send `text` to `channel`, chunked per [`split_chunks`], dispatching
/// through `signal-cli` or the REST bridge depending on `config.mode`.
///
/// `channel` is either a phone number (`+15551234567`, a DM) or a base64
/// group ID (anything else) — mirrors the original transport's `is_group`
/// check.
pub async fn send_message(config: &SignalConfig, channel: &str, text: &str) -> Result<(), SignalError> {
    let is_group = !channel.starts_with('+');
    let group_id = is_group.then_some(channel);
    let chunks = split_chunks(text);
    let multi = chunks.len() > 1;
    let cfg = ChunkerConfig::default();

    for chunk in &chunks {
        match config.mode {
            SignalMode::Cli => crate::transport::send_cli(config, channel, chunk, group_id).await?,
            SignalMode::Rest => {
                let client = reqwest::Client::new();
                crate::transport::send_rest(&client, config, channel, chunk, group_id).await?
            }
        }
        if multi {
            let delay_ms = (chunk.len() as f64 * cfg.typing_delay_ms_per_char).min(3000.0);
            tokio::time::sleep(std::time::Duration::from_millis(delay_ms as u64)).await;
        }
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
        let line = "a".repeat(1500);
        let text = format!("{}\n\n{}", line, line);
        let chunks = split_chunks(&text);
        assert!(chunks.len() >= 2);
        for c in &chunks {
            assert!(c.len() <= ChunkerConfig::default().signal_limit);
        }
    }
}
