//! Inbound attachment handling for the Signal adapter.
//!
//! `signal-cli`'s receive envelope only carries attachment metadata
//! (filename, content type) — not the bytes — so unlike Discord's
//! `attach.rs`, there's nothing to download here. Each attachment becomes a
//! placeholder text block so the LLM at least knows it was sent.

use serde_json::Value;

use crate::envelope::AttachmentMeta;

pub fn to_content_blocks(attachments: &[AttachmentMeta]) -> Option<Vec<Value>> {
    if attachments.is_empty() {
        return None;
    }

    Some(
        attachments
            .iter()
            .map(|a| {
                let ct = if a.content_type.is_empty() {
                    "unknown"
                } else {
                    &a.content_type
                };
                serde_json::json!({
                    "type": "text",
                    "text": format!("[Attachment: '{}' ({})]", a.filename, ct)
                })
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_attachments_returns_none() {
        assert!(to_content_blocks(&[]).is_none());
    }

    #[test]
    fn builds_placeholder_per_attachment() {
        let atts = vec![AttachmentMeta {
            filename: "photo.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
        }];
        let blocks = to_content_blocks(&atts).unwrap();
        assert_eq!(blocks.len(), 1);
        let text = blocks[0]["text"].as_str().unwrap();
        assert!(text.contains("photo.jpg"));
        assert!(text.contains("image/jpeg"));
    }
}
