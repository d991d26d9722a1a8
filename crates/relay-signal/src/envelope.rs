//! Normalizes `signal-cli`/REST-bridge JSON envelopes into a single shape.
//!
//! Both the `signal-cli --json` subprocess output and the signal-cli-rest-api
//! `/v1/receive/{number}` response wrap a `dataMessage` the same way, so one
//! parser serves both transports.

use serde_json::Value;

/// Metadata for an attachment on an inbound message. Signal doesn't hand us
/// the bytes directly in the receive envelope, so only filename/content-type
/// are carried through to the LLM as a placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentMeta {
    pub filename: String,
    pub content_type: String,
}

/// A normalized inbound Signal message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalEnvelope {
    pub sender: String,
    pub content: String,
    pub group_id: Option<String>,
    pub attachments: Vec<AttachmentMeta>,
}

impl SignalEnvelope {
    /// The channel this message belongs to: the group ID if it's a group
    /// message, otherwise the sender's phone number.
    pub fn channel(&self) -> String {
        self.group_id.clone().unwrap_or_else(|| self.sender.clone())
    }
}

/// Parse one JSON envelope (either `{"envelope": {...}}` or a bare envelope
/// object) into a [`SignalEnvelope`]. Returns `None` for receipts, typing
/// indicators, sync messages, or anything without message text.
pub fn parse_envelope(value: &Value) -> Option<SignalEnvelope> {
    let env = value.get("envelope").unwrap_or(value);
    let data_msg = env.get("dataMessage")?;

    let content = data_msg.get("message").and_then(|m| m.as_str())?;
    if content.is_empty() {
        return None;
    }

    let sender = env
        .get("source")
        .and_then(|s| s.as_str())
        .or_else(|| env.get("sourceNumber").and_then(|s| s.as_str()))
        .unwrap_or("")
        .to_string();

    let group_id = data_msg
        .get("groupInfo")
        .and_then(|g| g.get("groupId"))
        .and_then(|g| g.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());

    let attachments = data_msg
        .get("attachments")
        .and_then(|a| a.as_array())
        .map(|arr| {
            arr.iter()
                .map(|a| AttachmentMeta {
                    filename: a
                        .get("filename")
                        .and_then(|f| f.as_str())
                        .unwrap_or("")
                        .to_string(),
                    content_type: a
                        .get("contentType")
                        .and_then(|c| c.as_str())
                        .unwrap_or("")
                        .to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    Some(SignalEnvelope {
        sender,
        content: content.to_string(),
        group_id,
        attachments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_envelope_dm() {
        let v: Value = serde_json::from_str(
            r#"{"envelope":{"source":"+15551234567","dataMessage":{"message":"hi there"}}}"#,
        )
        .unwrap();
        let env = parse_envelope(&v).unwrap();
        assert_eq!(env.sender, "+15551234567");
        assert_eq!(env.content, "hi there");
        assert_eq!(env.group_id, None);
        assert_eq!(env.channel(), "+15551234567");
    }

    #[test]
    fn parses_bare_envelope_rest_style() {
        let v: Value = serde_json::from_str(
            r#"{"source":"+15551234567","dataMessage":{"message":"hello"}}"#,
        )
        .unwrap();
        let env = parse_envelope(&v).unwrap();
        assert_eq!(env.content, "hello");
    }

    #[test]
    fn parses_group_message() {
        let v: Value = serde_json::from_str(
            r#"{"envelope":{"source":"+1555","dataMessage":{"message":"yo","groupInfo":{"groupId":"abcGroup=="}}}}"#,
        )
        .unwrap();
        let env = parse_envelope(&v).unwrap();
        assert_eq!(env.group_id.as_deref(), Some("abcGroup=="));
        assert_eq!(env.channel(), "abcGroup==");
    }

    #[test]
    fn no_data_message_returns_none() {
        let v: Value = serde_json::from_str(r#"{"envelope":{"source":"+1555","receiptMessage":{}}}"#).unwrap();
        assert!(parse_envelope(&v).is_none());
    }

    #[test]
    fn empty_message_text_returns_none() {
        let v: Value =
            serde_json::from_str(r#"{"envelope":{"source":"+1555","dataMessage":{"message":""}}}"#).unwrap();
        assert!(parse_envelope(&v).is_none());
    }

    #[test]
    fn parses_attachments() {
        let v: Value = serde_json::from_str(
            r#"{"envelope":{"source":"+1555","dataMessage":{"message":"see attached","attachments":[{"filename":"photo.jpg","contentType":"image/jpeg"}]}}}"#,
        )
        .unwrap();
        let env = parse_envelope(&v).unwrap();
        assert_eq!(env.attachments.len(), 1);
        assert_eq!(env.attachments[0].filename, "photo.jpg");
    }
}
