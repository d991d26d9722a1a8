use std::sync::Arc;

use relay_core::types::Event;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::info;

use crate::duration::parse_duration;

/// Process-wide pause flag plus a buffer of deferred event envelopes.
///
/// Direct human messages bypass the gate entirely — only autonomous triggers
/// (scheduler, webhooks) are expected to call `queue_event` while paused.
pub struct PauseGate {
    paused: RwLock<bool>,
    queue: Mutex<Vec<Event>>,
    auto_resume: Mutex<Option<JoinHandle<()>>>,
}

impl PauseGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            paused: RwLock::new(false),
            queue: Mutex::new(Vec::new()),
            auto_resume: Mutex::new(None),
        })
    }

    pub async fn is_paused(&self) -> bool {
        *self.paused.read().await
    }

    /// Parse `duration` (if any) and pause. On a recognized duration, spawns
    /// an auto-resume task; on `None`/unparseable input, pauses indefinitely.
    pub async fn pause(self: &Arc<Self>, duration: Option<&str>) {
        *self.paused.write().await = true;
        self.cancel_auto_resume().await;

        let Some(secs) = duration.and_then(parse_duration) else {
            info!("paused indefinitely");
            return;
        };

        info!(seconds = secs, "paused with auto-resume");
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(secs)).await;
            this.resume().await;
        });
        *self.auto_resume.lock().await = Some(handle);
    }

    /// Clear the pause flag, cancel any pending auto-resume, and return the
    /// number of events that were queued while paused (caller drains them).
    pub async fn resume(&self) -> usize {
        *self.paused.write().await = false;
        self.cancel_auto_resume().await;
        self.queue.lock().await.len()
    }

    async fn cancel_auto_resume(&self) {
        if let Some(handle) = self.auto_resume.lock().await.take() {
            handle.abort();
        }
    }

    pub async fn queue_event(&self, event: Event) {
        self.queue.lock().await.push(event);
    }

    /// Number of buffered events, without draining them. Backs `/status`.
    pub async fn queue_len(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn drain_queue(&self) -> Vec<Event> {
        std::mem::take(&mut *self.queue.lock().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::types::{Event, InboundMessage};

    fn dummy_event() -> Event {
        Event::incoming(
            InboundMessage {
                transport: "discord".into(),
                channel: "c".into(),
                user_id: "u".into(),
                user_name: None,
                content: "hi".into(),
                message_id: None,
                group_id: None,
                attachments: vec![],
            },
            0,
        )
    }

    #[tokio::test]
    async fn pause_then_resume_drains_queue() {
        let gate = PauseGate::new();
        gate.pause(None).await;
        assert!(gate.is_paused().await);
        gate.queue_event(dummy_event()).await;
        gate.queue_event(dummy_event()).await;
        let remaining = gate.resume().await;
        assert_eq!(remaining, 2);
        assert!(!gate.is_paused().await);
        assert_eq!(gate.drain_queue().await.len(), 2);
    }

    #[tokio::test]
    async fn auto_resume_fires_after_duration() {
        let gate = PauseGate::new();
        gate.pause(Some("0s")).await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!gate.is_paused().await);
    }
}
