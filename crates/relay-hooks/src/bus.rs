use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use relay_core::types::{Event, EventKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::types::{EventHandler, Subscription, DEFAULT_QUEUE_CAPACITY};

struct Registered {
    subscription: Subscription,
    tx: mpsc::Sender<Event>,
    rx: Option<mpsc::Receiver<Event>>,
    handler: Arc<dyn EventHandler>,
}

/// Typed publish/subscribe event bus.
///
/// Each subscriber gets its own bounded queue (default capacity 256).
/// `publish` never blocks: a full queue drops the event for that subscriber
/// and logs a warning. `start` spawns one consumer task per (handler, queue)
/// pair; `stop` cancels them all and awaits completion.
pub struct EventBus {
    registered: std::sync::Mutex<Vec<Registered>>,
    workers: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            registered: std::sync::Mutex::new(Vec::new()),
            workers: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Register a handler for one event kind with the default queue capacity.
    pub fn subscribe(&self, kind: EventKind, name: impl Into<String>, handler: Arc<dyn EventHandler>) {
        self.subscribe_with_capacity(kind, name, handler, DEFAULT_QUEUE_CAPACITY);
    }

    pub fn subscribe_with_capacity(
        &self,
        kind: EventKind,
        name: impl Into<String>,
        handler: Arc<dyn EventHandler>,
        capacity: usize,
    ) {
        let (tx, rx) = mpsc::channel(capacity);
        let name = name.into();
        debug!(kind = kind.as_str(), name = %name, capacity, "subscriber registered");
        self.registered.lock().unwrap().push(Registered {
            subscription: Subscription { kind, name, capacity },
            tx,
            rx: Some(rx),
            handler,
        });
    }

    /// Non-blocking enqueue to every subscriber of `event.kind`. Drops and
    /// logs on a full queue; never errors to the caller.
    pub fn publish(&self, event: Event) {
        let registered = self.registered.lock().unwrap();
        for r in registered.iter().filter(|r| r.subscription.kind == event.kind) {
            match r.tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        kind = event.kind.as_str(),
                        subscriber = %r.subscription.name,
                        "bus queue full, dropping event"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    warn!(
                        kind = event.kind.as_str(),
                        subscriber = %r.subscription.name,
                        "bus subscriber channel closed, dropping event"
                    );
                }
            }
        }
    }

    /// Spawn one consumer task per registered subscriber. Already-started
    /// subscribers (receiver already taken) are skipped on repeat calls.
    pub fn start(&self) {
        let mut registered = self.registered.lock().unwrap();
        let mut workers = self.workers.lock().unwrap();

        for r in registered.iter_mut() {
            let Some(mut rx) = r.rx.take() else { continue };
            let handler = Arc::clone(&r.handler);
            let name = r.subscription.name.clone();

            let handle = tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    let started = now_ms();
                    handler.handle(event).await;
                    let elapsed = now_ms().saturating_sub(started);
                    debug!(subscriber = %name, elapsed_ms = elapsed, "handler completed");
                }
                debug!(subscriber = %name, "consumer task exiting: channel closed");
            });
            workers.push(handle);
        }
    }

    /// Cancel every consumer task and await completion, suppressing errors.
    pub async fn stop(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut workers = self.workers.lock().unwrap();
            std::mem::take(&mut *workers)
        };
        for handle in &handles {
            handle.abort();
        }
        for handle in handles {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    error!(error = %e, "bus worker task panicked");
                }
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use relay_core::types::{InboundMessage, OutboundMessage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler(Arc<AtomicUsize>);

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle(&self, _event: Event) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn incoming() -> Event {
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
    async fn publish_reaches_subscriber() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        bus.subscribe(
            EventKind::MessageIncoming,
            "counter",
            Arc::new(CountingHandler(counter.clone())),
        );
        bus.start();
        bus.publish(incoming());
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        bus.stop().await;
    }

    #[tokio::test]
    async fn full_queue_drops_without_error() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        bus.subscribe_with_capacity(
            EventKind::MessageIncoming,
            "slow",
            Arc::new(CountingHandler(counter.clone())),
            1,
        );
        // Do not start the bus, so nothing drains the queue.
        bus.publish(incoming());
        bus.publish(incoming());
        bus.publish(incoming());
        // No panic, no error return — publish always succeeds from the caller's view.
    }

    #[tokio::test]
    async fn distinct_kinds_do_not_cross_deliver() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        bus.subscribe(
            EventKind::MessageOutgoing,
            "outgoing-only",
            Arc::new(CountingHandler(counter.clone())),
        );
        bus.start();
        bus.publish(incoming());
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        bus.publish(Event::outgoing(
            OutboundMessage {
                transport: "discord".into(),
                channel: "c".into(),
                content: "hi".into(),
                reply_to: None,
            },
            0,
        ));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        bus.stop().await;
    }
}
