use async_trait::async_trait;
use relay_core::types::{Event, EventKind};

/// Default per-subscriber queue capacity. Matches the original bus's
/// bounded asyncio.Queue default.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Implemented by anything that wants to consume events of a given kind.
/// A panic or error inside `handle` is caught by the bus worker and logged —
/// it never tears down the consumer task.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: Event);
}

/// Allow a plain async closure to act as a handler for quick wiring (tests,
/// small transports) without a dedicated struct.
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F> EventHandler for FnHandler<F>
where
    F: Fn(Event) + Send + Sync,
{
    async fn handle(&self, event: Event) {
        (self.0)(event)
    }
}

pub(crate) struct Subscription {
    pub kind: EventKind,
    pub name: String,
    pub capacity: usize,
}
