use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use crate::application::{AppResult, EventPublisher};
use crate::domain::{EventKind, SlotEvent};

/// Live slot events for status API subscribers.
///
/// Events are only kept while a subscriber is connected; history lives in
/// the event log.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SlotEvent>,
}

impl EventBus {
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer);
        Self { tx }
    }

    pub fn subscribers(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Events published from now on, restricted to `kind` when given.
    /// A subscriber that falls behind skips what it missed.
    pub fn stream(&self, kind: Option<EventKind>) -> impl Stream<Item = SlotEvent> + Send + use<> {
        BroadcastStream::new(self.tx.subscribe()).filter_map(move |msg| match msg {
            Ok(event) if kind.is_none_or(|k| k == event.kind) => Some(event),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "live subscriber lagging, events dropped");
                None
            }
        })
    }
}

#[async_trait]
impl EventPublisher for EventBus {
    async fn publish(&self, event: &SlotEvent) -> AppResult<()> {
        if self.tx.send(event.clone()).is_err() {
            tracing::trace!(slot = %event.slot, "no live subscribers");
        }
        Ok(())
    }
}
