use crate::core::errors::LedgerError;
use crate::infrastructure::notifier::{ChangeEvent, ChangeNotifier};
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::trace;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct InMemoryNotifier {
    sender: broadcast::Sender<ChangeEvent>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Subscribers that fall more than `capacity` events behind see a lag
    /// instead of the dropped events.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        InMemoryNotifier { sender }
    }
}

impl Default for InMemoryNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChangeNotifier for InMemoryNotifier {
    async fn publish(&self, event: ChangeEvent) -> Result<(), LedgerError> {
        // no subscribers is not an error
        if let Err(broadcast::error::SendError(event)) = self.sender.send(event) {
            trace!(group_id = %event.group_id, "change event dropped, no subscribers");
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }
}
