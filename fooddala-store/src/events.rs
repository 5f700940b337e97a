use fooddala_shared::models::events::DomainEvent;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// In-process fan-out of domain events to whichever views are listening.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: DomainEvent) {
        let name = event.name();
        match self.tx.send(event) {
            Ok(receivers) => info!("Published {} to {} subscribers", name, receivers),
            Err(_) => debug!("No subscribers for {}", name),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
