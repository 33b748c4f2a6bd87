use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::{ChangeEvent, Collection};

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for change events, one channel per collection. This is the
/// authoritative live feed: subscribers see every committed write in store
/// order, superseding whatever the read cache holds.
pub struct ChangeHub {
    channels: DashMap<Collection, broadcast::Sender<ChangeEvent>>,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to one collection's stream. Creates the channel if needed.
    pub fn subscribe(&self, collection: Collection) -> broadcast::Receiver<ChangeEvent> {
        let sender = self
            .channels
            .entry(collection)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Publish an event. No-op if nobody is listening.
    pub fn send(&self, collection: Collection, event: &ChangeEvent) {
        if let Some(sender) = self.channels.get(&collection) {
            let _ = sender.send(event.clone());
        }
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = ChangeHub::new();
        let mut rx = hub.subscribe(Collection::Classrooms);

        let event = ChangeEvent::ClassroomDeleted { id: Ulid::new() };
        hub.send(Collection::Classrooms, &event);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn send_without_subscribers_is_noop() {
        let hub = ChangeHub::new();
        hub.send(
            Collection::Schedules,
            &ChangeEvent::ClassroomDeleted { id: Ulid::new() },
        );
    }

    #[tokio::test]
    async fn streams_are_per_collection() {
        let hub = ChangeHub::new();
        let mut classrooms = hub.subscribe(Collection::Classrooms);
        let mut schedules = hub.subscribe(Collection::Schedules);

        hub.send(
            Collection::Classrooms,
            &ChangeEvent::ClassroomDeleted { id: Ulid::new() },
        );

        assert!(classrooms.try_recv().is_ok());
        assert!(schedules.try_recv().is_err());
    }
}
