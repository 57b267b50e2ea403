//! Change notifications for the workflow store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::stage::{Partition, StageId};

/// What changed in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreChange {
    Added {
        id: StageId,
        partition: Partition,
    },
    Moved {
        id: StageId,
        from: Partition,
        to: Partition,
    },
    Renamed {
        id: StageId,
        file_name: String,
    },
    Removed {
        id: StageId,
        partition: Partition,
    },
    Cleared,
}

/// Sent to subscribers once a mutation is visible to readers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreEvent {
    #[serde(flatten)]
    pub change: StoreChange,
    /// Store epoch after the change.
    pub epoch: u64,
    pub timestamp: DateTime<Utc>,
}

impl StoreEvent {
    pub fn new(change: StoreChange, epoch: u64) -> Self {
        Self {
            change,
            epoch,
            timestamp: Utc::now(),
        }
    }

    pub fn id(&self) -> Option<&StageId> {
        match &self.change {
            StoreChange::Added { id, .. }
            | StoreChange::Moved { id, .. }
            | StoreChange::Renamed { id, .. }
            | StoreChange::Removed { id, .. } => Some(id),
            StoreChange::Cleared => None,
        }
    }
}

#[derive(Clone)]
pub(crate) struct StoreEvents {
    sender: Arc<broadcast::Sender<StoreEvent>>,
}

impl StoreEvents {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub(crate) fn send(&self, event: StoreEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_flat() {
        let event = StoreEvent::new(
            StoreChange::Moved {
                id: StageId::from("a"),
                from: Partition::Pending,
                to: Partition::Succeeded,
            },
            2,
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "moved");
        assert_eq!(json["id"], "a");
        assert_eq!(json["to"], "succeeded");
        assert_eq!(json["epoch"], 2);
    }

    #[test]
    fn test_send_without_subscribers_is_ignored() {
        let events = StoreEvents::new(4);
        events.send(StoreEvent::new(StoreChange::Cleared, 1));
        assert!(StoreEvent::new(StoreChange::Cleared, 1).id().is_none());
    }
}
