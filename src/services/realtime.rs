//! Change feed for the admin dashboard
//!
//! Services publish a [`ChangeEvent`] after every successful write. The SSE
//! endpoint subscribes and forwards events so open dashboards can patch
//! their lists without refetching.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

/// Events buffered per subscriber before it starts lagging
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Posts,
    Bookings,
    Settings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row-level change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub id: i64,
    /// Full row after the change; `None` for deletes
    pub record: Option<Value>,
}

impl ChangeEvent {
    pub fn insert<T: Serialize>(table: Table, id: i64, record: &T) -> Self {
        Self::with_record(table, ChangeKind::Insert, id, record)
    }

    pub fn update<T: Serialize>(table: Table, id: i64, record: &T) -> Self {
        Self::with_record(table, ChangeKind::Update, id, record)
    }

    pub fn delete(table: Table, id: i64) -> Self {
        Self {
            table,
            kind: ChangeKind::Delete,
            id,
            record: None,
        }
    }

    fn with_record<T: Serialize>(table: Table, kind: ChangeKind, id: i64, record: &T) -> Self {
        let record = match serde_json::to_value(record) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Failed to serialize change record for {:?} {}: {}", table, id, e);
                None
            }
        };
        Self {
            table,
            kind,
            id,
            record,
        }
    }
}

/// Broadcast hub for change events
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish to every current subscriber. Returns how many received it;
    /// zero subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        tracing::debug!("change {:?} {:?} #{}", event.table, event.kind, event.id);
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> ChangeSubscription {
        ChangeSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Receiving end of the feed
pub struct ChangeSubscription {
    receiver: broadcast::Receiver<ChangeEvent>,
}

impl ChangeSubscription {
    /// Next event, or `None` once the feed is gone.
    ///
    /// A subscriber that falls behind skips the events it missed.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Change subscriber lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
