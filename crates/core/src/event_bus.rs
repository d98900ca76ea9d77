//! Table change feed. Every storage mutation is published here so views
//! can refresh without polling.
//!
//! Listeners hold a [`Subscription`]; dropping it releases the listener.
//! `listener_count` reports how many are alive, which makes leaked
//! subscriptions visible.

use crate::types::Tier;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    /// The listener fell behind and missed events; re-read everything.
    Resync,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeEvent {
    pub table: Tier,
    pub kind: ChangeKind,
    pub id: Option<i64>,
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(table: Tier, kind: ChangeKind, id: i64) -> Self {
        Self {
            table,
            kind,
            id: Some(id),
            timestamp: Utc::now(),
        }
    }

    fn resync(table: Tier) -> Self {
        Self {
            table,
            kind: ChangeKind::Resync,
            id: None,
            timestamp: Utc::now(),
        }
    }
}

/// Anything that accepts change events. Stores take an `Arc<dyn EventSink>`.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ChangeEvent);
}

/// No-op sink for stores that nobody watches.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit(&self, _event: ChangeEvent) {}
}

/// In-memory sink that captures events for testing.
#[derive(Default)]
pub struct CaptureSink {
    events: Mutex<Vec<ChangeEvent>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ChangeEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    pub fn count_table(&self, table: Tier) -> usize {
        self.events.lock().iter().filter(|e| e.table == table).count()
    }
}

impl EventSink for CaptureSink {
    fn emit(&self, event: ChangeEvent) {
        self.events.lock().push(event);
    }
}

/// Broadcast change feed shared by the store and every live view.
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
    listeners: Arc<AtomicUsize>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            listeners: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Listen for changes to one table, or to every table with `None`.
    pub fn subscribe(&self, table: Option<Tier>) -> Subscription {
        let count = self.listeners.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(table = ?table, listeners = count, "Change feed subscription opened");
        Subscription {
            receiver: self.sender.subscribe(),
            table,
            listeners: self.listeners.clone(),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.load(Ordering::SeqCst)
    }
}

impl EventSink for ChangeFeed {
    fn emit(&self, event: ChangeEvent) {
        // Sending with no receivers is not an error for a feed.
        let _ = self.sender.send(event);
    }
}

/// A live listener on the change feed.
pub struct Subscription {
    receiver: broadcast::Receiver<ChangeEvent>,
    table: Option<Tier>,
    listeners: Arc<AtomicUsize>,
}

impl Subscription {
    pub fn table(&self) -> Option<Tier> {
        self.table
    }

    /// Wait for the next event on this subscription's table. Returns `None`
    /// once the feed is gone.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(table = ?self.table, missed, "Change feed listener lagged");
                    let table = self.table.unwrap_or(Tier::Lines20);
                    return Some(ChangeEvent::resync(table));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    fn matches(&self, event: &ChangeEvent) -> bool {
        self.table.map_or(true, |t| t == event.table)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let remaining = self.listeners.fetch_sub(1, Ordering::SeqCst) - 1;
        debug!(table = ?self.table, listeners = remaining, "Change feed subscription closed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_sink() {
        let sink = CaptureSink::new();
        sink.emit(ChangeEvent::new(Tier::Lines20, ChangeKind::Insert, 1));
        sink.emit(ChangeEvent::new(Tier::Lines60, ChangeKind::Delete, 4));
        assert_eq!(sink.count(), 2);
        assert_eq!(sink.count_table(Tier::Lines60), 1);
        assert_eq!(sink.events()[0].id, Some(1));
    }

    #[test]
    fn test_noop_sink() {
        NoOpSink.emit(ChangeEvent::new(Tier::Lines40, ChangeKind::Update, 2));
    }

    #[test]
    fn test_subscription_drop_releases_listener() {
        let feed = ChangeFeed::new(16);
        let a = feed.subscribe(Some(Tier::Lines20));
        let b = feed.subscribe(None);
        assert_eq!(feed.listener_count(), 2);
        drop(a);
        assert_eq!(feed.listener_count(), 1);
        drop(b);
        assert_eq!(feed.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_subscription_filters_by_table() {
        let feed = ChangeFeed::new(16);
        let mut sub = feed.subscribe(Some(Tier::Lines60));
        feed.emit(ChangeEvent::new(Tier::Lines20, ChangeKind::Insert, 1));
        feed.emit(ChangeEvent::new(Tier::Lines60, ChangeKind::Update, 9));

        let event = sub.recv().await.unwrap();
        assert_eq!(event.table, Tier::Lines60);
        assert_eq!(event.id, Some(9));
    }

    #[tokio::test]
    async fn test_lagged_listener_gets_resync() {
        let feed = ChangeFeed::new(1);
        let mut sub = feed.subscribe(Some(Tier::Lines40));
        for id in 0..4 {
            feed.emit(ChangeEvent::new(Tier::Lines40, ChangeKind::Insert, id));
        }
        let event = sub.recv().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Resync);
        assert_eq!(event.table, Tier::Lines40);
    }
}
