//! Live subscriber registry for order status fan-out.
//!
//! Tracks which WebSocket connections are watching which order. Entries are
//! keyed by a per-connection subscriber id so a closing connection removes
//! exactly itself, and empty order entries are swept so the map does not grow
//! with dead orders.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

/// Unique identifier for one WebSocket subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

struct Subscriber {
    id: SubscriberId,
    sender: UnboundedSender<String>,
}

/// Process-wide map from order id to its live subscribers.
#[derive(Default, Clone)]
pub struct SubscriberRegistry {
    inner: Arc<RwLock<HashMap<i64, Vec<Subscriber>>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber for an order. Returns the subscription id (for
    /// cleanup) and the channel the broadcast side writes frames into.
    pub async fn add_subscriber(&self, order_id: i64) -> (SubscriberId, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        let subscriber_id = SubscriberId::new();

        let mut guard = self.inner.write().await;
        guard.entry(order_id).or_default().push(Subscriber {
            id: subscriber_id,
            sender: tx,
        });

        tracing::debug!(
            order_id = order_id,
            subscribers = guard.get(&order_id).map(|v| v.len()).unwrap_or(0),
            "Subscriber added"
        );

        (subscriber_id, rx)
    }

    /// Remove one subscription. Must be called when its connection closes;
    /// the last removal for an order drops the map entry entirely.
    pub async fn remove_subscriber(&self, order_id: i64, subscriber_id: SubscriberId) {
        let mut guard = self.inner.write().await;

        if let Some(subscribers) = guard.get_mut(&order_id) {
            subscribers.retain(|s| s.id != subscriber_id);
            if subscribers.is_empty() {
                guard.remove(&order_id);
            }
        }
    }

    /// Send a frame to every live subscriber of an order, best effort.
    ///
    /// Subscribers whose channel is gone are dropped on the spot; an order
    /// with no subscribers is a silent no-op.
    pub async fn broadcast(&self, order_id: i64, frame: String) {
        let mut guard = self.inner.write().await;
        if let Some(subscribers) = guard.get_mut(&order_id) {
            let before = subscribers.len();
            subscribers.retain(|s| s.sender.send(frame.clone()).is_ok());
            let dropped = before - subscribers.len();
            if dropped > 0 {
                tracing::debug!(
                    order_id = order_id,
                    dropped = dropped,
                    "Dropped dead subscribers during broadcast"
                );
            }
            if subscribers.is_empty() {
                guard.remove(&order_id);
            }
        }
    }

    pub async fn subscriber_count(&self, order_id: i64) -> usize {
        let guard = self.inner.read().await;
        guard.get(&order_id).map(|v| v.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_live_subscribers() {
        let registry = SubscriberRegistry::new();
        let (_id_a, mut rx_a) = registry.add_subscriber(1).await;
        let (_id_b, mut rx_b) = registry.add_subscriber(1).await;

        registry.broadcast(1, r#"{"order_id":1,"status":"PAID"}"#.into()).await;

        assert_eq!(rx_a.recv().await.unwrap(), r#"{"order_id":1,"status":"PAID"}"#);
        assert_eq!(rx_b.recv().await.unwrap(), r#"{"order_id":1,"status":"PAID"}"#);
    }

    #[tokio::test]
    async fn broadcast_to_unknown_order_is_a_noop() {
        let registry = SubscriberRegistry::new();
        registry.broadcast(42, "frame".into()).await;
        assert_eq!(registry.subscriber_count(42).await, 0);
    }

    #[tokio::test]
    async fn dead_subscribers_are_dropped_on_broadcast() {
        let registry = SubscriberRegistry::new();
        let (_id, rx) = registry.add_subscriber(7).await;
        drop(rx);

        registry.broadcast(7, "frame".into()).await;

        assert_eq!(registry.subscriber_count(7).await, 0);
    }

    #[tokio::test]
    async fn remove_sweeps_empty_entries() {
        let registry = SubscriberRegistry::new();
        let (id, _rx) = registry.add_subscriber(3).await;

        registry.remove_subscriber(3, id).await;

        assert_eq!(registry.subscriber_count(3).await, 0);
        assert!(registry.inner.read().await.get(&3).is_none());
    }

    #[tokio::test]
    async fn remove_only_touches_its_own_subscription() {
        let registry = SubscriberRegistry::new();
        let (id_a, _rx_a) = registry.add_subscriber(5).await;
        let (_id_b, mut rx_b) = registry.add_subscriber(5).await;

        registry.remove_subscriber(5, id_a).await;
        registry.broadcast(5, "frame".into()).await;

        assert_eq!(rx_b.recv().await.unwrap(), "frame");
        assert_eq!(registry.subscriber_count(5).await, 1);
    }

    #[tokio::test]
    async fn late_subscriber_receives_nothing() {
        let registry = SubscriberRegistry::new();
        registry.broadcast(9, "frame".into()).await;

        // Subscribing after the event: no replay
        let (_id, mut rx) = registry.add_subscriber(9).await;
        assert!(rx.try_recv().is_err());
    }
}
