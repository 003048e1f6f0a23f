use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::trace;
use uuid::Uuid;

use courier_types::events::GatewayEvent;
use courier_types::models::RoomId;

pub type ConnId = Uuid;

/// Room-scoped, in-process fanout. Holds only transient subscription state;
/// the message store is the durable log, so nothing published here is ever
/// buffered or replayed.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Outbound channel per live connection.
    connections: RwLock<HashMap<ConnId, mpsc::UnboundedSender<GatewayEvent>>>,

    /// Which connections listen to which room. Lock order when both are
    /// needed: rooms first, then connections.
    rooms: RwLock<HashMap<RoomId, HashSet<ConnId>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                connections: RwLock::new(HashMap::new()),
                rooms: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Register a new connection. Events for its subscribed rooms arrive on
    /// the returned receiver in publish order.
    pub async fn register_connection(&self) -> (ConnId, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.connections.write().await.insert(conn_id, tx);
        (conn_id, rx)
    }

    /// Start delivering a room's events to a connection. Joining a room the
    /// connection already listens to is a no-op.
    pub async fn subscribe(&self, conn_id: ConnId, room_id: RoomId) {
        self.inner
            .rooms
            .write()
            .await
            .entry(room_id)
            .or_default()
            .insert(conn_id);
    }

    pub async fn unsubscribe(&self, conn_id: ConnId, room_id: RoomId) {
        let mut rooms = self.inner.rooms.write().await;
        if let Some(subscribers) = rooms.get_mut(&room_id) {
            subscribers.remove(&conn_id);
            if subscribers.is_empty() {
                rooms.remove(&room_id);
            }
        }
    }

    /// Drop every subscription of a connection and forget it. Called on
    /// disconnect.
    pub async fn unsubscribe_all(&self, conn_id: ConnId) {
        let mut rooms = self.inner.rooms.write().await;
        rooms.retain(|_, subscribers| {
            subscribers.remove(&conn_id);
            !subscribers.is_empty()
        });
        drop(rooms);

        self.inner.connections.write().await.remove(&conn_id);
    }

    /// Deliver an event to every connection subscribed to the room at this
    /// instant. A dead or slow subscriber only loses its own delivery; the
    /// unbounded per-connection channels mean no subscriber can block the
    /// rest, and sequential publishes arrive at each subscriber in call
    /// order.
    pub async fn publish(&self, room_id: RoomId, event: GatewayEvent) {
        let rooms = self.inner.rooms.read().await;
        let Some(subscribers) = rooms.get(&room_id) else {
            return;
        };

        let connections = self.inner.connections.read().await;
        for conn_id in subscribers {
            if let Some(tx) = connections.get(conn_id) {
                if tx.send(event.clone()).is_err() {
                    trace!("subscriber {} of room {} already gone", conn_id, room_id);
                }
            }
        }
    }

    /// Forget a room's subscriber set after the room itself is deleted.
    pub async fn drop_room(&self, room_id: RoomId) {
        self.inner.rooms.write().await.remove(&room_id);
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_event(message_id: i64) -> GatewayEvent {
        GatewayEvent::Read {
            message_id,
            user_id: "alice".into(),
        }
    }

    #[tokio::test]
    async fn publish_reaches_only_the_rooms_subscribers() {
        let dispatcher = Dispatcher::new();
        let (sub, mut sub_rx) = dispatcher.register_connection().await;
        let (other, mut other_rx) = dispatcher.register_connection().await;

        dispatcher.subscribe(sub, RoomId(1)).await;
        dispatcher.subscribe(other, RoomId(2)).await;

        dispatcher.publish(RoomId(1), read_event(1)).await;

        assert!(sub_rx.try_recv().is_ok());
        assert!(other_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribed_connection_receives_nothing() {
        let dispatcher = Dispatcher::new();
        let (conn, mut rx) = dispatcher.register_connection().await;

        dispatcher.subscribe(conn, RoomId(1)).await;
        dispatcher.unsubscribe(conn, RoomId(1)).await;
        dispatcher.publish(RoomId(1), read_event(1)).await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_all_covers_every_room() {
        let dispatcher = Dispatcher::new();
        let (conn, mut rx) = dispatcher.register_connection().await;

        dispatcher.subscribe(conn, RoomId(1)).await;
        dispatcher.subscribe(conn, RoomId(2)).await;
        dispatcher.unsubscribe_all(conn).await;

        dispatcher.publish(RoomId(1), read_event(1)).await;
        dispatcher.publish(RoomId(2), read_event(2)).await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn rejoining_a_room_does_not_duplicate_delivery() {
        let dispatcher = Dispatcher::new();
        let (conn, mut rx) = dispatcher.register_connection().await;

        dispatcher.subscribe(conn, RoomId(1)).await;
        dispatcher.subscribe(conn, RoomId(1)).await;
        dispatcher.publish(RoomId(1), read_event(1)).await;

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_order_is_preserved_per_subscriber() {
        let dispatcher = Dispatcher::new();
        let (conn, mut rx) = dispatcher.register_connection().await;
        dispatcher.subscribe(conn, RoomId(1)).await;

        for i in 0..10 {
            dispatcher.publish(RoomId(1), read_event(i)).await;
        }

        for i in 0..10 {
            match rx.try_recv().unwrap() {
                GatewayEvent::Read { message_id, .. } => assert_eq!(message_id, i),
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn dead_subscriber_does_not_break_fanout() {
        let dispatcher = Dispatcher::new();
        let (dead, dead_rx) = dispatcher.register_connection().await;
        let (live, mut live_rx) = dispatcher.register_connection().await;

        dispatcher.subscribe(dead, RoomId(1)).await;
        dispatcher.subscribe(live, RoomId(1)).await;
        drop(dead_rx);

        dispatcher.publish(RoomId(1), read_event(1)).await;

        assert!(live_rx.try_recv().is_ok());
    }
}
