//! # Live-Update Broadcaster
//!
//! Per-session fan-out of observer events. Delivery is best effort: closed
//! connections are skipped, nothing is queued or replayed, and a reconnecting
//! observer re-reads state and subscribes again.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.4.0
//! - **Toggleable**: false

use anyhow::{anyhow, Result};
use dashmap::DashMap;
use log::{debug, error};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::ipc::protocol::ObserverEvent;

pub type ConnectionId = u64;

/// The two things the broadcaster needs from a transport
pub trait ObserverConnection: Send + Sync {
    fn id(&self) -> ConnectionId;

    /// Queue one serialized event for delivery
    fn send(&self, payload: &str) -> Result<()>;

    fn is_open(&self) -> bool;
}

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Connection backed by a channel drained by the socket writer task
pub struct ChannelConnection {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelConnection {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            tx,
        }
    }
}

impl ObserverConnection for ChannelConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, payload: &str) -> Result<()> {
        self.tx
            .send(payload.to_string())
            .map_err(|_| anyhow!("connection {} closed", self.id))
    }

    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Session id -> subscribed connections
#[derive(Default)]
pub struct Broadcaster {
    sessions: DashMap<String, HashMap<ConnectionId, Arc<dyn ObserverConnection>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, session_id: &str, conn: Arc<dyn ObserverConnection>) {
        let id = conn.id();
        self.sessions
            .entry(session_id.to_string())
            .or_default()
            .insert(id, conn);
        debug!("Connection {} subscribed to session {}", id, session_id);
    }

    pub fn unsubscribe(&self, session_id: &str, conn_id: ConnectionId) {
        if let Some(mut set) = self.sessions.get_mut(session_id) {
            set.remove(&conn_id);
        }
        self.sessions.remove_if(session_id, |_, set| set.is_empty());
        debug!("Connection {} unsubscribed from session {}", conn_id, session_id);
    }

    /// Drop a closed connection from every session it joined
    pub fn remove_connection(&self, conn_id: ConnectionId) {
        for mut entry in self.sessions.iter_mut() {
            entry.value_mut().remove(&conn_id);
        }
        self.sessions.retain(|_, set| !set.is_empty());
    }

    /// Serialize once and push to every open subscriber; returns how many accepted it
    pub fn publish(&self, session_id: &str, event: &ObserverEvent) -> usize {
        // Snapshot so no map shard lock is held while sending
        let targets: Vec<Arc<dyn ObserverConnection>> = match self.sessions.get(session_id) {
            Some(set) => set.values().cloned().collect(),
            None => return 0,
        };

        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to serialize event for session {}: {}", session_id, e);
                return 0;
            }
        };

        targets
            .iter()
            .filter(|conn| conn.is_open())
            .filter(|conn| conn.send(&payload).is_ok())
            .count()
    }

    pub fn subscriber_count(&self, session_id: &str) -> usize {
        self.sessions.get(session_id).map(|set| set.len()).unwrap_or(0)
    }

    pub fn total_subscribers(&self) -> usize {
        self.sessions.iter().map(|entry| entry.value().len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SessionStatus;

    fn connection() -> (Arc<ChannelConnection>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(ChannelConnection::new(tx)), rx)
    }

    fn status(session_id: &str) -> ObserverEvent {
        ObserverEvent::SessionStatus {
            session_id: session_id.into(),
            status: SessionStatus::Running,
        }
    }

    #[test]
    fn test_publish_reaches_only_that_session() {
        let broadcaster = Broadcaster::new();
        let (a, mut a_rx) = connection();
        let (b, mut b_rx) = connection();
        let (other, mut other_rx) = connection();
        broadcaster.subscribe("s1", a.clone());
        broadcaster.subscribe("s1", b.clone());
        broadcaster.subscribe("s2", other.clone());

        assert_eq!(broadcaster.publish("s1", &status("s1")), 2);
        assert!(a_rx.try_recv().unwrap().contains("session_status"));
        assert!(b_rx.try_recv().is_ok());
        assert!(other_rx.try_recv().is_err());
    }

    #[test]
    fn test_unsubscribe_leaves_others() {
        let broadcaster = Broadcaster::new();
        let (a, mut a_rx) = connection();
        let (b, mut b_rx) = connection();
        broadcaster.subscribe("s1", a.clone());
        broadcaster.subscribe("s1", b.clone());

        broadcaster.unsubscribe("s1", a.id());
        assert_eq!(broadcaster.publish("s1", &status("s1")), 1);
        assert!(a_rx.try_recv().is_err());
        assert!(b_rx.try_recv().is_ok());

        broadcaster.unsubscribe("s1", b.id());
        assert_eq!(broadcaster.subscriber_count("s1"), 0);
        assert_eq!(broadcaster.publish("s1", &status("s1")), 0);
    }

    #[test]
    fn test_closed_connections_skipped() {
        let broadcaster = Broadcaster::new();
        let (a, a_rx) = connection();
        let (b, mut b_rx) = connection();
        broadcaster.subscribe("s1", a);
        broadcaster.subscribe("s1", b);
        drop(a_rx);

        assert_eq!(broadcaster.publish("s1", &status("s1")), 1);
        assert!(b_rx.try_recv().is_ok());
    }

    #[test]
    fn test_remove_connection_everywhere() {
        let broadcaster = Broadcaster::new();
        let (a, _a_rx) = connection();
        let (b, _b_rx) = connection();
        broadcaster.subscribe("s1", a.clone());
        broadcaster.subscribe("s2", a.clone());
        broadcaster.subscribe("s2", b.clone());
        assert_eq!(broadcaster.total_subscribers(), 3);

        broadcaster.remove_connection(a.id());
        assert_eq!(broadcaster.subscriber_count("s1"), 0);
        assert_eq!(broadcaster.subscriber_count("s2"), 1);
        assert_eq!(broadcaster.total_subscribers(), 1);
    }

    #[test]
    fn test_resubscribe_is_idempotent() {
        let broadcaster = Broadcaster::new();
        let (a, mut a_rx) = connection();
        broadcaster.subscribe("s1", a.clone());
        broadcaster.subscribe("s1", a.clone());
        assert_eq!(broadcaster.publish("s1", &status("s1")), 1);
        assert!(a_rx.try_recv().is_ok());
        assert!(a_rx.try_recv().is_err());
    }
}
