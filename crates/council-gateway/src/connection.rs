use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// A connected WebSocket observer.
#[derive(Debug)]
pub struct Connection {
    pub id: Uuid,
    /// Event subscription backing this connection.
    pub observer_id: Uuid,
    /// Direct replies to this connection only (acks and errors).
    pub tx: mpsc::UnboundedSender<String>,
}

/// Tracks active WebSocket connections.
pub struct ConnectionManager {
    connections: RwLock<HashMap<Uuid, Connection>>,
}

impl ConnectionManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn add(&self, conn: Connection) {
        let id = conn.id;
        let observer_id = conn.observer_id;
        self.connections.write().await.insert(id, conn);
        tracing::info!(connection_id = %id, observer_id = %observer_id, "Connection added");
    }

    pub async fn remove(&self, id: Uuid) {
        self.connections.write().await.remove(&id);
        tracing::info!(connection_id = %id, "Connection removed");
    }

    /// Sends a reply to one connection. Returns false if it is gone.
    pub async fn send_to(&self, id: Uuid, message: &str) -> bool {
        let conns = self.connections.read().await;
        conns
            .get(&id)
            .is_some_and(|conn| conn.tx.send(message.to_string()).is_ok())
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }
}
