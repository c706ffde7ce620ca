//! Registry of live connections with fan-out broadcast.

use crate::connection::Connection;
use crate::receive::spawn_receive_loop;
use crate::upgrade::UpgradeRequest;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Process-wide index of live connections.
///
/// Add and remove take the write lock; broadcasts enumerate under the read
/// lock, so they never observe a partially updated registry and may run in
/// parallel with each other. There is no built-in singleton: applications
/// construct one manager (usually inside an `Arc`) and inject it wherever
/// fan-out is needed, which also lets tests substitute a local instance.
pub struct ConnectionManager {
    connections: RwLock<HashMap<Uuid, Arc<Connection>>>,
    active_count: AtomicUsize,
}

impl ConnectionManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            active_count: AtomicUsize::new(0),
        }
    }

    /// Registers a connection, starts its receive loop, and notifies the
    /// handler via `on_connection_established`.
    ///
    /// If the handler rejects the connection the registration is rolled
    /// back and the connection closed.
    pub async fn add(self: &Arc<Self>, conn: Arc<Connection>, request: UpgradeRequest) {
        {
            let mut connections = self.connections.write().await;
            if connections.insert(conn.id(), Arc::clone(&conn)).is_none() {
                self.active_count.fetch_add(1, Ordering::Relaxed);
            }
        }
        debug!(conn_id = %conn.id(), "connection registered");

        let _receive_task = spawn_receive_loop(Arc::clone(self), Arc::clone(&conn));

        if let Err(e) = conn
            .handler()
            .on_connection_established(Arc::clone(&conn), &request)
            .await
        {
            error!(conn_id = %conn.id(), error = %e, "handler rejected connection");
            self.remove(&conn).await;
        }
    }

    /// Deletes the connection from the registry and closes it.
    ///
    /// Tolerant of connections that were never registered or were already
    /// removed; `Connection::close` is idempotent.
    pub async fn remove(&self, conn: &Arc<Connection>) {
        let removed = {
            let mut connections = self.connections.write().await;
            connections.remove(&conn.id())
        };
        if removed.is_some() {
            self.active_count.fetch_sub(1, Ordering::Relaxed);
            debug!(conn_id = %conn.id(), "connection removed");
        }
        conn.close().await;
    }

    /// Sends a text message to every live connection.
    ///
    /// The read lock is held for the whole enumeration; individual send
    /// failures are logged and do not stop delivery to the rest.
    pub async fn broadcast_text(&self, text: &str) {
        let connections = self.connections.read().await;
        for conn in connections.values() {
            if let Err(e) = conn.send_text(text).await {
                warn!(conn_id = %conn.id(), error = %e, "failed to deliver broadcast text");
            }
        }
        debug!(recipients = connections.len(), "broadcast text message");
    }

    /// Sends a binary message to every live connection.
    pub async fn broadcast_binary(&self, data: &[u8]) {
        let connections = self.connections.read().await;
        for conn in connections.values() {
            if let Err(e) = conn.send_binary(data).await {
                warn!(conn_id = %conn.id(), error = %e, "failed to deliver broadcast binary");
            }
        }
        debug!(recipients = connections.len(), "broadcast binary message");
    }

    /// Number of registered connections, without taking the lock.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
