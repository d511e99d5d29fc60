use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use crate::connection::Connection;
use crate::node::NodeInfo;

/// Ordered set of open sessions.
///
/// Order runs from least to most recently used. Lookups by remote address
/// prefer the most recently used session; callers promote or demote
/// explicitly. Fully closed sessions remove themselves.
#[derive(Clone, Default)]
pub struct TcpConnectionPool {
    inner: Arc<PoolInner>,
}

#[derive(Default)]
struct PoolInner {
    connections: Mutex<Vec<Connection>>,
    max_connections: Option<usize>,
}

impl TcpConnectionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// A pool that evicts its least recently used session when full.
    pub fn with_max_connections(max: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                connections: Mutex::new(Vec::new()),
                max_connections: Some(max.max(1)),
            }),
        }
    }

    /// Add a session as most recently used. Returns the evicted session,
    /// already closed, when the pool was full.
    pub fn add(&self, connection: Connection) -> Option<Connection> {
        if connection.is_closed() {
            return None;
        }

        let evicted = {
            let mut connections = self.inner.connections.lock();
            if connections.iter().any(|c| c.same_as(&connection)) {
                return None;
            }
            let evicted = match self.inner.max_connections {
                Some(max) if connections.len() >= max => Some(connections.remove(0)),
                _ => None,
            };
            connections.push(connection.clone());
            evicted
        };

        let weak: Weak<PoolInner> = Arc::downgrade(&self.inner);
        connection.on_close(move |closed| {
            if let Some(inner) = weak.upgrade() {
                TcpConnectionPool { inner }.remove(closed);
            }
        });

        if let Some(old) = &evicted {
            debug!(id = old.id(), "evicting least recently used session");
            old.close();
        }
        evicted
    }

    /// Remove a session. Returns false when it was not pooled.
    pub fn remove(&self, connection: &Connection) -> bool {
        let mut connections = self.inner.connections.lock();
        let before = connections.len();
        connections.retain(|c| !c.same_as(connection));
        before != connections.len()
    }

    /// Most recently used open session to `remote`.
    pub fn find(&self, remote: &NodeInfo) -> Option<Connection> {
        self.inner.connections.lock()
            .iter()
            .rev()
            .find(|c| c.remote() == remote && !c.is_closed())
            .cloned()
    }

    /// Open sessions to `remote`, most recently used first.
    pub fn connections_to(&self, remote: &NodeInfo) -> Vec<Connection> {
        self.inner.connections.lock()
            .iter()
            .rev()
            .filter(|c| c.remote() == remote)
            .cloned()
            .collect()
    }

    /// Move a session to the most recently used end.
    pub fn promote(&self, connection: &Connection) -> bool {
        let mut connections = self.inner.connections.lock();
        match connections.iter().position(|c| c.same_as(connection)) {
            Some(index) => {
                let conn = connections.remove(index);
                connections.push(conn);
                true
            }
            None => false,
        }
    }

    /// Move a session to the least recently used end.
    pub fn demote(&self, connection: &Connection) -> bool {
        let mut connections = self.inner.connections.lock();
        match connections.iter().position(|c| c.same_as(connection)) {
            Some(index) => {
                let conn = connections.remove(index);
                connections.insert(0, conn);
                true
            }
            None => false,
        }
    }

    /// Snapshot of all sessions, least recently used first.
    pub fn connections(&self) -> Vec<Connection> {
        self.inner.connections.lock().clone()
    }

    pub fn contains(&self, connection: &Connection) -> bool {
        self.inner.connections.lock().iter().any(|c| c.same_as(connection))
    }

    pub fn len(&self) -> usize {
        self.inner.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.connections.lock().is_empty()
    }

    /// Close every pooled session.
    pub fn close_all(&self) {
        for connection in self.connections() {
            connection.close();
        }
        self.inner.connections.lock().clear();
    }
}
