//! The local, single-server registry of connected clients. Every server in
//! the cluster holds one: it only ever knows about connections that are
//! physically attached to it.

use crate::connection::{ConnectionHandle, FeatureBag};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub type SharedConnection = Arc<dyn ConnectionHandle>;

/// A connection handle paired with the bookkeeping the manager layers on
/// top of it.
pub struct RegisteredConnection {
    pub handle: SharedConnection,
    pub features: FeatureBag,
}

impl RegisteredConnection {
    pub fn connection_id(&self) -> &str {
        self.handle.connection_id()
    }
}

pub type SharedRegisteredConnection = Arc<RegisteredConnection>;

#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, SharedRegisteredConnection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, handle: SharedConnection) -> SharedRegisteredConnection {
        let registered = Arc::new(RegisteredConnection {
            handle,
            features: FeatureBag::new(),
        });
        self.connections
            .write()
            .await
            .insert(registered.connection_id().to_owned(), registered.clone());
        registered
    }

    pub async fn remove(&self, connection_id: &str) -> Option<SharedRegisteredConnection> {
        self.connections.write().await.remove(connection_id)
    }

    pub async fn get(&self, connection_id: &str) -> Option<SharedRegisteredConnection> {
        self.connections.read().await.get(connection_id).cloned()
    }

    pub async fn snapshot(&self) -> Vec<SharedRegisteredConnection> {
        self.connections.read().await.values().cloned().collect()
    }
}
