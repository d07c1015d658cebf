//! The per-server map of group name -> member connections, and the
//! subscribe-on-first-member / unsubscribe-on-last-member bookkeeping that
//! keeps the broker's channel list proportional to actual group usage.

use crate::broker::{Broker, BrokerError, ChannelHandler, SubscriptionId};
use crate::registry::SharedRegisteredConnection;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::RwLock;

/// The local membership of one group's broker channel on this server.
///
/// The inner lock is held across the broker `subscribe`/`unsubscribe` await
/// so that a concurrent join and leave can never race into a channel that's
/// subscribed when it should be torn down, or vice versa.
pub struct GroupEntry {
    inner: AsyncMutex<GroupEntryInner>,
}

#[derive(Default)]
struct GroupEntryInner {
    connections: HashMap<String, SharedRegisteredConnection>,
    subscription: Option<SubscriptionId>,
}

impl GroupEntry {
    fn empty() -> Self {
        Self {
            inner: AsyncMutex::new(GroupEntryInner::default()),
        }
    }

    pub async fn snapshot(&self) -> Vec<SharedRegisteredConnection> {
        self.inner.lock().await.connections.values().cloned().collect()
    }

    /// Adds `connection` to this entry. Subscribes `channel` on the broker
    /// if this raises the membership count from zero to one.
    pub async fn add_connection(
        &self,
        connection: SharedRegisteredConnection,
        channel: &str,
        broker: &dyn Broker,
        handler: ChannelHandler,
    ) -> Result<(), BrokerError> {
        let mut inner = self.inner.lock().await;
        let was_empty = inner.connections.is_empty();
        inner
            .connections
            .insert(connection.connection_id().to_owned(), connection);
        if was_empty {
            let subscription = broker.subscribe(channel, handler).await?;
            inner.subscription = Some(subscription);
        }
        Ok(())
    }

    /// Removes `connection_id` from this entry. Unsubscribes the group's
    /// channel on the broker if this empties the membership.
    pub async fn remove_connection(
        &self,
        connection_id: &str,
        broker: &dyn Broker,
    ) -> Result<(), BrokerError> {
        let mut inner = self.inner.lock().await;
        inner.connections.remove(connection_id);
        if inner.connections.is_empty() {
            if let Some(subscription) = inner.subscription.take() {
                broker.unsubscribe(&subscription).await?;
            }
        }
        Ok(())
    }
}

/// All groups with at least one locally-connected member, keyed by the
/// group's broker channel name.
///
/// Group entries created on this server are retained even once empty of
/// local connections, on the theory that a group a hub repeatedly
/// add/removes the same connections to/from is common and re-subscribing
/// every time is wasteful; see the design notes for the tradeoff this
/// accepts.
#[derive(Default)]
pub struct GroupRegistry {
    groups: RwLock<HashMap<String, Arc<GroupEntry>>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, channel: &str) -> Option<Arc<GroupEntry>> {
        self.groups.read().await.get(channel).cloned()
    }

    pub async fn get_or_create(&self, channel: &str) -> Arc<GroupEntry> {
        if let Some(existing) = self.get(channel).await {
            return existing;
        }
        let mut groups = self.groups.write().await;
        groups
            .entry(channel.to_owned())
            .or_insert_with(|| Arc::new(GroupEntry::empty()))
            .clone()
    }
}
