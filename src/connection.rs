//! The manager's view of a single sticky client connection: a transport
//! handle it can write to, plus the group/channel membership bookkeeping the
//! manager attaches on top of it.

use crate::broker::SubscriptionId;
use async_trait::async_trait;
use hub_wire::{HubMessage, SerializationCache, SharedHubProtocol};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("connection write failed: {0}")]
    Failed(String),
}

/// A single sticky connection to a client, as seen by the lifetime manager.
///
/// Implementations own the actual transport (a WebSocket, a long-poll
/// buffer, whatever); the manager only ever calls `write_bytes` or the two
/// default helpers built on top of it.
#[async_trait]
pub trait ConnectionHandle: Send + Sync {
    fn connection_id(&self) -> &str;
    fn user_id(&self) -> Option<&str>;

    /// The protocol this connection negotiated at handshake time. The
    /// manager uses this to pick the right pre-encoded bytes out of a
    /// [`SerializationCache`].
    fn protocol(&self) -> &SharedHubProtocol;

    async fn write_bytes(&self, bytes: Vec<u8>) -> Result<(), WriteError>;

    /// Encodes and writes `message` directly, bypassing the serialization
    /// cache. Used for single-recipient local sends where there is no
    /// second recipient to amortize the encoding cost against.
    async fn write_message(&self, message: &HubMessage) -> Result<(), WriteError> {
        let bytes = self.protocol().encode(message);
        self.write_bytes(bytes).await
    }

    /// Writes this connection's protocol's bytes out of `cache`, encoding
    /// them first if this is the first connection of that protocol to be
    /// served from `cache`.
    async fn write_cached(&self, cache: &mut SerializationCache) -> Result<(), WriteError> {
        let bytes = cache
            .get_encoded(self.protocol().as_ref())
            .map_err(|e| WriteError::Failed(e.to_string()))?
            .to_vec();
        self.write_bytes(bytes).await
    }
}

/// Per-connection state the manager maintains alongside a [`ConnectionHandle`]:
/// which broker channels it owns a subscription on, and which groups it has
/// joined.
#[derive(Debug, Default)]
pub struct FeatureBag {
    inner: Mutex<FeatureBagInner>,
}

#[derive(Debug, Default)]
struct FeatureBagInner {
    subscriptions: Vec<SubscriptionId>,
    // lowercase group name -> originally-cased group name. Membership is
    // tested case-insensitively, but callers that need the channel string
    // (on_disconnected's cleanup sweep) get back the casing they joined with.
    groups: HashMap<String, String>,
}

impl FeatureBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_subscription(&self, subscription: SubscriptionId) {
        self.inner.lock().unwrap().subscriptions.push(subscription);
    }

    pub fn subscriptions(&self) -> Vec<SubscriptionId> {
        self.inner.lock().unwrap().subscriptions.clone()
    }

    /// Records membership in `group_name`. Returns `true` if this is a new
    /// membership, `false` if the connection (case-insensitively) already
    /// belongs to this group.
    pub fn join_group(&self, group_name: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let key = group_name.to_lowercase();
        if inner.groups.contains_key(&key) {
            false
        } else {
            inner.groups.insert(key, group_name.to_owned());
            true
        }
    }

    pub fn leave_group(&self, group_name: &str) {
        self.inner
            .lock()
            .unwrap()
            .groups
            .remove(&group_name.to_lowercase());
    }

    pub fn groups(&self) -> Vec<String> {
        self.inner.lock().unwrap().groups.values().cloned().collect()
    }
}
