//! The pub/sub abstraction a [`crate::manager::HubLifetimeManager`] runs on
//! top of. A production deployment backs this with Redis, NATS, or similar;
//! `hub-test-support` backs it with an in-process broker for tests.

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// The future a [`ChannelHandler`] returns. Boxed because the handler is
/// stored behind a trait object and invoked from many call sites.
pub type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// A callback invoked with the raw bytes published to a subscribed channel.
pub type ChannelHandler = Arc<dyn Fn(Vec<u8>) -> HandlerFuture + Send + Sync>;

/// Identifies one call to [`Broker::subscribe`], so it can later be torn
/// down individually with [`Broker::unsubscribe`] without disturbing any
/// other handler registered on the same channel.
///
/// This mirrors real pub/sub clients (e.g. `StackExchange.Redis`'s
/// per-handler `UnsubscribeAsync` overload): a channel name alone isn't
/// enough to identify "this one connection's subscription" when several
/// connections belonging to the same user all listen on `u:{userId}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    pub channel: String,
    token: u64,
}

impl SubscriptionId {
    pub fn new(channel: impl Into<String>) -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self {
            channel: channel.into(),
            token: NEXT.fetch_add(1, Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("subscribe to {channel:?} failed: {source}")]
    Subscribe { channel: String, source: String },

    #[error("unsubscribe from {channel:?} failed: {source}")]
    Unsubscribe { channel: String, source: String },

    #[error("publish to {channel:?} failed: {source}")]
    Publish { channel: String, source: String },
}

/// A pub/sub broker: named channels, byte payloads, many independent
/// subscribers per channel.
///
/// Multiple calls to `subscribe` on the same channel register independent
/// listeners -- unlike a `HashMap<channel, handler>`, a real broker client
/// (and the in-memory one in `hub-test-support`) fires every registered
/// handler on publish. This is what lets two connections belonging to the
/// same user each subscribe their own handler to `u:{userId}` and later
/// unsubscribe independently.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn subscribe(
        &self,
        channel: &str,
        handler: ChannelHandler,
    ) -> Result<SubscriptionId, BrokerError>;

    async fn unsubscribe(&self, subscription: &SubscriptionId) -> Result<(), BrokerError>;

    async fn publish(&self, channel: &str, bytes: Vec<u8>) -> Result<(), BrokerError>;
}
