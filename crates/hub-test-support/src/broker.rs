use async_trait::async_trait;
use hub_core::{Broker, BrokerError, ChannelHandler, SubscriptionId};
use std::collections::HashMap;
use tokio::sync::Mutex;

struct Subscriber {
    id: SubscriptionId,
    handler: ChannelHandler,
}

/// A single-process pub/sub broker: every `subscribe` call on a channel
/// registers an independent listener, and `publish` invokes all of them.
#[derive(Default)]
pub struct InMemoryBroker {
    channels: Mutex<HashMap<String, Vec<Subscriber>>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions on `channel`. Useful for asserting the
    /// subscribe-on-first-member / unsubscribe-on-last-member invariant.
    pub async fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .lock()
            .await
            .get(channel)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn subscribe(
        &self,
        channel: &str,
        handler: ChannelHandler,
    ) -> Result<SubscriptionId, BrokerError> {
        let id = SubscriptionId::new(channel);
        self.channels
            .lock()
            .await
            .entry(channel.to_owned())
            .or_default()
            .push(Subscriber {
                id: id.clone(),
                handler,
            });
        Ok(id)
    }

    async fn unsubscribe(&self, subscription: &SubscriptionId) -> Result<(), BrokerError> {
        let mut channels = self.channels.lock().await;
        if let Some(subscribers) = channels.get_mut(&subscription.channel) {
            subscribers.retain(|s| s.id != *subscription);
            if subscribers.is_empty() {
                channels.remove(&subscription.channel);
            }
        }
        Ok(())
    }

    async fn publish(&self, channel: &str, bytes: Vec<u8>) -> Result<(), BrokerError> {
        let handlers: Vec<ChannelHandler> = {
            let channels = self.channels.lock().await;
            channels
                .get(channel)
                .map(|subscribers| subscribers.iter().map(|s| s.handler.clone()).collect())
                .unwrap_or_default()
        };
        for handler in handlers {
            handler(bytes.clone()).await;
        }
        Ok(())
    }
}
