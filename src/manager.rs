//! The facade applications talk to: [`HubLifetimeManager`]. It owns the
//! local connection and group registries, the ack coordinator, and the
//! subscriptions that keep all of the above in sync with the rest of the
//! cluster over the broker.

use crate::ack::AckCoordinator;
use crate::broker::{Broker, ChannelHandler, HandlerFuture};
use crate::config::ManagerConfig;
use crate::error::ManagerError;
use crate::group::GroupRegistry;
use crate::registry::{ConnectionRegistry, SharedConnection, SharedRegisteredConnection};
use futures_util::future::join_all;
use hub_wire::{
    channel_name, AckFrame, Address, GroupAction, GroupCommandFrame, HubMessage, InvocationFrame,
    InvocationMessage, SerializationCache, SharedHubProtocol,
};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Routes invocations to sticky client connections across a cluster of
/// servers, over a shared pub/sub broker.
///
/// Cheaply `Clone`-able: every clone shares the same underlying state, which
/// is what lets channel handler closures keep a live reference to the
/// manager without a circular `Arc`.
pub struct HubLifetimeManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: ManagerConfig,
    server_name: String,
    broker: Arc<dyn Broker>,
    protocols: Vec<SharedHubProtocol>,
    connections: ConnectionRegistry,
    groups: GroupRegistry,
    ack: AckCoordinator,
}

impl Clone for HubLifetimeManager {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl HubLifetimeManager {
    /// Builds a manager and installs its permanent subscriptions (`all`,
    /// `groupManagement`, and this server's `ack` channel). Returns once
    /// every permanent subscription is live.
    pub async fn new(
        config: ManagerConfig,
        broker: Arc<dyn Broker>,
        protocols: Vec<SharedHubProtocol>,
    ) -> Result<Self, ManagerError> {
        let server_name = format!("{}-{}", config.hub_type_name, Uuid::new_v4());
        let inner = Arc::new(Inner {
            ack: AckCoordinator::new(config.ack_timeout),
            connections: ConnectionRegistry::new(),
            groups: GroupRegistry::new(),
            broker,
            protocols,
            server_name,
            config,
        });
        let manager = Self { inner };
        manager.install_permanent_subscriptions().await?;
        Ok(manager)
    }

    pub fn server_name(&self) -> &str {
        &self.inner.server_name
    }

    async fn install_permanent_subscriptions(&self) -> Result<(), ManagerError> {
        let all_channel = channel_name(&self.inner.config.hub_type_name, Address::All);
        let gm_channel = channel_name(&self.inner.config.hub_type_name, Address::GroupManagement);
        let ack_channel = channel_name(
            &self.inner.config.hub_type_name,
            Address::Ack(&self.inner.server_name),
        );

        let all_manager = self.clone();
        self.inner
            .broker
            .subscribe(
                &all_channel,
                Self::callback(move |bytes| {
                    let manager = all_manager.clone();
                    Box::pin(async move { manager.handle_all(bytes).await })
                }),
            )
            .await
            .map_err(|e| ManagerError::BrokerFailure(e.to_string()))?;

        let gm_manager = self.clone();
        self.inner
            .broker
            .subscribe(
                &gm_channel,
                Self::callback(move |bytes| {
                    let manager = gm_manager.clone();
                    Box::pin(async move { manager.handle_group_management(bytes).await })
                }),
            )
            .await
            .map_err(|e| ManagerError::BrokerFailure(e.to_string()))?;

        let ack_manager = self.clone();
        self.inner
            .broker
            .subscribe(
                &ack_channel,
                Self::callback(move |bytes| {
                    let manager = ack_manager.clone();
                    Box::pin(async move { manager.handle_ack(bytes).await })
                }),
            )
            .await
            .map_err(|e| ManagerError::BrokerFailure(e.to_string()))?;

        Ok(())
    }

    fn callback(f: impl Fn(Vec<u8>) -> HandlerFuture + Send + Sync + 'static) -> ChannelHandler {
        Arc::new(f)
    }

    // ---------------------------------------------------------------
    // Connection lifetime
    // ---------------------------------------------------------------

    /// Registers a newly-attached connection and subscribes it to its own
    /// `c:{id}` channel (and `u:{userId}` if it carries a user id).
    pub async fn on_connected(&self, handle: SharedConnection) -> Result<(), ManagerError> {
        let registered = self.inner.connections.insert(handle.clone()).await;
        let connection_id = handle.connection_id().to_owned();

        let c_channel = channel_name(
            &self.inner.config.hub_type_name,
            Address::Connection(&connection_id),
        );
        let c_subscription = self
            .inner
            .broker
            .subscribe(&c_channel, Self::connection_callback(registered.clone()))
            .await
            .map_err(|e| ManagerError::BrokerFailure(e.to_string()))?;
        registered.features.record_subscription(c_subscription);

        if let Some(user_id) = handle.user_id() {
            let u_channel = channel_name(&self.inner.config.hub_type_name, Address::User(user_id));
            let u_subscription = self
                .inner
                .broker
                .subscribe(&u_channel, Self::connection_callback(registered.clone()))
                .await
                .map_err(|e| ManagerError::BrokerFailure(e.to_string()))?;
            registered.features.record_subscription(u_subscription);
        }

        Ok(())
    }

    fn connection_callback(connection: SharedRegisteredConnection) -> ChannelHandler {
        Self::callback(move |bytes| {
            let connection = connection.clone();
            Box::pin(async move {
                let mut reader = &bytes[..];
                match InvocationFrame::decode(&mut reader) {
                    Ok(mut frame) => {
                        if let Err(e) = connection.handle.write_cached(&mut frame.cache).await {
                            tracing::warn!(
                                connection_id = connection.connection_id(),
                                error = %e,
                                "direct write failed"
                            );
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "malformed invocation frame on direct channel");
                    }
                }
            })
        })
    }

    /// Deregisters a connection, tears down its owned subscriptions, and
    /// removes it from every group it had joined. Individual teardown
    /// failures are logged and never prevent the rest of the cleanup.
    pub async fn on_disconnected(&self, handle: SharedConnection) {
        let connection_id = handle.connection_id().to_owned();
        let Some(registered) = self.inner.connections.remove(&connection_id).await else {
            return;
        };

        let subscriptions = registered.features.subscriptions();
        let unsubscribe_results = join_all(
            subscriptions
                .iter()
                .map(|subscription| self.inner.broker.unsubscribe(subscription)),
        )
        .await;
        for (subscription, result) in subscriptions.iter().zip(unsubscribe_results) {
            if let Err(e) = result {
                tracing::warn!(channel = %subscription.channel, error = %e, "unsubscribe failed during disconnect");
            }
        }

        let groups = registered.features.groups();
        join_all(groups.iter().map(|group_name| async {
            if let Err(e) = self.remove_group_core(&registered, group_name).await {
                tracing::warn!(group_name = %group_name, error = %e, "group cleanup failed during disconnect");
            }
        }))
        .await;
    }

    // ---------------------------------------------------------------
    // Fan-out
    // ---------------------------------------------------------------

    pub async fn send_all(&self, method: &str, args: Vec<Value>) -> Result<(), ManagerError> {
        self.send_all_except(method, args, &[]).await
    }

    pub async fn send_all_except(
        &self,
        method: &str,
        args: Vec<Value>,
        excluded_ids: &[String],
    ) -> Result<(), ManagerError> {
        let channel = channel_name(&self.inner.config.hub_type_name, Address::All);
        self.publish_invocation(&channel, method, args, excluded_ids.to_vec())
            .await
    }

    pub async fn send_connection(
        &self,
        connection_id: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<(), ManagerError> {
        if connection_id.is_empty() {
            return Err(ManagerError::ArgumentNull("connection_id"));
        }
        if let Some(registered) = self.inner.connections.get(connection_id).await {
            let message = HubMessage::Invocation(InvocationMessage::new(method, args));
            if let Err(e) = registered.handle.write_message(&message).await {
                tracing::warn!(connection_id, error = %e, "local write failed");
            }
            return Ok(());
        }
        let channel = channel_name(&self.inner.config.hub_type_name, Address::Connection(connection_id));
        self.publish_invocation(&channel, method, args, vec![]).await
    }

    pub async fn send_connections(
        &self,
        connection_ids: &[String],
        method: &str,
        args: Vec<Value>,
    ) -> Result<(), ManagerError> {
        if connection_ids.is_empty() {
            return Err(ManagerError::ArgumentNull("connection_ids"));
        }
        let message = HubMessage::Invocation(InvocationMessage::new(method, args));
        let mut shared_cache = SerializationCache::from_message(message.clone());
        for protocol in &self.inner.protocols {
            shared_cache.get_encoded(protocol.as_ref())?;
        }

        for connection_id in connection_ids {
            if let Some(registered) = self.inner.connections.get(connection_id).await {
                if let Err(e) = registered.handle.write_message(&message).await {
                    tracing::warn!(connection_id = %connection_id, error = %e, "local write failed");
                }
                continue;
            }
            let channel = channel_name(&self.inner.config.hub_type_name, Address::Connection(connection_id));
            self.publish_cached(&channel, shared_cache.clone(), vec![]).await?;
        }
        Ok(())
    }

    pub async fn send_group(&self, group_name: &str, method: &str, args: Vec<Value>) -> Result<(), ManagerError> {
        self.send_group_except(group_name, method, args, &[]).await
    }

    pub async fn send_group_except(
        &self,
        group_name: &str,
        method: &str,
        args: Vec<Value>,
        excluded_ids: &[String],
    ) -> Result<(), ManagerError> {
        if group_name.is_empty() {
            return Err(ManagerError::ArgumentNull("group_name"));
        }
        let channel = channel_name(&self.inner.config.hub_type_name, Address::Group(group_name));
        self.publish_invocation(&channel, method, args, excluded_ids.to_vec())
            .await
    }

    pub async fn send_groups(
        &self,
        group_names: &[String],
        method: &str,
        args: Vec<Value>,
    ) -> Result<(), ManagerError> {
        if group_names.is_empty() {
            return Err(ManagerError::ArgumentNull("group_names"));
        }
        let message = HubMessage::Invocation(InvocationMessage::new(method, args));
        let mut shared_cache = SerializationCache::from_message(message);
        for protocol in &self.inner.protocols {
            shared_cache.get_encoded(protocol.as_ref())?;
        }
        for group_name in group_names {
            let channel = channel_name(&self.inner.config.hub_type_name, Address::Group(group_name));
            self.publish_cached(&channel, shared_cache.clone(), vec![]).await?;
        }
        Ok(())
    }

    pub async fn send_user(&self, user_id: &str, method: &str, args: Vec<Value>) -> Result<(), ManagerError> {
        let channel = channel_name(&self.inner.config.hub_type_name, Address::User(user_id));
        self.publish_invocation(&channel, method, args, vec![]).await
    }

    pub async fn send_users(
        &self,
        user_ids: &[String],
        method: &str,
        args: Vec<Value>,
    ) -> Result<(), ManagerError> {
        if user_ids.is_empty() {
            return Err(ManagerError::ArgumentNull("user_ids"));
        }
        let message = HubMessage::Invocation(InvocationMessage::new(method, args));
        let mut shared_cache = SerializationCache::from_message(message);
        for protocol in &self.inner.protocols {
            shared_cache.get_encoded(protocol.as_ref())?;
        }
        for user_id in user_ids {
            let channel = channel_name(&self.inner.config.hub_type_name, Address::User(user_id));
            self.publish_cached(&channel, shared_cache.clone(), vec![]).await?;
        }
        Ok(())
    }

    async fn publish_invocation(
        &self,
        channel: &str,
        method: &str,
        args: Vec<Value>,
        excluded_ids: Vec<String>,
    ) -> Result<(), ManagerError> {
        let message = HubMessage::Invocation(InvocationMessage::new(method, args));
        let cache = SerializationCache::from_message(message);
        self.publish_cached(channel, cache, excluded_ids).await
    }

    async fn publish_cached(
        &self,
        channel: &str,
        cache: SerializationCache,
        excluded_ids: Vec<String>,
    ) -> Result<(), ManagerError> {
        let mut frame = InvocationFrame { excluded_ids, cache };
        let mut bytes = Vec::new();
        frame.encode(&mut bytes, &self.inner.protocols)?;
        self.inner
            .broker
            .publish(channel, bytes)
            .await
            .map_err(|e| ManagerError::BrokerFailure(e.to_string()))
    }

    // ---------------------------------------------------------------
    // Group membership
    // ---------------------------------------------------------------

    pub async fn add_group(&self, connection_id: &str, group_name: &str) -> Result<(), ManagerError> {
        if connection_id.is_empty() {
            return Err(ManagerError::ArgumentNull("connection_id"));
        }
        if group_name.is_empty() {
            return Err(ManagerError::ArgumentNull("group_name"));
        }

        if let Some(registered) = self.inner.connections.get(connection_id).await {
            return self.add_group_core(&registered, group_name).await;
        }

        self.forward_group_command(GroupAction::Add, connection_id, group_name)
            .await
    }

    pub async fn remove_group(&self, connection_id: &str, group_name: &str) -> Result<(), ManagerError> {
        if connection_id.is_empty() {
            return Err(ManagerError::ArgumentNull("connection_id"));
        }
        if group_name.is_empty() {
            return Err(ManagerError::ArgumentNull("group_name"));
        }

        if let Some(registered) = self.inner.connections.get(connection_id).await {
            return self.remove_group_core(&registered, group_name).await;
        }

        self.forward_group_command(GroupAction::Remove, connection_id, group_name)
            .await
    }

    async fn forward_group_command(
        &self,
        action: GroupAction,
        connection_id: &str,
        group_name: &str,
    ) -> Result<(), ManagerError> {
        let id = self.inner.ack.next_command_id();
        let rx = self.inner.ack.create_ack(id).await;
        let channel = channel_name(&self.inner.config.hub_type_name, Address::GroupManagement);
        let frame = GroupCommandFrame {
            id,
            server_name: self.inner.server_name.clone(),
            action,
            group_name: group_name.to_owned(),
            connection_id: connection_id.to_owned(),
        };
        let mut bytes = Vec::new();
        frame.encode(&mut bytes);
        self.inner
            .broker
            .publish(&channel, bytes)
            .await
            .map_err(|e| ManagerError::BrokerFailure(e.to_string()))?;
        self.inner.ack.wait(id, rx).await
    }

    async fn add_group_core(
        &self,
        connection: &SharedRegisteredConnection,
        group_name: &str,
    ) -> Result<(), ManagerError> {
        if !connection.features.join_group(group_name) {
            return Ok(());
        }
        let channel = channel_name(&self.inner.config.hub_type_name, Address::Group(group_name));
        let entry = self.inner.groups.get_or_create(&channel).await;
        let handler = self.group_callback(channel.clone());
        entry
            .add_connection(connection.clone(), &channel, self.inner.broker.as_ref(), handler)
            .await
            .map_err(|e| ManagerError::BrokerFailure(e.to_string()))
    }

    async fn remove_group_core(
        &self,
        connection: &SharedRegisteredConnection,
        group_name: &str,
    ) -> Result<(), ManagerError> {
        let channel = channel_name(&self.inner.config.hub_type_name, Address::Group(group_name));
        let Some(entry) = self.inner.groups.get(&channel).await else {
            return Ok(());
        };
        connection.features.leave_group(group_name);
        entry
            .remove_connection(connection.connection_id(), self.inner.broker.as_ref())
            .await
            .map_err(|e| ManagerError::BrokerFailure(e.to_string()))
    }

    fn group_callback(&self, channel: String) -> ChannelHandler {
        let manager = self.clone();
        Self::callback(move |bytes| {
            let manager = manager.clone();
            let channel = channel.clone();
            Box::pin(async move { manager.handle_group(&channel, bytes).await })
        })
    }

    // ---------------------------------------------------------------
    // Inbound dispatch
    // ---------------------------------------------------------------

    async fn handle_all(&self, bytes: Vec<u8>) {
        let mut reader = &bytes[..];
        let mut frame = match InvocationFrame::decode(&mut reader) {
            Ok(f) => f,
            Err(e) => {
                tracing::error!(error = %e, "malformed invocation frame on all channel");
                return;
            }
        };
        for registered in self.inner.connections.snapshot().await {
            if frame.excludes(registered.connection_id()) {
                continue;
            }
            if let Err(e) = registered.handle.write_cached(&mut frame.cache).await {
                tracing::warn!(
                    connection_id = registered.connection_id(),
                    error = %e,
                    "all-fanout write failed"
                );
            }
        }
    }

    async fn handle_group(&self, channel: &str, bytes: Vec<u8>) {
        let Some(entry) = self.inner.groups.get(channel).await else {
            return;
        };
        let mut reader = &bytes[..];
        let mut frame = match InvocationFrame::decode(&mut reader) {
            Ok(f) => f,
            Err(e) => {
                tracing::error!(channel, error = %e, "malformed invocation frame on group channel");
                return;
            }
        };
        for registered in entry.snapshot().await {
            if frame.excludes(registered.connection_id()) {
                continue;
            }
            if let Err(e) = registered.handle.write_cached(&mut frame.cache).await {
                tracing::warn!(
                    connection_id = registered.connection_id(),
                    error = %e,
                    "group-fanout write failed"
                );
            }
        }
    }

    async fn handle_group_management(&self, bytes: Vec<u8>) {
        let mut reader = &bytes[..];
        let frame = match GroupCommandFrame::decode(&mut reader) {
            Ok(f) => f,
            Err(e) => {
                tracing::error!(error = %e, "malformed group command frame");
                return;
            }
        };
        let Some(registered) = self.inner.connections.get(&frame.connection_id).await else {
            return;
        };

        let result = match frame.action {
            GroupAction::Add => self.add_group_core(&registered, &frame.group_name).await,
            GroupAction::Remove => self.remove_group_core(&registered, &frame.group_name).await,
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "applying forwarded group command failed");
            return;
        }

        let ack_channel = channel_name(&self.inner.config.hub_type_name, Address::Ack(&frame.server_name));
        let mut ack_bytes = Vec::new();
        AckFrame { message_id: frame.id }.encode(&mut ack_bytes);
        if let Err(e) = self.inner.broker.publish(&ack_channel, ack_bytes).await {
            tracing::warn!(error = %e, "failed to publish group command ack");
        }
    }

    async fn handle_ack(&self, bytes: Vec<u8>) {
        let mut reader = &bytes[..];
        match AckFrame::decode(&mut reader) {
            Ok(frame) => self.inner.ack.trigger_ack(frame.message_id).await,
            Err(e) => tracing::error!(error = %e, "malformed ack frame"),
        }
    }

    /// Resolves every outstanding ack wait with a shutdown error. Does not
    /// tear down broker subscriptions -- that is the broker client's job as
    /// part of its own shutdown.
    pub async fn dispose(&self) {
        self.inner.ack.dispose().await;
    }
}

// `FeatureBag` is constructed internally by `ConnectionRegistry::insert`;
// re-exported here only so downstream crates implementing `ConnectionHandle`
// don't need to reach into `crate::connection` directly.
pub use crate::connection::FeatureBag as ConnectionFeatureBag;
