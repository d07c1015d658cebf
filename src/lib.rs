//! A distributed hub lifetime manager: routes RPC-style invocations to
//! sticky client connections spread across a cluster of servers, addressed
//! by connection id, user id, or group name, over a shared pub/sub broker.
//!
//! [`HubLifetimeManager`] is the entry point. Everything else in this crate
//! exists to support it: the local [`registry::ConnectionRegistry`] and
//! [`group::GroupRegistry`], the [`ack::AckCoordinator`] used to confirm
//! group commands forwarded to another server, and the [`broker::Broker`]
//! abstraction the manager publishes/subscribes through.

pub mod ack;
pub mod broker;
pub mod config;
pub mod connection;
pub mod error;
pub mod group;
pub mod manager;
pub mod registry;

pub use broker::{Broker, BrokerError, ChannelHandler, SubscriptionId};
pub use config::ManagerConfig;
pub use connection::{ConnectionHandle, FeatureBag, WriteError};
pub use error::ManagerError;
pub use manager::HubLifetimeManager;
pub use registry::{ConnectionRegistry, SharedConnection, SharedRegisteredConnection};

pub use hub_wire;
