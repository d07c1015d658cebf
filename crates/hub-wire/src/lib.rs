//! Wire-level building blocks for the distributed hub lifetime manager:
//! the VarInt codec, broker channel naming, the multi-protocol
//! serialization cache, and the three inter-server frame kinds.
//!
//! This crate has no opinion on *how* frames reach another server -- that's
//! the broker's job, modeled in `hub-core`. It only knows how to turn a
//! [`HubMessage`] and a target address into bytes, and back.

pub mod cache;
pub mod channel;
pub mod error;
pub mod frame;
pub mod protocol;
pub mod varint;

pub use cache::SerializationCache;
pub use channel::{channel_name, Address};
pub use error::WireError;
pub use frame::{AckFrame, GroupAction, GroupCommandFrame, InvocationFrame};
pub use protocol::{
    HubMessage, HubProtocol, InvocationMessage, JsonHubProtocol, SharedHubProtocol,
};
