//! The three framed message kinds sent over distinct broker channels:
//! `Invocation`, `GroupCommand`, and `Ack`. All are stateless encode/decode
//! functions over a [`SerializationCache`] or plain fields -- framing never
//! inspects payload bytes.

use crate::cache::SerializationCache;
use crate::error::WireError;
use crate::varint::{read_string, read_varint, write_string, write_varint};
use bytes::{Buf, BufMut};

/// The action carried by a [`GroupCommandFrame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupAction {
    Add = 0,
    Remove = 1,
}

impl GroupAction {
    fn to_byte(self) -> u8 {
        self as u8
    }

    fn from_byte(byte: u8) -> Result<Self, WireError> {
        match byte {
            0 => Ok(GroupAction::Add),
            1 => Ok(GroupAction::Remove),
            _ => Err(WireError::MalformedFrame("unknown group command action")),
        }
    }
}

/// Frame carried on `all`, `connection:{id}`, `user:{id}`, `group:{name}`.
pub struct InvocationFrame {
    pub excluded_ids: Vec<String>,
    pub cache: SerializationCache,
}

impl InvocationFrame {
    /// Encodes this frame, pre-encoding `cache` for every protocol in
    /// `protocols` as it writes the bytes-only form.
    pub fn encode(
        &mut self,
        out: &mut impl BufMut,
        protocols: &[std::sync::Arc<dyn crate::protocol::HubProtocol>],
    ) -> Result<(), WireError> {
        write_varint(out, self.excluded_ids.len() as u32);
        for id in &self.excluded_ids {
            write_string(out, id);
        }
        self.cache.write_all_versions(out, protocols)
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self, WireError> {
        let count = read_varint(buf)?;
        let mut excluded_ids = Vec::with_capacity(count as usize);
        for _ in 0..count {
            excluded_ids.push(read_string(buf)?);
        }
        let cache = SerializationCache::read_all_versions(buf)?;
        Ok(Self {
            excluded_ids,
            cache,
        })
    }

    /// `true` if `connection_id` should be skipped by this invocation's
    /// exclusion list.
    ///
    /// Note: an earlier revision of this check read "exclude if the id is
    /// in the list, OR if the list is empty", which drops every delivery
    /// when no exclusions were requested. The correct, tested semantics are
    /// below: deliver unless the id is explicitly listed.
    pub fn excludes(&self, connection_id: &str) -> bool {
        self.excluded_ids.iter().any(|id| id == connection_id)
    }
}

/// Frame carried on `groupManagement`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCommandFrame {
    pub id: u32,
    pub server_name: String,
    pub action: GroupAction,
    pub group_name: String,
    pub connection_id: String,
}

impl GroupCommandFrame {
    pub fn encode(&self, out: &mut impl BufMut) {
        write_varint(out, self.id);
        write_string(out, &self.server_name);
        out.put_u8(self.action.to_byte());
        write_string(out, &self.group_name);
        write_string(out, &self.connection_id);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self, WireError> {
        let id = read_varint(buf)?;
        let server_name = read_string(buf)?;
        if !buf.has_remaining() {
            return Err(WireError::BufferUnderrun { needed: 1 });
        }
        let action = GroupAction::from_byte(buf.get_u8())?;
        let group_name = read_string(buf)?;
        let connection_id = read_string(buf)?;
        Ok(Self {
            id,
            server_name,
            action,
            group_name,
            connection_id,
        })
    }
}

/// Frame carried on `ack:{serverName}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckFrame {
    pub message_id: u32,
}

impl AckFrame {
    pub fn encode(&self, out: &mut impl BufMut) {
        write_varint(out, self.message_id);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self, WireError> {
        Ok(Self {
            message_id: read_varint(buf)?,
        })
    }
}
