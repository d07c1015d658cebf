//! Per-message container holding a source [`HubMessage`] and a set of
//! `(protocol_name -> encoded_bytes)` pairs.
//!
//! Most deployments configure only one or two wire protocols, so the first
//! two entries live inline and only a third-and-beyond spill into a map --
//! this keeps the hot path (one protocol, local delivery) allocation-free
//! beyond the `Vec<u8>` holding the bytes themselves.

use crate::error::WireError;
use crate::protocol::{HubMessage, HubProtocol};
use bytes::{Buf, BufMut};
use std::collections::HashMap;

type Slot = Option<(String, Vec<u8>)>;

/// A per-send cache of a message pre-encoded for every protocol a hop needs.
#[derive(Debug, Clone)]
pub struct SerializationCache {
    source: Option<HubMessage>,
    inline: [Slot; 2],
    overflow: HashMap<String, Vec<u8>>,
}

impl SerializationCache {
    /// Builds a cache around a live message, allowing on-demand encoding for
    /// any protocol.
    pub fn from_message(message: HubMessage) -> Self {
        Self {
            source: Some(message),
            inline: [None, None],
            overflow: HashMap::new(),
        }
    }

    /// Builds an empty bytes-only cache (no source message). Used when
    /// rehydrating a cache received from the broker.
    fn bytes_only() -> Self {
        Self {
            source: None,
            inline: [None, None],
            overflow: HashMap::new(),
        }
    }

    /// Returns `true` if this cache was constructed from a live message and
    /// can therefore encode protocols it hasn't seen yet.
    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    fn get(&self, name: &str) -> Option<&[u8]> {
        for slot in &self.inline {
            if let Some((n, bytes)) = slot {
                if n == name {
                    return Some(bytes);
                }
            }
        }
        self.overflow.get(name).map(Vec::as_slice)
    }

    /// Stores `bytes` under `name` unless already present. Existing slots
    /// are never displaced -- a second write for the same protocol is only
    /// valid if the bytes are identical, and either way the first write wins.
    fn set(&mut self, name: String, bytes: Vec<u8>) {
        if self.get(&name).is_some() {
            return;
        }
        for slot in &mut self.inline {
            if slot.is_none() {
                *slot = Some((name, bytes));
                return;
            }
        }
        self.overflow.insert(name, bytes);
    }

    fn protocol_count(&self) -> usize {
        self.inline.iter().filter(|s| s.is_some()).count() + self.overflow.len()
    }

    fn entries(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.inline
            .iter()
            .filter_map(|s| s.as_ref())
            .map(|(n, b)| (n.as_str(), b.as_slice()))
            .chain(self.overflow.iter().map(|(n, b)| (n.as_str(), b.as_slice())))
    }

    /// Returns the bytes encoded for `protocol`, encoding and caching them
    /// first if a live source message is available.
    ///
    /// Fails with [`WireError::ProtocolNotAvailable`] if this cache has no
    /// source message and `protocol` was not one of the versions it was
    /// rehydrated with.
    pub fn get_encoded(&mut self, protocol: &dyn HubProtocol) -> Result<&[u8], WireError> {
        if self.get(protocol.name()).is_none() {
            match &self.source {
                Some(message) => {
                    let bytes = protocol.encode(message);
                    self.set(protocol.name().to_owned(), bytes);
                }
                None => {
                    return Err(WireError::ProtocolNotAvailable(protocol.name().to_owned()));
                }
            }
        }
        Ok(self.get(protocol.name()).expect("just inserted"))
    }

    /// Writes the bytes-only form: `u8` protocol count, then for each
    /// protocol a length-prefixed name, an `i32` byte length, and the bytes.
    ///
    /// Pre-encodes for every protocol in `protocols` using this cache's
    /// source message (failing is only possible without a source, which
    /// cannot happen for a cache built for outbound cross-server publish).
    pub fn write_all_versions(
        &mut self,
        out: &mut impl BufMut,
        protocols: &[std::sync::Arc<dyn HubProtocol>],
    ) -> Result<(), WireError> {
        for protocol in protocols {
            self.get_encoded(protocol.as_ref())?;
        }
        if self.protocol_count() > 255 {
            return Err(WireError::TooManyProtocols);
        }
        out.put_u8(self.protocol_count() as u8);
        for (name, bytes) in self.entries() {
            crate::varint::write_string(out, name);
            out.put_i32_le(bytes.len() as i32);
            out.put_slice(bytes);
        }
        Ok(())
    }

    /// Reads the bytes-only form written by [`write_all_versions`]. The
    /// returned cache has no source message.
    pub fn read_all_versions(buf: &mut impl Buf) -> Result<Self, WireError> {
        if !buf.has_remaining() {
            return Err(WireError::BufferUnderrun { needed: 1 });
        }
        let count = buf.get_u8();
        let mut cache = Self::bytes_only();
        for _ in 0..count {
            let name = crate::varint::read_string(buf)?;
            if buf.remaining() < 4 {
                return Err(WireError::BufferUnderrun { needed: 4 });
            }
            let len = buf.get_i32_le();
            if len < 0 {
                return Err(WireError::MalformedFrame("negative protocol byte length"));
            }
            let len = len as usize;
            if buf.remaining() < len {
                return Err(WireError::BufferUnderrun {
                    needed: len - buf.remaining(),
                });
            }
            let mut bytes = vec![0u8; len];
            buf.copy_to_slice(&mut bytes);
            cache.set(name, bytes);
        }
        Ok(cache)
    }
}
