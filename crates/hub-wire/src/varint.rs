//! Little-endian 7-bit continuation VarInt, plus length-prefixed UTF-8 strings.
//!
//! Each byte carries 7 payload bits, least-significant group first; bit 7
//! set means "more bytes follow". A well-formed `u32` never needs more than
//! 5 bytes (`ceil(32 / 7) == 5`).

use crate::error::WireError;
use bytes::{Buf, BufMut};

const CONTINUATION_BIT: u8 = 0x80;
const PAYLOAD_MASK: u8 = 0x7f;
const MAX_VARINT_BYTES: usize = 5;

/// Writes `value` as a VarInt into `out`.
pub fn write_varint(out: &mut impl BufMut, mut value: u32) {
    loop {
        let byte = (value & PAYLOAD_MASK as u32) as u8;
        value >>= 7;
        if value == 0 {
            out.put_u8(byte);
            break;
        }
        out.put_u8(byte | CONTINUATION_BIT);
    }
}

/// Reads a VarInt from `buf`, advancing it past the consumed bytes.
///
/// Fails with [`WireError::MalformedFrame`] if more than 5 bytes are read
/// without terminating, or [`WireError::BufferUnderrun`] if the buffer runs
/// out while a continuation bit is still set.
pub fn read_varint(buf: &mut impl Buf) -> Result<u32, WireError> {
    let mut value: u32 = 0;
    for i in 0..MAX_VARINT_BYTES {
        if !buf.has_remaining() {
            return Err(WireError::BufferUnderrun { needed: 1 });
        }
        let byte = buf.get_u8();
        value |= ((byte & PAYLOAD_MASK) as u32) << (7 * i);
        if byte & CONTINUATION_BIT == 0 {
            return Ok(value);
        }
    }
    Err(WireError::MalformedFrame("varint longer than 5 bytes"))
}

/// Writes a length-prefixed UTF-8 string: a VarInt byte length followed by
/// the raw UTF-8 bytes (no BOM).
pub fn write_string(out: &mut impl BufMut, s: &str) {
    write_varint(out, s.len() as u32);
    out.put_slice(s.as_bytes());
}

/// Reads a length-prefixed UTF-8 string written by [`write_string`].
pub fn read_string(buf: &mut impl Buf) -> Result<String, WireError> {
    let len = read_varint(buf)? as usize;
    if buf.remaining() < len {
        return Err(WireError::BufferUnderrun {
            needed: len - buf.remaining(),
        });
    }
    let mut bytes = vec![0u8; len];
    buf.copy_to_slice(&mut bytes);
    String::from_utf8(bytes).map_err(|_| WireError::MalformedFrame("invalid UTF-8 in string"))
}
