use thiserror::Error;

/// Failures that can occur while decoding or encoding wire frames.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed frame: {0}")]
    MalformedFrame(&'static str),

    #[error("protocol {0:?} not available in this serialization cache")]
    ProtocolNotAvailable(String),

    #[error("too many protocols to encode (max 255)")]
    TooManyProtocols,

    #[error("buffer underrun: needed {needed} more byte(s)")]
    BufferUnderrun { needed: usize },
}
