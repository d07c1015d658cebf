use hub_wire::WireError;
use thiserror::Error;

/// The error taxonomy surfaced by every fallible public operation on
/// [`crate::manager::HubLifetimeManager`].
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("{0} must not be empty")]
    ArgumentNull(&'static str),

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("protocol {0:?} not available in this serialization cache")]
    ProtocolNotAvailable(String),

    #[error("too many protocols to encode (max 255)")]
    TooManyProtocols,

    #[error("ack timed out waiting for group command {0}")]
    AckTimeout(u32),

    #[error("broker operation failed: {0}")]
    BrokerFailure(String),

    #[error("manager has been shut down")]
    ManagerShutdown,
}

impl Clone for ManagerError {
    fn clone(&self) -> Self {
        match self {
            ManagerError::ArgumentNull(name) => ManagerError::ArgumentNull(name),
            ManagerError::MalformedFrame(m) => ManagerError::MalformedFrame(m.clone()),
            ManagerError::ProtocolNotAvailable(p) => ManagerError::ProtocolNotAvailable(p.clone()),
            ManagerError::TooManyProtocols => ManagerError::TooManyProtocols,
            ManagerError::AckTimeout(id) => ManagerError::AckTimeout(*id),
            ManagerError::BrokerFailure(m) => ManagerError::BrokerFailure(m.clone()),
            ManagerError::ManagerShutdown => ManagerError::ManagerShutdown,
        }
    }
}

impl From<WireError> for ManagerError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::MalformedFrame(m) => ManagerError::MalformedFrame(m.to_owned()),
            WireError::ProtocolNotAvailable(p) => ManagerError::ProtocolNotAvailable(p),
            WireError::TooManyProtocols => ManagerError::TooManyProtocols,
            WireError::BufferUnderrun { needed } => {
                ManagerError::MalformedFrame(format!("buffer underrun, needed {needed} more byte(s)"))
            }
        }
    }
}
