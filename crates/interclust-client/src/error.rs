//! Client errors.

#![allow(missing_docs)]

use interclust_protocol::ProtocolError;
use smol_str::SmolStr;
use thiserror::Error;

/// Errors raised by the session, its tree and its transports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Configuration file could not be read or failed validation.
    #[error("invalid config: {0}")]
    InvalidConfig(SmolStr),

    /// No live node matches the reference.
    #[error("unknown node '{0}'")]
    UnknownNode(SmolStr),

    /// Reference matches more than one node.
    #[error("node reference '{0}' is ambiguous")]
    AmbiguousNode(SmolStr),

    /// No analysis panel with this id is registered.
    #[error("unknown panel {0}")]
    UnknownPanel(usize),

    /// Operation needs analytic state the engine has not delivered yet.
    #[error("node '{0}' has not been populated by the engine yet")]
    NotPopulated(SmolStr),

    /// Operation is not allowed in the current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(SmolStr),

    /// Console input could not be parsed.
    #[error("invalid command: {0}")]
    InvalidCommand(SmolStr),

    /// Broker connection or publish failure.
    #[error("transport error: {0}")]
    Transport(SmolStr),

    /// Broker never acknowledged the connection.
    #[error("broker did not acknowledge the connection within {millis} ms")]
    ConnectTimeout { millis: u64 },

    /// Local file system failure.
    #[error("io error: {0}")]
    Io(SmolStr),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string().into())
    }
}
