//! Protocol errors.

#![allow(missing_docs)]

use smol_str::SmolStr;
use thiserror::Error;

/// Errors raised while encoding requests or decoding engine messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Topic outside the inbound `clustering_communicator/frontend/` namespace.
    #[error("topic '{0}' is outside the frontend namespace")]
    ForeignTopic(SmolStr),

    /// Payload is not valid JSON.
    #[error("invalid json on '{topic}': {detail}")]
    InvalidJson { topic: SmolStr, detail: SmolStr },

    /// Payload is JSON but does not have the shape its topic requires.
    #[error("malformed '{topic}' payload: {detail}")]
    Malformed { topic: SmolStr, detail: SmolStr },

    /// Request could not be serialized.
    #[error("failed to encode '{topic}' request: {detail}")]
    Encode { topic: SmolStr, detail: SmolStr },
}

impl ProtocolError {
    pub(crate) fn malformed(topic: &str, detail: impl std::fmt::Display) -> Self {
        Self::Malformed {
            topic: topic.into(),
            detail: detail.to_string().into(),
        }
    }

    /// Topic name the error refers to, when known.
    #[must_use]
    pub fn topic(&self) -> &str {
        match self {
            Self::ForeignTopic(topic) => topic,
            Self::InvalidJson { topic, .. }
            | Self::Malformed { topic, .. }
            | Self::Encode { topic, .. } => topic,
        }
    }
}
