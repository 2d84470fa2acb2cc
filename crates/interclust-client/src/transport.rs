//! Outbound message channel.

use std::sync::Arc;

use interclust_protocol::{topics, BackendRequest};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::ids::SessionId;

/// Fire-and-forget publisher to the engine.
pub trait Transport: Send {
    fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), ClientError>;
}

/// Session-scoped sender: tags requests with the session id and publishes
/// them. Failures are logged and never propagated to callers.
pub struct Outbox {
    session: SessionId,
    transport: Box<dyn Transport>,
    published: u64,
}

impl Outbox {
    #[must_use]
    pub fn new(session: SessionId, transport: Box<dyn Transport>) -> Self {
        Self {
            session,
            transport,
            published: 0,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session
    }

    /// Number of requests handed to the transport so far.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.published
    }

    pub fn send(&mut self, request: &BackendRequest) {
        let topic = request.topic();
        let payload = match request.to_payload(self.session.as_str()) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(topic = %topic, error = %err, "dropping request that failed to encode");
                return;
            }
        };
        match self.transport.publish(&topic, payload) {
            Ok(()) => {
                self.published += 1;
                debug!(topic = %topic, "published");
            }
            Err(err) => warn!(topic = %topic, error = %err, "publish failed"),
        }
    }
}

impl std::fmt::Debug for Outbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Outbox")
            .field("session", &self.session)
            .field("published", &self.published)
            .finish_non_exhaustive()
    }
}

/// A request as it left the client.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Value,
}

impl PublishedMessage {
    /// Topic without the backend prefix.
    #[must_use]
    pub fn name(&self) -> &str {
        self.topic
            .strip_prefix(topics::BACKEND_PREFIX)
            .unwrap_or(&self.topic)
    }

    /// String field of the payload, if present.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}

/// In-memory transport used by offline sessions and tests. Clones share the
/// same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    log: Arc<Mutex<Vec<PublishedMessage>>>,
}

impl RecordingTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn messages(&self) -> Vec<PublishedMessage> {
        self.log.lock().clone()
    }

    /// Drains the log.
    pub fn take(&self) -> Vec<PublishedMessage> {
        std::mem::take(&mut *self.log.lock())
    }

    #[must_use]
    pub fn count(&self, name: &str) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|message| message.name() == name)
            .count()
    }

    #[must_use]
    pub fn last(&self, name: &str) -> Option<PublishedMessage> {
        self.log
            .lock()
            .iter()
            .rev()
            .find(|message| message.name() == name)
            .cloned()
    }
}

impl Transport for RecordingTransport {
    fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), ClientError> {
        let payload = serde_json::from_slice(&payload)
            .map_err(|err| ClientError::Transport(format!("unreadable payload: {err}").into()))?;
        self.log.lock().push(PublishedMessage {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }
}
