//! `interclust-client` - operator side of human-in-the-loop hierarchical
//! clustering.
//!
//! The client keeps a local cluster tree in sync with a remote clustering
//! engine over MQTT. Every node carries a version token; engine responses
//! are applied only when they match the version the client currently
//! expects, so answers to superseded requests are dropped instead of
//! overwriting newer state.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

/// Client configuration (`interclust.toml`).
pub mod config;
/// Console commands and text rendering.
pub mod console;
/// Client errors.
pub mod error;
/// Dataset and algorithm setup.
pub mod form;
/// Node, version and session identifiers.
pub mod ids;
/// MQTT transport and connection loop.
pub mod mqtt;
/// Analysis panels and their plots.
pub mod panel;
/// Session context and inbound dispatch.
pub mod session;
/// Outbound publishing.
pub mod transport;
/// Cluster hierarchy.
pub mod tree;
/// Detailed view of the selected node.
pub mod view;

pub use config::ClientConfig;
pub use error::ClientError;
pub use ids::{NodeId, SessionId, Version};
pub use session::{DispatchOutcome, Session};
pub use transport::{Outbox, RecordingTransport, Transport};
pub use tree::Tree;
