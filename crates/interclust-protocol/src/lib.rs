//! Message contract between the interactive clustering client and its engine.
//!
//! Outbound requests are a closed [`BackendRequest`] enum published under
//! `clustering_communicator/backend/<topic>`. Inbound messages arrive under
//! `clustering_communicator/frontend/<topic>` and are classified by
//! [`decode`] into session-scoped messages, legacy broadcasts, or ignored
//! traffic for other sessions.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod inbound;
mod legacy;
mod outbound;
mod payload;
/// Topic namespace helpers.
pub mod topics;

pub use error::ProtocolError;
pub use inbound::{
    decode, ActiveQuery, Addressing, ClusteringResult, DataTable, GraphData, Inbound,
    NodeInfo, PlotPayload, QualityIndicator, SessionMessage, StatRow, TableRow, ROW_ID_COLUMN,
    ASSIGNMENT_COLUMN,
};
pub use legacy::{LegacyMessage, MethodResult};
pub use outbound::{
    Algorithm, BackendRequest, Comparator, DiagramKind, FeatureMethod, GraphRequest,
    MethodExecution, Restriction,
};
pub use payload::ThresholdRange;
