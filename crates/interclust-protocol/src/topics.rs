/// Prefix of every topic the client publishes to.
pub const BACKEND_PREFIX: &str = "clustering_communicator/backend/";
/// Prefix of every topic the engine publishes to.
pub const FRONTEND_PREFIX: &str = "clustering_communicator/frontend/";
/// Subscription filter covering every inbound topic.
pub const FRONTEND_FILTER: &str = "clustering_communicator/frontend/#";

/// Full outbound topic for a request name.
#[must_use]
pub fn backend(name: &str) -> String {
    format!("{BACKEND_PREFIX}{name}")
}

/// Full inbound topic for a message name.
#[must_use]
pub fn frontend(name: &str) -> String {
    format!("{FRONTEND_PREFIX}{name}")
}

/// Strips the inbound prefix, returning the bare message name.
#[must_use]
pub fn frontend_name(topic: &str) -> Option<&str> {
    topic
        .strip_prefix(FRONTEND_PREFIX)
        .filter(|name| !name.is_empty())
}
