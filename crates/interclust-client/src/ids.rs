//! Identifiers, version tokens and node colors.

use std::borrow::Borrow;
use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use smol_str::SmolStr;
use uuid::Uuid;

/// Id of a tree node. The synthetic root is always `"root"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(SmolStr);

impl NodeId {
    pub const ROOT: &'static str = "root";

    #[must_use]
    pub fn root() -> Self {
        Self(SmolStr::new_static(Self::ROOT))
    }

    /// Fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string().into())
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == Self::ROOT
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn as_smol(&self) -> &SmolStr {
        &self.0
    }

    /// Default display name of a new node: the first five characters.
    #[must_use]
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(5)
            .map_or(self.0.len(), |(index, _)| index);
        &self.0[..end]
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl From<SmolStr> for NodeId {
    fn from(value: SmolStr) -> Self {
        Self(value)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque per-node version token; only equality is meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version(SmolStr);

impl Version {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string().into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether an inbound version tag refers to this token.
    #[must_use]
    pub fn matches(&self, tag: &str) -> bool {
        self.0 == tag
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session (`instance_id`) identifier, generated once per client process.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(SmolStr);

impl SessionId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string().into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Node color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    #[must_use]
    pub fn random() -> Self {
        let mut buf = [0u8; 3];
        OsRng.fill_bytes(&mut buf);
        Self {
            r: buf[0],
            g: buf[1],
            b: buf[2],
        }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({},{},{})", self.r, self.g, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_distinct_and_not_root() {
        let a = NodeId::generate();
        let b = NodeId::generate();
        assert_ne!(a, b);
        assert!(!a.is_root());
        assert!(NodeId::root().is_root());
    }

    #[test]
    fn short_name_takes_five_characters() {
        assert_eq!(NodeId::from("abcdef-123").short(), "abcde");
        assert_eq!(NodeId::from("abc").short(), "abc");
    }

    #[test]
    fn versions_compare_by_equality_only() {
        let version = Version::generate();
        assert!(version.matches(version.as_str()));
        assert!(!version.matches(Version::generate().as_str()));
    }
}
