//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`Oid`] - Object identifier in the object store (SHA)
//! - [`RepoPath`] - Normalized path inside a snapshot, used as cache key
//! - [`ObjectKind`] - What a resolved path points at
//! - [`UtcTimestamp`] - RFC3339 timestamp
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use gitmod::core::types::{Oid, RepoPath};
//!
//! let oid = Oid::new("abc123def4567890abc123def4567890abc12345").unwrap();
//! assert_eq!(oid.short(7), "abc123d");
//!
//! let path = RepoPath::new("src//lib.rs");
//! assert_eq!(path.as_str(), "/src/lib.rs");
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid object id: {0}")]
    InvalidOid(String),
}

/// An object identifier (SHA-1 or SHA-256).
///
/// OIDs are normalized to lowercase for consistency.
///
/// # Example
///
/// ```
/// use gitmod::core::types::Oid;
///
/// // Create from hex string (normalized to lowercase)
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
///
/// // Get abbreviated form
/// assert_eq!(oid.short(7), "abc123d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    ///
    /// The OID is normalized to lowercase.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` if the string is not a valid hex OID.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        Self::validate(&oid)?;
        Ok(Self(oid))
    }

    /// Check whether a string looks like a full object id.
    ///
    /// Used to decide whether a tracked name can ever move.
    pub fn is_full_hex(candidate: &str) -> bool {
        Self::validate(&candidate.to_ascii_lowercase()).is_ok()
    }

    /// Get an abbreviated form of the OID.
    ///
    /// Returns the first `len` characters. If `len` exceeds the OID length,
    /// returns the full OID.
    pub fn short(&self, len: usize) -> &str {
        let end = len.min(self.0.len());
        &self.0[..end]
    }

    /// Validate an object id.
    fn validate(oid: &str) -> Result<(), TypeError> {
        // SHA-1 is 40 hex chars, SHA-256 is 64
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(
                "object id must be hexadecimal".into(),
            ));
        }
        Ok(())
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A normalized path inside a snapshot.
///
/// The normal form has exactly one leading `/`, no duplicate separators and
/// no trailing separator. The root is `/`. This string is the key under which
/// resolved objects are cached, so two spellings of the same path must
/// always normalize to the same value.
///
/// # Example
///
/// ```
/// use gitmod::core::types::RepoPath;
///
/// assert_eq!(RepoPath::new("").as_str(), "/");
/// assert_eq!(RepoPath::new("a/b/").as_str(), "/a/b");
/// assert_eq!(RepoPath::new("//a///b").as_str(), "/a/b");
/// assert_eq!(RepoPath::root().child("README").as_str(), "/README");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoPath(String);

impl RepoPath {
    /// Normalize any path spelling.
    pub fn new(path: &str) -> Self {
        let mut normalized = String::with_capacity(path.len() + 1);
        for component in path.split('/').filter(|c| !c.is_empty()) {
            normalized.push('/');
            normalized.push_str(component);
        }
        if normalized.is_empty() {
            normalized.push('/');
        }
        Self(normalized)
    }

    /// The snapshot root, `/`.
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Check if this is the snapshot root.
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Path of a direct child.
    ///
    /// The parent's separator is not doubled when the parent is the root.
    pub fn child(&self, name: &str) -> Self {
        if self.is_root() {
            Self::new(name)
        } else {
            Self::new(&format!("{}/{}", self.0, name))
        }
    }

    /// The containing directory, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let (parent, _) = self.0.rsplit_once('/')?;
        Some(Self::new(parent))
    }

    /// Last path component, or `/` for the root.
    pub fn name(&self) -> &str {
        if self.is_root() {
            return "/";
        }
        self.0.rsplit('/').next().unwrap_or("/")
    }

    /// The path without its leading separator, as backends expect it.
    pub fn relative(&self) -> &str {
        &self.0[1..]
    }

    /// Get the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RepoPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl AsRef<str> for RepoPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RepoPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a resolved path points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// A directory-like object with children.
    Tree,
    /// File content.
    Blob,
    /// Anything else the store can hold at a path (e.g. submodule links).
    Unknown,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ObjectKind::Tree => "tree",
            ObjectKind::Blob => "blob",
            ObjectKind::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// A UTC timestamp in RFC3339 format.
///
/// # Example
///
/// ```
/// use gitmod::core::types::UtcTimestamp;
///
/// let now = UtcTimestamp::now();
/// println!("Current time: {}", now);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtcTimestamp(chrono::DateTime<chrono::Utc>);

impl UtcTimestamp {
    /// Create a timestamp for the current moment.
    pub fn now() -> Self {
        Self(chrono::Utc::now())
    }

    /// Create a timestamp from seconds since the Unix epoch.
    ///
    /// Out-of-range values clamp to the epoch.
    pub fn from_unix_seconds(seconds: i64) -> Self {
        Self(chrono::DateTime::from_timestamp(seconds, 0).unwrap_or(chrono::DateTime::UNIX_EPOCH))
    }

    /// The same instant as a [`std::time::SystemTime`].
    pub fn to_system_time(&self) -> std::time::SystemTime {
        self.0.into()
    }

    /// Get the underlying datetime.
    pub fn as_datetime(&self) -> &chrono::DateTime<chrono::Utc> {
        &self.0
    }

    /// Seconds since the Unix epoch.
    pub fn unix_seconds(&self) -> i64 {
        self.0.timestamp()
    }
}

impl std::fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod oid {
        use super::*;

        #[test]
        fn valid_sha1() {
            let oid = Oid::new("abc123def4567890abc123def4567890abc12345").unwrap();
            assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
        }

        #[test]
        fn normalized_to_lowercase() {
            let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
            assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
        }

        #[test]
        fn wrong_length_rejected() {
            assert!(Oid::new("abc123").is_err());
        }

        #[test]
        fn non_hex_rejected() {
            assert!(Oid::new("xyz123def4567890abc123def4567890abc12345").is_err());
        }

        #[test]
        fn full_hex_detection() {
            assert!(Oid::is_full_hex("abc123def4567890abc123def4567890abc12345"));
            assert!(!Oid::is_full_hex("HEAD"));
            assert!(!Oid::is_full_hex("main"));
            assert!(!Oid::is_full_hex("abc123d"));
        }
    }

    mod repo_path {
        use super::*;

        #[test]
        fn empty_and_slash_are_root() {
            assert!(RepoPath::new("").is_root());
            assert!(RepoPath::new("/").is_root());
            assert!(RepoPath::new("///").is_root());
        }

        #[test]
        fn leading_separator_added() {
            assert_eq!(RepoPath::new("src/main.c").as_str(), "/src/main.c");
        }

        #[test]
        fn duplicate_and_trailing_separators_collapsed() {
            assert_eq!(RepoPath::new("//src//tests/").as_str(), "/src/tests");
        }

        #[test]
        fn child_of_root_has_single_separator() {
            assert_eq!(RepoPath::root().child("include").as_str(), "/include");
        }

        #[test]
        fn child_of_subdir() {
            let dir = RepoPath::new("/src");
            assert_eq!(dir.child("gitmod.c").as_str(), "/src/gitmod.c");
        }

        #[test]
        fn name_is_last_component() {
            assert_eq!(RepoPath::new("/a/b/c.txt").name(), "c.txt");
            assert_eq!(RepoPath::root().name(), "/");
        }

        #[test]
        fn parent_walks_up_to_the_root() {
            assert_eq!(RepoPath::new("/a/b/c.txt").parent(), Some(RepoPath::new("/a/b")));
            assert_eq!(RepoPath::new("/a").parent(), Some(RepoPath::root()));
            assert_eq!(RepoPath::root().parent(), None);
        }

        #[test]
        fn relative_drops_leading_separator() {
            assert_eq!(RepoPath::new("/a/b").relative(), "a/b");
            assert_eq!(RepoPath::root().relative(), "");
        }
    }

    mod timestamp {
        use super::*;

        #[test]
        fn unix_seconds_roundtrip() {
            let ts = UtcTimestamp::from_unix_seconds(1_600_000_000);
            assert_eq!(ts.unix_seconds(), 1_600_000_000);
        }

        #[test]
        fn system_time_is_the_same_instant() {
            let ts = UtcTimestamp::from_unix_seconds(1_600_000_000);
            let since_epoch = ts
                .to_system_time()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap();
            assert_eq!(since_epoch.as_secs(), 1_600_000_000);
        }
    }
}
