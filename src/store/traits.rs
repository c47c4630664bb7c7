//! store::traits
//!
//! ObjectStore trait definition and the value types it exchanges.
//!
//! # Design
//!
//! The trait is synchronous: every caller is an OS thread (a filesystem
//! request handler or the root tree monitor) and suspends only by blocking.
//! Implementations must be `Send + Sync` because one store is shared by all
//! readers of all generations.

use thiserror::Error;

use crate::core::types::{ObjectKind, Oid, UtcTimestamp};

/// Errors from object store operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The named object or reference does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The store failed for a reason other than a missing object.
    #[error("object store failure: {0}")]
    Backend(String),
}

/// One immediate child of a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Local name, not the full path.
    pub name: String,
    /// Id of the object the entry points at.
    pub id: Oid,
    /// Kind of the object the entry points at.
    pub kind: ObjectKind,
    /// Mode bits as recorded by the store (e.g. `0o100644`).
    pub filemode: u32,
}

/// The object a symbolic name parses to.
///
/// Tags carry their target described one level deep. A tag whose target is
/// itself a tag is described as [`RevisionObject::Other`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevisionObject {
    /// A raw tree.
    Tree {
        /// Tree id.
        id: Oid,
    },
    /// A revision carrying a tree and a commit time.
    Commit {
        /// Commit id.
        id: Oid,
        /// Root tree of the revision.
        tree: Oid,
        /// Commit time.
        time: UtcTimestamp,
    },
    /// An annotated tag.
    Tag {
        /// Tag object id.
        id: Oid,
        /// What the tag points at.
        target: Box<RevisionObject>,
    },
    /// Any other object kind.
    Other {
        /// Object id.
        id: Oid,
        /// Store-specific name of the kind.
        kind: String,
    },
}

impl RevisionObject {
    /// Short name of the object kind, for diagnostics.
    pub fn kind_name(&self) -> &str {
        match self {
            RevisionObject::Tree { .. } => "tree",
            RevisionObject::Commit { .. } => "commit",
            RevisionObject::Tag { .. } => "tag",
            RevisionObject::Other { kind, .. } => kind,
        }
    }
}

/// The object store capability consumed by the mount core.
///
/// # Example
///
/// ```
/// use gitmod::store::ObjectStore;
/// use gitmod::store::mock::MockStore;
///
/// fn count_root_entries(store: &dyn ObjectStore, name: &str) -> usize {
///     match store.revparse(name) {
///         Ok(gitmod::store::RevisionObject::Commit { tree, .. }) => {
///             store.tree_entries(&tree).map(|e| e.len()).unwrap_or(0)
///         }
///         _ => 0,
///     }
/// }
///
/// let store = MockStore::new();
/// store.commit("main", &[("a", b"1".as_slice(), false), ("b", b"2".as_slice(), false)]);
/// assert_eq!(count_root_entries(&store, "main"), 2);
/// ```
pub trait ObjectStore: Send + Sync {
    /// Parse a symbolic name (branch, tag, revision expression or id).
    fn revparse(&self, spec: &str) -> Result<RevisionObject, StoreError>;

    /// List the immediate children of a tree, in store order.
    fn tree_entries(&self, tree: &Oid) -> Result<Vec<TreeEntry>, StoreError>;

    /// Look up one relative path (no leading separator) inside a tree.
    ///
    /// Returns `Ok(None)` when the path does not exist.
    fn entry_by_path(&self, root: &Oid, path: &str) -> Result<Option<TreeEntry>, StoreError>;

    /// Read a blob's bytes.
    fn read_blob(&self, blob: &Oid) -> Result<Vec<u8>, StoreError>;
}
