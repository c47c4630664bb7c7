//! mount::object
//!
//! Resolved filesystem objects and the handles readers hold on them.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::core::types::{ObjectKind, Oid, RepoPath};
use crate::store::TreeEntry;

use super::generation::{Generation, UsageGuard};

/// Mode bits of the synthesized snapshot root.
pub const ROOT_MODE: u32 = 0o555;

/// Mode bits that may ever surface: read and execute, never write.
const READ_ONLY_BITS: u32 = 0o555;

/// What an object carries besides its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectContent {
    /// Immediate children of a tree, in store order.
    Tree(Arc<[TreeEntry]>),
    /// Bytes of a blob.
    Blob(Arc<[u8]>),
    /// Nothing (e.g. a submodule link).
    Unknown,
}

/// One resolved path. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsObject {
    kind: ObjectKind,
    name: String,
    path: RepoPath,
    mode: u32,
    id: Oid,
    content: ObjectContent,
}

impl FsObject {
    /// The root of a snapshot.
    pub fn root(tree: Oid, entries: Arc<[TreeEntry]>) -> Self {
        Self {
            kind: ObjectKind::Tree,
            name: "/".to_string(),
            path: RepoPath::root(),
            mode: ROOT_MODE,
            id: tree,
            content: ObjectContent::Tree(entries),
        }
    }

    /// An object found at `path` through a tree entry.
    ///
    /// Write bits reported by the store are dropped; the owner-exec bit of
    /// executable files is kept for the adapter to decide on.
    pub fn from_entry(path: RepoPath, entry: &TreeEntry, content: ObjectContent) -> Self {
        Self {
            kind: entry.kind,
            name: entry.name.clone(),
            path,
            mode: entry.filemode & READ_ONLY_BITS,
            id: entry.id.clone(),
            content,
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &RepoPath {
        &self.path
    }

    pub fn mode(&self) -> u32 {
        self.mode
    }

    pub fn id(&self) -> &Oid {
        &self.id
    }

    pub fn content(&self) -> &ObjectContent {
        &self.content
    }

    pub fn is_tree(&self) -> bool {
        self.kind == ObjectKind::Tree
    }

    pub fn is_blob(&self) -> bool {
        self.kind == ObjectKind::Blob
    }

    /// Children of a tree; `None` for anything else.
    pub fn entries(&self) -> Option<&[TreeEntry]> {
        match &self.content {
            ObjectContent::Tree(entries) => Some(entries),
            _ => None,
        }
    }

    /// Number of children of a tree, 0 for anything else.
    pub fn entry_count(&self) -> usize {
        self.entries().map_or(0, <[TreeEntry]>::len)
    }

    /// Bytes of a blob; `None` for anything else.
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.content {
            ObjectContent::Blob(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Entry count for trees, byte length for blobs.
    pub fn size(&self) -> u64 {
        match &self.content {
            ObjectContent::Tree(entries) => entries.len() as u64,
            ObjectContent::Blob(bytes) => bytes.len() as u64,
            ObjectContent::Unknown => 0,
        }
    }

    /// Up to `len` bytes of a blob starting at `offset`.
    ///
    /// The range is clamped to the blob; reading at or past the end yields
    /// an empty slice. Returns `None` when the object is not a blob.
    pub fn read_at(&self, offset: u64, len: usize) -> Option<&[u8]> {
        let bytes = self.bytes()?;
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(bytes.len());
        let end = start.saturating_add(len).min(bytes.len());
        Some(&bytes[start..end])
    }
}

/// A reader's hold on an [`FsObject`].
///
/// Handles from a caching generation each keep one usage unit on their
/// generation; the object itself stays owned by the cache. Handles from a
/// non-caching generation own their object outright. Either way the
/// handle is released exactly once, explicitly through
/// [`ObjectHandle::release`] or implicitly on drop.
pub struct ObjectHandle {
    object: Arc<FsObject>,
    generation: Arc<Generation>,
    usage: Option<UsageGuard>,
}

impl ObjectHandle {
    /// A handle keeping `usage` until released.
    pub(crate) fn cached(object: Arc<FsObject>, usage: UsageGuard) -> Self {
        Self {
            generation: Arc::clone(usage.generation()),
            object,
            usage: Some(usage),
        }
    }

    /// A handle owning its object, holding no usage unit.
    pub(crate) fn owned(object: Arc<FsObject>, generation: Arc<Generation>) -> Self {
        Self {
            object,
            generation,
            usage: None,
        }
    }

    /// The generation this object was resolved against.
    ///
    /// This is not necessarily the context's current generation.
    pub fn generation(&self) -> &Arc<Generation> {
        &self.generation
    }

    /// The shared object.
    pub fn object(&self) -> &Arc<FsObject> {
        &self.object
    }

    /// Whether this handle keeps its generation alive.
    pub fn holds_usage(&self) -> bool {
        self.usage.is_some()
    }

    /// Give the handle back.
    ///
    /// Returns `true` if this release tore the owning generation down.
    /// Owned handles never do and always return `false`.
    pub fn release(mut self) -> bool {
        match self.usage.take() {
            Some(usage) => usage.release(),
            None => false,
        }
    }
}

impl Deref for ObjectHandle {
    type Target = FsObject;

    fn deref(&self) -> &FsObject {
        &self.object
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHandle")
            .field("path", self.object.path())
            .field("kind", &self.object.kind())
            .field("generation", &self.generation.sequence())
            .field("holds_usage", &self.usage.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob_entry(name: &str, filemode: u32) -> TreeEntry {
        TreeEntry {
            name: name.to_string(),
            id: Oid::new(format!("{:040x}", 7)).unwrap(),
            kind: ObjectKind::Blob,
            filemode,
        }
    }

    fn blob(bytes: &[u8]) -> FsObject {
        FsObject::from_entry(
            RepoPath::new("/f"),
            &blob_entry("f", 0o100644),
            ObjectContent::Blob(Arc::from(bytes)),
        )
    }

    #[test]
    fn root_is_read_only_tree() {
        let root = FsObject::root(Oid::new(format!("{:040x}", 1)).unwrap(), Arc::from(vec![]));
        assert!(root.is_tree());
        assert_eq!(root.name(), "/");
        assert_eq!(root.mode(), 0o555);
        assert_eq!(root.entry_count(), 0);
    }

    #[test]
    fn write_bits_never_surface() {
        assert_eq!(blob(b"").mode(), 0o444);
        let exec = FsObject::from_entry(
            RepoPath::new("/run.sh"),
            &blob_entry("run.sh", 0o100755),
            ObjectContent::Blob(Arc::from(&b""[..])),
        );
        assert_eq!(exec.mode(), 0o555);
    }

    #[test]
    fn read_at_clamps_to_blob() {
        let object = blob(b"hello world");
        assert_eq!(object.read_at(0, 5), Some(&b"hello"[..]));
        assert_eq!(object.read_at(6, 100), Some(&b"world"[..]));
        assert_eq!(object.read_at(11, 4), Some(&b""[..]));
        assert_eq!(object.read_at(u64::MAX, 4), Some(&b""[..]));
    }

    #[test]
    fn read_at_on_tree_is_none() {
        let root = FsObject::root(Oid::new(format!("{:040x}", 1)).unwrap(), Arc::from(vec![]));
        assert!(root.read_at(0, 1).is_none());
        assert!(root.bytes().is_none());
    }

    #[test]
    fn size_is_byte_length_for_blobs() {
        assert_eq!(blob(b"abc").size(), 3);
        assert_eq!(blob(b"abc").entry_count(), 0);
    }
}
