//! store::mock
//!
//! Mock object store for deterministic testing.
//!
//! # Design
//!
//! The mock store keeps trees, blobs and named references in memory. Trees
//! are built from flat file lists, references can be pointed at commits,
//! annotated tags or raw trees, and `revparse` can be told to fail so that
//! monitor error paths are reachable. Every trait call is counted so tests
//! can assert that a lookup never reached the backend.
//!
//! # Example
//!
//! ```
//! use gitmod::store::mock::MockStore;
//! use gitmod::store::ObjectStore;
//!
//! let store = MockStore::new();
//! let first = store.commit("main", &[("a.txt", b"one".as_slice(), false)]);
//! let second = store.commit("main", &[("a.txt", b"two".as_slice(), false)]);
//! assert_ne!(first, second);
//!
//! store.revparse("main").unwrap();
//! assert_eq!(store.calls().revparse, 1);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use super::traits::{ObjectStore, RevisionObject, StoreError, TreeEntry};
use crate::core::types::{ObjectKind, Oid, UtcTimestamp};

/// Base for synthetic commit times.
const EPOCH_BASE: i64 = 1_600_000_000;

const MODE_TREE: u32 = 0o040000;
const MODE_FILE: u32 = 0o100644;
const MODE_EXECUTABLE: u32 = 0o100755;

/// Mock object store for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockStore {
    inner: Arc<Mutex<MockStoreInner>>,
}

#[derive(Debug, Default)]
struct MockStoreInner {
    trees: HashMap<Oid, Vec<TreeEntry>>,
    blobs: HashMap<Oid, Vec<u8>>,
    references: HashMap<String, RevisionObject>,
    next_id: u64,
    fail_revparse: bool,
    calls: StoreCalls,
}

/// Number of calls received per trait operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCalls {
    pub revparse: usize,
    pub tree_entries: usize,
    pub entry_by_path: usize,
    pub read_blob: usize,
}

impl StoreCalls {
    /// Calls that read tree or blob data (everything except `revparse`).
    pub fn object_reads(&self) -> usize {
        self.tree_entries + self.entry_by_path + self.read_blob
    }
}

enum Node<'a> {
    File(&'a [u8], bool),
    Dir(BTreeMap<&'a str, Node<'a>>),
}

impl MockStoreInner {
    fn allocate_id(&mut self) -> Oid {
        self.next_id += 1;
        // 40 lowercase hex digits always validates
        Oid::new(format!("{:040x}", self.next_id)).expect("synthetic id is valid hex")
    }

    fn store_dir(&mut self, dir: &BTreeMap<&str, Node<'_>>) -> Oid {
        let mut entries = Vec::with_capacity(dir.len());
        for (name, node) in dir {
            let entry = match node {
                Node::File(data, executable) => {
                    let id = self.allocate_id();
                    self.blobs.insert(id.clone(), data.to_vec());
                    TreeEntry {
                        name: name.to_string(),
                        id,
                        kind: ObjectKind::Blob,
                        filemode: if *executable { MODE_EXECUTABLE } else { MODE_FILE },
                    }
                }
                Node::Dir(children) => TreeEntry {
                    name: name.to_string(),
                    id: self.store_dir(children),
                    kind: ObjectKind::Tree,
                    filemode: MODE_TREE,
                },
            };
            entries.push(entry);
        }
        let id = self.allocate_id();
        self.trees.insert(id.clone(), entries);
        id
    }

    fn find_entry(&self, root: &Oid, path: &str) -> Option<TreeEntry> {
        let mut current = root.clone();
        let mut found = None;
        for component in path.split('/').filter(|c| !c.is_empty()) {
            let entries = self.trees.get(&current)?;
            let entry = entries.iter().find(|e| e.name == component)?.clone();
            current = entry.id.clone();
            found = Some(entry);
        }
        found
    }

    fn describe(&self, id: &Oid) -> Option<RevisionObject> {
        if self.trees.contains_key(id) {
            return Some(RevisionObject::Tree { id: id.clone() });
        }
        if self.blobs.contains_key(id) {
            return Some(RevisionObject::Other {
                id: id.clone(),
                kind: "blob".to_string(),
            });
        }
        self.references
            .values()
            .find(|object| object_id(object) == id)
            .cloned()
    }
}

fn object_id(object: &RevisionObject) -> &Oid {
    match object {
        RevisionObject::Tree { id }
        | RevisionObject::Commit { id, .. }
        | RevisionObject::Tag { id, .. }
        | RevisionObject::Other { id, .. } => id,
    }
}

impl MockStore {
    /// Create a new empty mock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from `(path, content, executable)` triples.
    ///
    /// Intermediate directories are created from the paths; entries are
    /// ordered by name.
    pub fn write_tree(&self, files: &[(&str, &[u8], bool)]) -> Oid {
        let mut root: BTreeMap<&str, Node<'_>> = BTreeMap::new();
        for (path, data, executable) in files {
            let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
            let Some((file_name, dirs)) = components.split_last() else {
                continue;
            };
            let mut dir = &mut root;
            for component in dirs {
                let node = dir
                    .entry(*component)
                    .or_insert_with(|| Node::Dir(BTreeMap::new()));
                dir = match node {
                    Node::Dir(children) => children,
                    Node::File(..) => panic!("{} is both a file and a directory", component),
                };
            }
            dir.insert(*file_name, Node::File(*data, *executable));
        }
        let mut inner = self.inner.lock().unwrap();
        inner.store_dir(&root)
    }

    /// Build a tree and point `reference` at a new commit of it.
    ///
    /// Returns the commit id. Each commit gets a later synthetic time.
    pub fn commit(&self, reference: &str, files: &[(&str, &[u8], bool)]) -> Oid {
        let tree = self.write_tree(files);
        let mut inner = self.inner.lock().unwrap();
        let id = inner.allocate_id();
        let time = UtcTimestamp::from_unix_seconds(EPOCH_BASE + inner.next_id as i64);
        inner.references.insert(
            reference.to_string(),
            RevisionObject::Commit {
                id: id.clone(),
                tree,
                time,
            },
        );
        id
    }

    /// Create an annotated tag `name` pointing at whatever `target` names now.
    ///
    /// Panics if `target` is unknown.
    pub fn tag(&self, name: &str, target: &str) -> Oid {
        let mut inner = self.inner.lock().unwrap();
        let target = inner
            .references
            .get(target)
            .cloned()
            .unwrap_or_else(|| panic!("unknown tag target {}", target));
        let target = match target {
            // described one level deep
            RevisionObject::Tag { id, .. } => RevisionObject::Other {
                id,
                kind: "tag".to_string(),
            },
            other => other,
        };
        let id = inner.allocate_id();
        inner.references.insert(
            name.to_string(),
            RevisionObject::Tag {
                id: id.clone(),
                target: Box::new(target),
            },
        );
        id
    }

    /// Point `reference` at an arbitrary object.
    pub fn point(&self, reference: &str, object: RevisionObject) {
        let mut inner = self.inner.lock().unwrap();
        inner.references.insert(reference.to_string(), object);
    }

    /// Root tree currently addressed by `reference`, peeling commits and tags.
    pub fn tree_of(&self, reference: &str) -> Option<Oid> {
        let inner = self.inner.lock().unwrap();
        let mut object = inner.references.get(reference)?;
        loop {
            match object {
                RevisionObject::Tree { id } => return Some(id.clone()),
                RevisionObject::Commit { tree, .. } => return Some(tree.clone()),
                RevisionObject::Tag { target, .. } => object = target.as_ref(),
                RevisionObject::Other { .. } => return None,
            }
        }
    }

    /// Forget the tree or blob `id`, leaving entries that name it dangling.
    pub fn drop_object(&self, id: &Oid) {
        let mut inner = self.inner.lock().unwrap();
        inner.trees.remove(id);
        inner.blobs.remove(id);
    }

    /// Make every subsequent `revparse` fail (or succeed again).
    pub fn set_fail_revparse(&self, fail: bool) {
        self.inner.lock().unwrap().fail_revparse = fail;
    }

    /// Calls received so far.
    pub fn calls(&self) -> StoreCalls {
        self.inner.lock().unwrap().calls
    }

    /// Reset call counters to zero.
    pub fn reset_calls(&self) {
        self.inner.lock().unwrap().calls = StoreCalls::default();
    }
}

impl ObjectStore for MockStore {
    fn revparse(&self, spec: &str) -> Result<RevisionObject, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.revparse += 1;
        if inner.fail_revparse {
            return Err(StoreError::Backend(format!("revparse of {} failed", spec)));
        }
        if let Some(object) = inner.references.get(spec) {
            return Ok(object.clone());
        }
        Oid::new(spec)
            .ok()
            .and_then(|id| inner.describe(&id))
            .ok_or_else(|| StoreError::NotFound(spec.to_string()))
    }

    fn tree_entries(&self, tree: &Oid) -> Result<Vec<TreeEntry>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.tree_entries += 1;
        inner
            .trees
            .get(tree)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(tree.to_string()))
    }

    fn entry_by_path(&self, root: &Oid, path: &str) -> Result<Option<TreeEntry>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.entry_by_path += 1;
        if !inner.trees.contains_key(root) {
            return Err(StoreError::NotFound(root.to_string()));
        }
        Ok(inner.find_entry(root, path))
    }

    fn read_blob(&self, blob: &Oid) -> Result<Vec<u8>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.read_blob += 1;
        inner
            .blobs
            .get(blob)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(blob.to_string()))
    }
}
