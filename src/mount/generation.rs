//! mount::generation
//!
//! One immutable tree snapshot and its lifecycle.
//!
//! # Lifecycle
//!
//! A generation is torn down exactly once, by whichever of these observes
//! `marked_for_deletion && usage <= 0` first:
//!
//! - [`Generation::decrease_usage`], when the last user leaves a marked
//!   generation;
//! - [`Generation::mark_for_deletion`], when a swap retires an unused one.
//!
//! [`Generation::dispose`] tears down unconditionally and is reserved for
//! context shutdown and for generations that never became current.
//!
//! Every one of these decides under the generation's lock by flipping
//! `disposed` from false to true, then releases the snapshot and the cache
//! outside it.
//!
//! # Usage units
//!
//! A [`UsageGuard`] is one unit on the counter. Readers obtain one through
//! [`Generation::checkout`]; handles from a caching generation keep theirs
//! until released, so a cached object outlives its lookup exactly as long
//! as somebody holds it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

use crate::core::types::{ObjectKind, Oid, RepoPath, UtcTimestamp};
use crate::store::{ObjectStore, TreeEntry};

use super::cache::{Claim, ObjectCache};
use super::object::{FsObject, ObjectContent, ObjectHandle};
use super::MountError;

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Counter and flags, guarded together.
#[derive(Debug, Default)]
struct GenerationState {
    usage: i64,
    marked_for_deletion: bool,
    disposed: bool,
}

/// One resolved snapshot of the tracked reference.
pub struct Generation {
    sequence: u64,
    tree_id: Oid,
    time: UtcTimestamp,
    store: Arc<dyn ObjectStore>,
    /// The snapshot's root listing; `None` once torn down.
    root: Mutex<Option<Arc<[TreeEntry]>>>,
    cache: Option<ObjectCache<FsObject>>,
    state: Mutex<GenerationState>,
}

impl Generation {
    /// Build a generation for the tree `tree_id`.
    ///
    /// With `use_cache`, every path of the tree is walked once and
    /// pre-inserted (pre-order, root first), after which the cache is
    /// fixed: later lookups of unknown paths miss without inserting.
    ///
    /// # Errors
    ///
    /// - [`MountError::Store`] if the tree cannot be listed
    /// - [`MountError::ResourceExhausted`] if the cache cannot grow
    pub fn create(
        store: Arc<dyn ObjectStore>,
        tree_id: Oid,
        time: UtcTimestamp,
        use_cache: bool,
    ) -> Result<Arc<Self>, MountError> {
        let sequence = NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let root: Arc<[TreeEntry]> = store.tree_entries(&tree_id)?.into();

        let cache = if use_cache {
            let cache = ObjectCache::new();
            cache.get_or_create(RepoPath::root().as_str())?;
            Self::prepopulate(store.as_ref(), &cache, &RepoPath::root(), &root)?;
            cache.fix();
            Some(cache)
        } else {
            None
        };

        debug!(
            generation = sequence,
            tree = %tree_id.short(12),
            cached_paths = cache.as_ref().map_or(0, ObjectCache::len),
            "generation created"
        );

        Ok(Arc::new(Self {
            sequence,
            tree_id,
            time,
            store,
            root: Mutex::new(Some(root)),
            cache,
            state: Mutex::new(GenerationState::default()),
        }))
    }

    fn prepopulate(
        store: &dyn ObjectStore,
        cache: &ObjectCache<FsObject>,
        dir: &RepoPath,
        entries: &[TreeEntry],
    ) -> Result<(), MountError> {
        for entry in entries {
            let path = dir.child(&entry.name);
            cache.get_or_create(path.as_str())?;
            if entry.kind == ObjectKind::Tree {
                let children = store.tree_entries(&entry.id)?;
                Self::prepopulate(store, cache, &path, &children)?;
            }
        }
        Ok(())
    }

    fn state(&self) -> MutexGuard<'_, GenerationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Process-unique number, in creation order.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Id of the snapshot's root tree.
    pub fn tree_id(&self) -> &Oid {
        &self.tree_id
    }

    /// Commit time of the snapshot, or resolution time for raw trees.
    pub fn time(&self) -> &UtcTimestamp {
        &self.time
    }

    /// Whether resolved objects are cached.
    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    /// Number of keys in the cache (0 when uncached or torn down).
    pub fn cache_len(&self) -> usize {
        self.cache.as_ref().map_or(0, ObjectCache::len)
    }

    /// Current value of the usage counter.
    pub fn usage(&self) -> i64 {
        self.state().usage
    }

    pub fn is_marked_for_deletion(&self) -> bool {
        self.state().marked_for_deletion
    }

    pub fn is_disposed(&self) -> bool {
        self.state().disposed
    }

    /// Add one usage unit.
    pub fn increase_usage(&self) {
        self.state().usage += 1;
    }

    /// Remove one usage unit.
    ///
    /// Returns `true` if this call tore the generation down.
    pub fn decrease_usage(&self) -> bool {
        let teardown = {
            let mut state = self.state();
            state.usage -= 1;
            let teardown = state.marked_for_deletion && state.usage <= 0 && !state.disposed;
            if teardown {
                state.disposed = true;
            }
            teardown
        };
        if teardown {
            self.teardown("last user left");
        }
        teardown
    }

    /// Retire the generation after it stopped being current.
    ///
    /// Returns `true` if nobody used it and it was torn down right away.
    pub fn mark_for_deletion(&self) -> bool {
        let teardown = {
            let mut state = self.state();
            state.marked_for_deletion = true;
            let teardown = state.usage <= 0 && !state.disposed;
            if teardown {
                state.disposed = true;
            }
            teardown
        };
        if teardown {
            self.teardown("retired unused");
        }
        teardown
    }

    /// Tear down regardless of users.
    ///
    /// Returns `false` if the generation was already torn down.
    pub fn dispose(&self) -> bool {
        let teardown = {
            let mut state = self.state();
            state.marked_for_deletion = true;
            !std::mem::replace(&mut state.disposed, true)
        };
        if teardown {
            self.teardown("disposed");
        }
        teardown
    }

    fn teardown(&self, reason: &str) {
        let root = self
            .root
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let cached = self.cache.as_ref().map_or(0, ObjectCache::clear);
        debug!(
            generation = self.sequence,
            tree = %self.tree_id.short(12),
            released_root = root.is_some(),
            cached_objects = cached,
            reason,
            "generation torn down"
        );
    }

    /// Take a usage unit unless the generation is already torn down.
    pub fn checkout(self: &Arc<Self>) -> Option<UsageGuard> {
        let mut state = self.state();
        if state.disposed {
            return None;
        }
        state.usage += 1;
        Some(UsageGuard {
            generation: Some(Arc::clone(self)),
        })
    }

    /// Resolve `path` using a unit obtained from [`Generation::checkout`].
    ///
    /// On success the unit moves into the returned handle if this generation
    /// caches; otherwise it is returned here and the handle owns its object.
    /// On failure the unit is returned.
    pub fn open(usage: UsageGuard, path: &RepoPath) -> Result<ObjectHandle, MountError> {
        Self::open_resolved(usage, path, None)
    }

    /// Resolve the child `entry` of a tree listed at `path`'s parent.
    ///
    /// The object is built from `entry` itself rather than by looking its
    /// name up again, so every listed entry is reachable. Usage is handled
    /// as in [`Generation::open`].
    pub fn open_entry(
        usage: UsageGuard,
        path: &RepoPath,
        entry: &TreeEntry,
    ) -> Result<ObjectHandle, MountError> {
        Self::open_resolved(usage, path, Some(entry))
    }

    fn open_resolved(
        usage: UsageGuard,
        path: &RepoPath,
        entry: Option<&TreeEntry>,
    ) -> Result<ObjectHandle, MountError> {
        let generation = Arc::clone(usage.generation());
        let object = generation.resolve(path, entry)?;
        if generation.is_cached() {
            Ok(ObjectHandle::cached(object, usage))
        } else {
            drop(usage);
            Ok(ObjectHandle::owned(object, generation))
        }
    }

    /// Build the object for one tree entry without touching the cache.
    ///
    /// Used when the entry's generation is already gone; the store is still
    /// valid for any object id it handed out.
    pub(crate) fn open_detached(
        self: &Arc<Self>,
        path: RepoPath,
        entry: &TreeEntry,
    ) -> Result<ObjectHandle, MountError> {
        let object = self.build_from_entry(path, entry)?;
        Ok(ObjectHandle::owned(Arc::new(object), Arc::clone(self)))
    }

    /// Resolve a normalized path to its object, through the cache if any.
    ///
    /// With `entry`, a missing object is built from it instead of being
    /// looked up by path.
    fn resolve(
        &self,
        path: &RepoPath,
        entry: Option<&TreeEntry>,
    ) -> Result<Arc<FsObject>, MountError> {
        let build = || match entry {
            Some(entry) => self.build_from_entry(path.clone(), entry),
            None => self.build(path),
        };
        let Some(cache) = &self.cache else {
            return build().map(Arc::new);
        };
        let item = cache
            .get_or_create(path.as_str())?
            .ok_or_else(|| MountError::PathNotFound {
                path: path.to_string(),
            })?;
        let object = match item.claim() {
            Claim::Ready(object) => object,
            Claim::Fill(slot) => {
                let object = Arc::new(build()?);
                trace!(generation = self.sequence, path = %path, "cache filled");
                slot.fill(object)
            }
        };
        Ok(object)
    }

    fn build(&self, path: &RepoPath) -> Result<FsObject, MountError> {
        let root = self
            .root
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| MountError::GenerationRetired {
                tree: self.tree_id.to_string(),
            })?;
        if path.is_root() {
            return Ok(FsObject::root(self.tree_id.clone(), root));
        }
        let entry = self
            .store
            .entry_by_path(&self.tree_id, path.relative())?
            .ok_or_else(|| MountError::PathNotFound {
                path: path.to_string(),
            })?;
        self.build_from_entry(path.clone(), &entry)
    }

    fn build_from_entry(&self, path: RepoPath, entry: &TreeEntry) -> Result<FsObject, MountError> {
        let content = match entry.kind {
            ObjectKind::Tree => ObjectContent::Tree(self.store.tree_entries(&entry.id)?.into()),
            ObjectKind::Blob => ObjectContent::Blob(self.store.read_blob(&entry.id)?.into()),
            ObjectKind::Unknown => ObjectContent::Unknown,
        };
        Ok(FsObject::from_entry(path, entry, content))
    }
}

impl fmt::Debug for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Generation")
            .field("sequence", &self.sequence)
            .field("tree_id", &self.tree_id)
            .field("usage", &state.usage)
            .field("marked_for_deletion", &state.marked_for_deletion)
            .field("disposed", &state.disposed)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

/// One unit on a generation's usage counter.
///
/// Dropping the guard gives the unit back.
#[derive(Debug)]
pub struct UsageGuard {
    generation: Option<Arc<Generation>>,
}

impl UsageGuard {
    /// The generation this unit belongs to.
    pub fn generation(&self) -> &Arc<Generation> {
        // only release() and drop() empty the slot, and both consume the guard
        match &self.generation {
            Some(generation) => generation,
            None => unreachable!("usage guard used after release"),
        }
    }

    /// Give the unit back. Returns `true` if that tore the generation down.
    pub fn release(mut self) -> bool {
        self.generation
            .take()
            .is_some_and(|generation| generation.decrease_usage())
    }
}

impl Drop for UsageGuard {
    fn drop(&mut self) {
        if let Some(generation) = self.generation.take() {
            generation.decrease_usage();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mock::MockStore;
    use std::thread;

    fn store_with(files: &[(&str, &[u8], bool)]) -> (Arc<MockStore>, Oid) {
        let store = Arc::new(MockStore::new());
        store.commit("main", files);
        let tree = store.tree_of("main").unwrap();
        (store, tree)
    }

    fn generation(use_cache: bool) -> (Arc<MockStore>, Arc<Generation>) {
        let (store, tree) = store_with(&[
            ("Makefile", b"all:\n".as_slice(), false),
            ("src/gitmod.c", b"int x;\n".as_slice(), false),
            ("src/cache.c", b"int y;\n".as_slice(), false),
            ("run.sh", b"#!/bin/sh\n".as_slice(), true),
        ]);
        let g = Generation::create(
            store.clone(),
            tree,
            UtcTimestamp::from_unix_seconds(1),
            use_cache,
        )
        .unwrap();
        (store, g)
    }

    fn open(g: &Arc<Generation>, path: &str) -> Result<ObjectHandle, MountError> {
        Generation::open(g.checkout().unwrap(), &RepoPath::new(path))
    }

    #[test]
    fn scenario_a_root_listing() {
        let (store, tree) = store_with(&[
            (".gitignore", b"target\n".as_slice(), false),
            ("build.sh", b"#!/bin/sh\n".as_slice(), true),
            ("gitfs.c", b"int main;\n".as_slice(), false),
            ("include/gitfs.h", b"#pragma once\n".as_slice(), false),
            ("tests/suite.c", b"void t;\n".as_slice(), false),
        ]);
        let g = Generation::create(store, tree, UtcTimestamp::now(), false).unwrap();
        let root = open(&g, "/").unwrap();
        assert!(root.is_tree());
        assert_eq!(root.entry_count(), 5);
        assert_eq!(root.mode(), 0o555);
        assert!(!root.release());
    }

    #[test]
    fn eager_cache_preinserts_every_path() {
        let (_store, g) = generation(true);
        // "/", Makefile, run.sh, src, src/cache.c, src/gitmod.c
        assert_eq!(g.cache_len(), 6);
        assert_eq!(g.usage(), 0);
    }

    #[test]
    fn scenario_b_cached_usage_and_disposal() {
        let (_store, g) = generation(true);
        let makefile = open(&g, "/Makefile").unwrap();
        let source = open(&g, "/src/gitmod.c").unwrap();
        assert_eq!(g.usage(), 2);

        assert!(!g.mark_for_deletion());
        assert!(!makefile.release());
        assert_eq!(g.usage(), 1);
        assert!(source.release());
        assert_eq!(g.usage(), 0);
        assert!(g.is_disposed());
        assert_eq!(g.cache_len(), 0);
    }

    #[test]
    fn same_path_twice_counts_twice() {
        let (_store, g) = generation(true);
        let first = open(&g, "/Makefile").unwrap();
        let second = open(&g, "/Makefile").unwrap();
        assert!(Arc::ptr_eq(first.object(), second.object()));
        assert_eq!(g.usage(), 2);
        g.mark_for_deletion();
        assert!(!first.release());
        assert!(second.release());
    }

    #[test]
    fn scenario_d_fixed_cache_reuses_object() {
        let (store, g) = generation(true);
        store.reset_calls();
        let first = open(&g, "/src/gitmod.c").unwrap();
        let reads = store.calls().object_reads();
        let second = open(&g, "/src/gitmod.c").unwrap();
        assert!(Arc::ptr_eq(first.object(), second.object()));
        assert_eq!(store.calls().object_reads(), reads);
    }

    #[test]
    fn scenario_e_fixed_cache_miss_inserts_nothing() {
        let (store, g) = generation(true);
        let before = g.cache_len();
        store.reset_calls();
        let err = open(&g, "/does/not/exist").unwrap_err();
        assert!(matches!(err, MountError::PathNotFound { .. }));
        assert_eq!(g.cache_len(), before);
        assert_eq!(store.calls().object_reads(), 0);
        assert_eq!(g.usage(), 0);
    }

    #[test]
    fn uncached_handles_hold_no_usage() {
        let (_store, g) = generation(false);
        let handle = open(&g, "/Makefile").unwrap();
        assert!(!handle.holds_usage());
        assert_eq!(g.usage(), 0);
        assert_eq!(handle.bytes(), Some(&b"all:\n"[..]));
        assert!(!handle.release());
    }

    #[test]
    fn uncached_lookups_hit_backend_every_time() {
        let (store, g) = generation(false);
        store.reset_calls();
        open(&g, "/Makefile").unwrap().release();
        open(&g, "/Makefile").unwrap().release();
        assert_eq!(store.calls().entry_by_path, 2);
    }

    #[test]
    fn failed_lookup_returns_unit() {
        let (_store, g) = generation(false);
        assert!(open(&g, "/nope").is_err());
        assert_eq!(g.usage(), 0);
    }

    #[test]
    fn mark_unused_generation_tears_down_once() {
        let (_store, g) = generation(false);
        assert!(g.mark_for_deletion());
        assert!(g.is_disposed());
        assert!(!g.mark_for_deletion());
        assert!(!g.dispose());
        assert!(g.checkout().is_none());
    }

    #[test]
    fn unmarked_generation_survives_zero_usage() {
        let (_store, g) = generation(true);
        let handle = open(&g, "/Makefile").unwrap();
        assert!(!handle.release());
        assert!(!g.is_disposed());
        assert_eq!(g.usage(), 0);
    }

    #[test]
    fn dropped_handle_releases_its_unit() {
        let (_store, g) = generation(true);
        {
            let _handle = open(&g, "/run.sh").unwrap();
            assert_eq!(g.usage(), 1);
        }
        assert_eq!(g.usage(), 0);
    }

    #[test]
    fn executable_keeps_exec_bits() {
        let (_store, g) = generation(false);
        assert_eq!(open(&g, "/run.sh").unwrap().mode(), 0o555);
        assert_eq!(open(&g, "/Makefile").unwrap().mode(), 0o444);
    }

    #[test]
    fn lookups_after_dispose_are_refused() {
        let (_store, g) = generation(false);
        let usage = g.checkout().unwrap();
        g.dispose();
        let err = Generation::open(usage, &RepoPath::root()).unwrap_err();
        assert!(matches!(err, MountError::GenerationRetired { .. }));
    }

    #[test]
    fn concurrent_releases_tear_down_exactly_once() {
        for _ in 0..20 {
            let (_store, g) = generation(true);
            let handles: Vec<_> = (0..16)
                .map(|i| open(&g, if i % 2 == 0 { "/Makefile" } else { "/src" }).unwrap())
                .collect();
            g.mark_for_deletion();
            let joins: Vec<_> = handles
                .into_iter()
                .map(|h| thread::spawn(move || h.release()))
                .collect();
            let teardowns = joins
                .into_iter()
                .map(|j| j.join().unwrap())
                .filter(|disposed| *disposed)
                .count();
            assert_eq!(teardowns, 1);
            assert!(g.is_disposed());
        }
    }
}
