//! mount::context
//!
//! The handle aggregating one tracked reference and its current generation.
//!
//! # Swap protocol
//!
//! 1. Re-resolve the reference. On failure keep serving the current
//!    generation.
//! 2. If the tree is unchanged, stop.
//! 3. Build the new generation with no lock held.
//! 4. Under the context lock, check the tree against the current one again
//!    and swap the pointer. Readers arriving after this see the new
//!    generation only.
//! 5. Outside the context lock, mark the old generation for deletion. It is
//!    torn down now if unused, else by its last user.
//!
//! A reader takes its usage unit while holding the context lock, so no
//! generation can be torn down between a reader finding it and using it.
//!
//! # Example
//!
//! ```
//! use gitmod::mount::{RepositoryContext, StartOptions};
//! use gitmod::store::mock::MockStore;
//! use std::sync::Arc;
//!
//! let store = Arc::new(MockStore::new());
//! store.commit("main", &[("README", b"hello".as_slice(), false)]);
//!
//! let options = StartOptions { fixed_reference: true, ..StartOptions::default() };
//! let ctx = RepositoryContext::with_store(store, "main", options).unwrap();
//! let readme = ctx.get("/README").unwrap();
//! assert_eq!(readme.bytes(), Some(&b"hello"[..]));
//! readme.release();
//! ctx.stop();
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::types::{Oid, RepoPath, UtcTimestamp};
use crate::git::Git;
use crate::store::ObjectStore;

use super::generation::{Generation, UsageGuard};
use super::monitor::Monitor;
use super::object::ObjectHandle;
use super::resolver::{resolve_reference, ReferenceKind, Snapshot};
use super::MountError;

/// Options for [`RepositoryContext::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOptions {
    /// Walk every snapshot eagerly and cache every resolved object.
    pub keep_in_memory: bool,
    /// Never re-resolve the reference.
    pub fixed_reference: bool,
    /// Delay between polls; zero polls in a tight loop.
    pub poll_interval: Duration,
    /// Owner reported for every object.
    pub uid: u32,
    /// Group reported for every object.
    pub gid: u32,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            keep_in_memory: false,
            fixed_reference: false,
            poll_interval: Duration::from_millis(100),
            uid: 0,
            gid: 0,
        }
    }
}

/// A completed generation swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapEvent {
    /// Tree of the outgoing generation.
    pub old_tree: Oid,
    /// Tree of the new current generation.
    pub new_tree: Oid,
    /// Time of the new snapshot.
    pub time: UtcTimestamp,
    /// Whether the outgoing generation was torn down immediately.
    pub old_disposed: bool,
}

/// Result of one re-resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The reference still resolves to the current tree.
    Unchanged,
    /// A new generation is current.
    Swapped(SwapEvent),
}

/// State shared with the monitor thread.
struct Shared {
    store: Arc<dyn ObjectStore>,
    reference: String,
    keep_in_memory: bool,
    current: Mutex<Arc<Generation>>,
    subscribers: Mutex<Vec<Sender<SwapEvent>>>,
    swaps: AtomicU64,
}

impl Shared {
    fn current(&self) -> MutexGuard<'_, Arc<Generation>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn checkout(&self) -> Result<UsageGuard, MountError> {
        let current = self.current();
        current
            .checkout()
            .ok_or_else(|| MountError::GenerationRetired {
                tree: current.tree_id().to_string(),
            })
    }

    fn refresh(&self) -> Result<RefreshOutcome, MountError> {
        let (_, snapshot) = resolve_reference(self.store.as_ref(), &self.reference)?;
        if self.current().tree_id() == &snapshot.tree {
            return Ok(RefreshOutcome::Unchanged);
        }
        self.swap(snapshot)
    }

    fn swap(&self, snapshot: Snapshot) -> Result<RefreshOutcome, MountError> {
        let fresh = Generation::create(
            Arc::clone(&self.store),
            snapshot.tree,
            snapshot.time,
            self.keep_in_memory,
        )?;

        let old = {
            let mut current = self.current();
            if current.tree_id() == fresh.tree_id() {
                None
            } else {
                Some(std::mem::replace(&mut *current, Arc::clone(&fresh)))
            }
        };
        let Some(old) = old else {
            // another swap installed this tree first
            fresh.dispose();
            return Ok(RefreshOutcome::Unchanged);
        };

        let old_disposed = old.mark_for_deletion();
        let event = SwapEvent {
            old_tree: old.tree_id().clone(),
            new_tree: fresh.tree_id().clone(),
            time: fresh.time().clone(),
            old_disposed,
        };
        self.swaps.fetch_add(1, Ordering::Relaxed);
        info!(
            reference = %self.reference,
            old = %event.old_tree.short(12),
            new = %event.new_tree.short(12),
            old_in_use = !old_disposed,
            "root tree changed"
        );
        self.notify(&event);
        Ok(RefreshOutcome::Swapped(event))
    }

    fn notify(&self, event: &SwapEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// One tracked reference in one repository.
pub struct RepositoryContext {
    shared: Arc<Shared>,
    kind: ReferenceKind,
    monitor: Mutex<Option<Monitor>>,
    uid: u32,
    gid: u32,
}

impl RepositoryContext {
    /// Open the repository at `repo` and start tracking `reference`.
    ///
    /// # Errors
    ///
    /// - [`MountError::Git`] if no repository is found
    /// - [`MountError::ReferenceResolution`] if the name is unusable
    /// - [`MountError::ResourceExhausted`] if the cache or monitor cannot be
    ///   created
    pub fn start(repo: &Path, reference: &str, options: StartOptions) -> Result<Self, MountError> {
        let git = Git::open(repo)?;
        debug!(git_dir = %git.git_dir().display(), "repository opened");
        Self::with_store(Arc::new(git), reference, options)
    }

    /// Start tracking `reference` in an arbitrary object store.
    ///
    /// # Errors
    ///
    /// As [`RepositoryContext::start`], minus repository discovery.
    pub fn with_store(
        store: Arc<dyn ObjectStore>,
        reference: &str,
        options: StartOptions,
    ) -> Result<Self, MountError> {
        let (kind, snapshot) = resolve_reference(store.as_ref(), reference)?;
        let generation = Generation::create(
            Arc::clone(&store),
            snapshot.tree,
            snapshot.time,
            options.keep_in_memory,
        )?;
        info!(
            reference,
            kind = %kind,
            tree = %generation.tree_id().short(12),
            keep_in_memory = options.keep_in_memory,
            "tracking reference"
        );

        let shared = Arc::new(Shared {
            store,
            reference: reference.to_string(),
            keep_in_memory: options.keep_in_memory,
            current: Mutex::new(generation),
            subscribers: Mutex::new(Vec::new()),
            swaps: AtomicU64::new(0),
        });

        let movable = !options.fixed_reference && !Oid::is_full_hex(reference);
        let monitor = if movable {
            let polled = Arc::clone(&shared);
            let monitor = Monitor::spawn(options.poll_interval, move || {
                if let Err(err) = polled.refresh() {
                    warn!(reference = %polled.reference, error = %err, "poll failed, keeping current tree");
                }
            });
            match monitor {
                Ok(monitor) => Some(monitor),
                Err(err) => {
                    shared.current().dispose();
                    return Err(err);
                }
            }
        } else {
            debug!(reference, "root tree is fixed");
            None
        };

        Ok(Self {
            shared,
            kind,
            monitor: Mutex::new(monitor),
            uid: options.uid,
            gid: options.gid,
        })
    }

    /// Stop the monitor and tear down the current generation.
    ///
    /// No reader may still use the context. Idempotent.
    pub fn stop(&self) {
        let monitor = self
            .monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut monitor) = monitor {
            monitor.stop();
        }
        let current = Arc::clone(&*self.shared.current());
        if current.dispose() {
            info!(reference = %self.shared.reference, "stopped");
        }
    }

    /// Resolve `path` in the current generation.
    ///
    /// Any spelling of the path is accepted; see [`RepoPath::new`].
    ///
    /// # Errors
    ///
    /// - [`MountError::PathNotFound`] if the path is absent
    /// - [`MountError::GenerationRetired`] after [`RepositoryContext::stop`]
    pub fn get(&self, path: &str) -> Result<ObjectHandle, MountError> {
        let usage = self.shared.checkout()?;
        Generation::open(usage, &RepoPath::new(path))
    }

    /// Resolve the `index`-th child of `tree`.
    ///
    /// The child comes from the same generation as `tree`, even if the
    /// context has moved on since.
    ///
    /// # Errors
    ///
    /// - [`MountError::NotATree`] if `tree` is not a tree
    /// - [`MountError::PathNotFound`] if `index` is out of range
    pub fn get_child(&self, tree: &ObjectHandle, index: usize) -> Result<ObjectHandle, MountError> {
        let entries = tree.entries().ok_or_else(|| MountError::NotATree {
            path: tree.path().to_string(),
        })?;
        let entry = entries.get(index).ok_or_else(|| MountError::PathNotFound {
            path: format!("{}[{}]", tree.path(), index),
        })?;
        let path = tree.path().child(&entry.name);
        let generation = tree.generation();
        match generation.checkout() {
            Some(usage) => Generation::open_entry(usage, &path, entry),
            None => generation.open_detached(path, entry),
        }
    }

    /// Give a handle back. Returns `true` if its generation was torn down.
    pub fn release(&self, handle: ObjectHandle) -> bool {
        handle.release()
    }

    /// Re-resolve the reference now and swap if it moved.
    ///
    /// # Errors
    ///
    /// [`MountError::ReferenceResolution`] if the name no longer resolves;
    /// the current generation keeps serving.
    pub fn refresh(&self) -> Result<RefreshOutcome, MountError> {
        self.shared.refresh()
    }

    /// Make `snapshot` current.
    ///
    /// Returns `true` if the outgoing generation was unused and torn down
    /// immediately, `false` if it survives until its last user leaves (or
    /// if `snapshot` was already current).
    ///
    /// # Errors
    ///
    /// [`MountError::Store`] or [`MountError::ResourceExhausted`] if the new
    /// generation cannot be built; nothing changes in that case.
    pub fn root_tree_changed(&self, snapshot: Snapshot) -> Result<bool, MountError> {
        match self.shared.swap(snapshot)? {
            RefreshOutcome::Swapped(event) => Ok(event.old_disposed),
            RefreshOutcome::Unchanged => Ok(false),
        }
    }

    /// Receive every future swap.
    pub fn subscribe(&self) -> Receiver<SwapEvent> {
        let (tx, rx) = mpsc::channel();
        self.shared
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// The generation new readers are served from.
    pub fn current_generation(&self) -> Arc<Generation> {
        Arc::clone(&*self.shared.current())
    }

    /// The tracked name.
    pub fn reference(&self) -> &str {
        &self.shared.reference
    }

    /// What the tracked name resolved to at start.
    pub fn reference_kind(&self) -> ReferenceKind {
        self.kind
    }

    /// Whether a monitor thread is polling.
    pub fn is_monitored(&self) -> bool {
        self.poll_interval().is_some()
    }

    /// Delay between polls of the running monitor, if any.
    pub fn poll_interval(&self) -> Option<Duration> {
        self.monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|monitor| monitor.is_running())
            .map(Monitor::interval)
    }

    /// Number of swaps so far.
    pub fn swap_count(&self) -> u64 {
        self.shared.swaps.load(Ordering::Relaxed)
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }

    pub fn gid(&self) -> u32 {
        self.gid
    }
}

impl Drop for RepositoryContext {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for RepositoryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryContext")
            .field("reference", &self.shared.reference)
            .field("kind", &self.kind)
            .field("current", &*self.shared.current())
            .finish()
    }
}
