//! mount
//!
//! The generational root-tree manager.
//!
//! # Architecture
//!
//! A [`RepositoryContext`] tracks one symbolic reference. It owns the
//! *current* [`Generation`]: one immutable tree snapshot plus its usage
//! counter, its deletion mark and (optionally) an [`ObjectCache`] of
//! resolved paths. A background [`Monitor`] re-resolves the reference and,
//! when the snapshot moves, swaps in a new generation. The outgoing
//! generation is torn down only once nobody uses it any more.
//!
//! ```text
//!   readers ──get──▶ RepositoryContext ──checkout──▶ Generation ──▶ ObjectCache
//!                          ▲     │ swap                 │
//!                          │     ▼                      ▼
//!                       Monitor  Generation(old) ◀── ObjectHandle::release
//! ```
//!
//! # Lock tiers
//!
//! 1. The context lock guards the current-generation pointer. It is held
//!    only while checking a generation out or swapping the pointer, never
//!    across backend I/O.
//! 2. Each generation's lock guards its counter and flags.
//! 3. Each cache item is a one-shot slot that readers wait on while its
//!    filler resolves the path.
//!
//! [`ObjectCache`]: cache::ObjectCache

pub mod cache;
pub mod context;
pub mod generation;
pub mod monitor;
pub mod object;
pub mod resolver;

pub use context::{RefreshOutcome, RepositoryContext, StartOptions, SwapEvent};
pub use generation::{Generation, UsageGuard};
pub use monitor::Monitor;
pub use object::{FsObject, ObjectContent, ObjectHandle};
pub use resolver::{ReferenceKind, Snapshot};

use thiserror::Error;

use crate::git::GitError;
use crate::store::StoreError;

/// Errors from the mount core.
#[derive(Debug, Error)]
pub enum MountError {
    /// The tracked name does not resolve, or resolves to an unusable object.
    #[error("cannot resolve '{reference}': {message}")]
    ReferenceResolution {
        /// The symbolic name.
        reference: String,
        /// What went wrong.
        message: String,
    },

    /// The generation is valid but the path is absent from it.
    #[error("path not found: {path}")]
    PathNotFound {
        /// The normalized path, or `path[index]` for child lookups.
        path: String,
    },

    /// A lock, cache or thread could not be allocated.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// A tree operation was requested against something else.
    #[error("not a tree: {path}")]
    NotATree {
        /// Path of the offending object.
        path: String,
    },

    /// A blob operation was requested against something else.
    #[error("not a blob: {path}")]
    NotABlob {
        /// Path of the offending object.
        path: String,
    },

    /// The generation was torn down before the lookup reached it.
    #[error("generation of tree {tree} has been retired")]
    GenerationRetired {
        /// Tree id of the retired generation.
        tree: String,
    },

    /// The object store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The repository could not be opened.
    #[error(transparent)]
    Git(#[from] GitError),
}

impl MountError {
    /// Whether this is an ordinary negative result rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            MountError::PathNotFound { .. } | MountError::Store(StoreError::NotFound(_))
        )
    }
}

impl From<cache::CacheError> for MountError {
    fn from(err: cache::CacheError) -> Self {
        match err {
            cache::CacheError::ResourceExhausted(msg) => MountError::ResourceExhausted(msg),
        }
    }
}
