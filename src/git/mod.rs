//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to Git. No other module imports
//! `git2`; the mount core sees the repository only as an
//! [`ObjectStore`](crate::store::ObjectStore).
//!
//! # Responsibilities
//!
//! - Repository discovery and opening (bare or not)
//! - Revision parsing and object classification
//! - Tree listing and path lookup
//! - Blob reads
//!
//! # Invariants
//!
//! - The repository is never written
//! - All operations return strong types (Oid, TreeEntry, RevisionObject)

mod interface;

pub use interface::{Git, GitError};
