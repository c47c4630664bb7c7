//! store
//!
//! Abstraction over the object store a snapshot is read from.
//!
//! # Architecture
//!
//! The mount core never talks to a version-control library directly. It
//! consumes the [`ObjectStore`] capability: parse a symbolic name into an
//! object, list a tree's immediate children, look up one path inside a tree,
//! and read a blob. [`crate::git::Git`] is the production implementation;
//! [`mock::MockStore`] is a deterministic in-memory implementation for tests.
//!
//! # Modules
//!
//! - `traits`: Core `ObjectStore` trait and the value types it exchanges
//! - [`mock`]: In-memory implementation with call accounting
//!
//! # Example
//!
//! ```
//! use gitmod::store::mock::MockStore;
//! use gitmod::store::{ObjectStore, RevisionObject};
//!
//! let store = MockStore::new();
//! store.commit("main", &[("README.md", b"hello".as_slice(), false)]);
//!
//! match store.revparse("main").unwrap() {
//!     RevisionObject::Commit { tree, .. } => {
//!         let entries = store.tree_entries(&tree).unwrap();
//!         assert_eq!(entries[0].name, "README.md");
//!     }
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```

pub mod mock;
mod traits;

pub use traits::*;
