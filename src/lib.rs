//! gitmod - A read-only, branch-tracking view of a git tree
//!
//! gitmod exposes the tree of a treeish (a branch, a tag, a commit or a tree)
//! as a read-only filesystem. When the treeish moves, the view swaps to the
//! new tree while every handle already open keeps reading the tree it was
//! opened from.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, drives the adapter)
//! - [`fs`] - Filesystem adapter: attributes, listings, handles, errno and
//!   inode numbers, plus the optional FUSE mount
//! - [`mount`] - Generations, object caches, swaps and the reference monitor
//! - [`store`] - Object store abstraction and an in-memory store for tests
//! - [`git`] - libgit2-backed object store
//! - [`core`] - Domain types and configuration
//! - [`ui`] - Output formatting
//!
//! # Correctness Invariants
//!
//! 1. Exactly one generation is current at any time
//! 2. A generation is torn down once, after it is retired and its last user leaves
//! 3. A handle always reads the tree it was opened from
//! 4. A cached path is constructed at most once per generation

pub mod cli;
pub mod core;
pub mod fs;
pub mod git;
pub mod mount;
pub mod store;
pub mod ui;
