//! fs::inode
//!
//! Inode numbers for paths, as a kernel driver addresses them.
//!
//! Numbers are handed out on first sight and never reused, so an inode keeps
//! naming the same path across snapshot swaps. The root is always
//! [`ROOT_INODE`].

use std::collections::HashMap;

use crate::core::types::RepoPath;

/// Inode of the tree root.
pub const ROOT_INODE: u64 = 1;

/// Bidirectional inode and path mapping.
#[derive(Debug)]
pub struct InodeTable {
    /// Path of inode `n` at index `n - 1`.
    paths: Vec<RepoPath>,
    inodes: HashMap<RepoPath, u64>,
}

impl InodeTable {
    pub fn new() -> Self {
        let root = RepoPath::root();
        Self {
            paths: vec![root.clone()],
            inodes: HashMap::from([(root, ROOT_INODE)]),
        }
    }

    /// Path named by `inode`.
    pub fn path(&self, inode: u64) -> Option<&RepoPath> {
        let index = usize::try_from(inode.checked_sub(1)?).ok()?;
        self.paths.get(index)
    }

    /// Inode of `path`, assigning the next free number on first sight.
    pub fn assign(&mut self, path: &RepoPath) -> u64 {
        if let Some(&inode) = self.inodes.get(path) {
            return inode;
        }
        self.paths.push(path.clone());
        let inode = self.paths.len() as u64;
        self.inodes.insert(path.clone(), inode);
        inode
    }

    /// Inode and path of `name` inside the directory `parent`.
    pub fn child(&mut self, parent: u64, name: &str) -> Option<(u64, RepoPath)> {
        let path = self.path(parent)?.child(name);
        Some((self.assign(&path), path))
    }

    /// Inode of the directory containing `inode`; the root is its own parent.
    pub fn parent(&mut self, inode: u64) -> Option<u64> {
        match self.path(inode)?.parent() {
            Some(parent) => Some(self.assign(&parent)),
            None => Some(ROOT_INODE),
        }
    }

    /// Number of known inodes, the root included.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}
