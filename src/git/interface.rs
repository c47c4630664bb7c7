//! git::interface
//!
//! Git interface implementation using git2.
//!
//! This module is the **single doorway** to the repository. The mount core
//! reaches it only through the [`ObjectStore`] trait, so readers never see a
//! git2 type and every failure arrives already categorized.
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`GitError::NotARepo`]: No repository at or above the given path
//! - [`GitError::RefNotFound`]: A symbolic name did not parse
//! - [`GitError::ObjectNotFound`]: An id does not name an object of the
//!   expected kind
//! - [`GitError::InvalidOid`]: An id is malformed
//!
//! # Example
//!
//! ```ignore
//! use gitmod::git::Git;
//! use gitmod::store::ObjectStore;
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! let head = git.revparse("HEAD")?;
//! println!("HEAD is a {}", head.kind_name());
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::core::types::{ObjectKind, Oid, TypeError, UtcTimestamp};
use crate::store::{ObjectStore, RevisionObject, StoreError, TreeEntry};

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Object not found in repository.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID that was not found
        oid: String,
    },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid {
        /// The invalid OID string
        oid: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => GitError::ObjectNotFound {
                oid: context.to_string(),
            },
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: context.to_string(),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(msg) => GitError::InvalidOid { oid: msg },
        }
    }
}

impl From<GitError> for StoreError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::RefNotFound { .. } | GitError::ObjectNotFound { .. } => {
                StoreError::NotFound(err.to_string())
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// The Git interface.
///
/// Wraps one `git2::Repository`. libgit2 repositories may move between
/// threads but must not be used from two at once, so every access goes
/// through a mutex held only for the duration of a single object lookup.
pub struct Git {
    repo: Mutex<git2::Repository>,
    git_dir: PathBuf,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git").field("path", &self.git_dir).finish()
    }
}

impl Git {
    /// Open a repository at the given path.
    ///
    /// Uses `git2::Repository::discover` to find the repository root, so
    /// `path` can be any directory within the repository. Bare repositories
    /// are accepted.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;
        let git_dir = repo.path().to_path_buf();
        Ok(Self {
            repo: Mutex::new(repo),
            git_dir,
        })
    }

    /// Path of the `.git` directory (or the repository itself, when bare).
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    fn repo(&self) -> MutexGuard<'_, git2::Repository> {
        // a panic inside libgit2 leaves no partial state in the handle
        self.repo.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn parse_oid(oid: &Oid) -> Result<git2::Oid, GitError> {
        git2::Oid::from_str(oid.as_str()).map_err(|e| GitError::from_git2(e, oid.as_str()))
    }

    fn to_oid(oid: git2::Oid) -> Result<Oid, GitError> {
        Ok(Oid::new(oid.to_string())?)
    }

    /// Describe one object, following a tag's target a single level.
    fn describe(object: &git2::Object<'_>, follow_tag: bool) -> Result<RevisionObject, GitError> {
        let id = Self::to_oid(object.id())?;
        match object.kind() {
            Some(git2::ObjectType::Tree) => Ok(RevisionObject::Tree { id }),
            Some(git2::ObjectType::Commit) => {
                let commit = object
                    .as_commit()
                    .ok_or_else(|| GitError::ObjectNotFound { oid: id.to_string() })?;
                Ok(RevisionObject::Commit {
                    tree: Self::to_oid(commit.tree_id())?,
                    time: UtcTimestamp::from_unix_seconds(commit.time().seconds()),
                    id,
                })
            }
            Some(git2::ObjectType::Tag) if follow_tag => {
                let tag = object
                    .as_tag()
                    .ok_or_else(|| GitError::ObjectNotFound { oid: id.to_string() })?;
                let target = tag
                    .target()
                    .map_err(|e| GitError::from_git2(e, id.as_str()))?;
                Ok(RevisionObject::Tag {
                    target: Box::new(Self::describe(&target, false)?),
                    id,
                })
            }
            kind => Ok(RevisionObject::Other {
                id,
                kind: kind.map(|k| k.str()).unwrap_or("unknown").to_string(),
            }),
        }
    }

    fn entry_kind(kind: Option<git2::ObjectType>) -> ObjectKind {
        match kind {
            Some(git2::ObjectType::Tree) => ObjectKind::Tree,
            Some(git2::ObjectType::Blob) => ObjectKind::Blob,
            _ => ObjectKind::Unknown,
        }
    }

    fn convert_entry(entry: &git2::TreeEntry<'_>) -> Result<TreeEntry, GitError> {
        Ok(TreeEntry {
            name: String::from_utf8_lossy(entry.name_bytes()).into_owned(),
            id: Self::to_oid(entry.id())?,
            kind: Self::entry_kind(entry.kind()),
            filemode: u32::try_from(entry.filemode()).unwrap_or(0),
        })
    }

    /// Parse a revision expression into an object description.
    ///
    /// # Errors
    ///
    /// - [`GitError::RefNotFound`] if the name does not parse
    pub fn revparse_object(&self, spec: &str) -> Result<RevisionObject, GitError> {
        let repo = self.repo();
        let object = repo.revparse_single(spec).map_err(|e| match e.code() {
            git2::ErrorCode::NotFound | git2::ErrorCode::InvalidSpec | git2::ErrorCode::Ambiguous => {
                GitError::RefNotFound {
                    refname: spec.to_string(),
                }
            }
            _ => GitError::from_git2(e, spec),
        })?;
        Self::describe(&object, true)
    }

    /// List a tree's immediate children.
    ///
    /// # Errors
    ///
    /// - [`GitError::ObjectNotFound`] if the tree doesn't exist
    pub fn list_tree(&self, tree: &Oid) -> Result<Vec<TreeEntry>, GitError> {
        let git_oid = Self::parse_oid(tree)?;
        let repo = self.repo();
        let tree_obj = repo
            .find_tree(git_oid)
            .map_err(|e| GitError::from_git2(e, tree.as_str()))?;
        tree_obj.iter().map(|e| Self::convert_entry(&e)).collect()
    }

    /// Find one entry by relative path below a tree.
    ///
    /// # Errors
    ///
    /// - [`GitError::ObjectNotFound`] if the root tree doesn't exist
    pub fn find_entry(&self, root: &Oid, path: &str) -> Result<Option<TreeEntry>, GitError> {
        if path.is_empty() {
            return Ok(None);
        }
        let git_oid = Self::parse_oid(root)?;
        let repo = self.repo();
        let tree = repo
            .find_tree(git_oid)
            .map_err(|e| GitError::from_git2(e, root.as_str()))?;
        match tree.get_path(Path::new(path)) {
            Ok(entry) => return Ok(Some(Self::convert_entry(&entry)?)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => {}
            Err(e) => return Err(GitError::from_git2(e, path)),
        }
        // names that are not UTF-8 are only reachable by their lossy spelling
        Self::find_by_display_name(&repo, tree, path)
    }

    /// Walk `path` below `root`, matching each component against the
    /// entry names as [`TreeEntry::name`] spells them.
    fn find_by_display_name<'r>(
        repo: &'r git2::Repository,
        root: git2::Tree<'r>,
        path: &str,
    ) -> Result<Option<TreeEntry>, GitError> {
        let mut tree = root;
        let mut components = path.split('/').filter(|c| !c.is_empty()).peekable();
        while let Some(component) = components.next() {
            let last = components.peek().is_none();
            let (id, kind, found) = {
                let Some(entry) = tree
                    .iter()
                    .find(|e| String::from_utf8_lossy(e.name_bytes()) == component)
                else {
                    return Ok(None);
                };
                let found = if last {
                    Some(Self::convert_entry(&entry)?)
                } else {
                    None
                };
                (entry.id(), entry.kind(), found)
            };
            if last {
                return Ok(found);
            }
            if kind != Some(git2::ObjectType::Tree) {
                return Ok(None);
            }
            tree = repo
                .find_tree(id)
                .map_err(|e| GitError::from_git2(e, &id.to_string()))?;
        }
        Ok(None)
    }

    /// Read a blob by OID.
    ///
    /// # Errors
    ///
    /// - [`GitError::ObjectNotFound`] if the blob doesn't exist
    pub fn read_blob(&self, oid: &Oid) -> Result<Vec<u8>, GitError> {
        let git_oid = Self::parse_oid(oid)?;
        let repo = self.repo();
        let blob = repo
            .find_blob(git_oid)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?;
        Ok(blob.content().to_vec())
    }
}

impl ObjectStore for Git {
    fn revparse(&self, spec: &str) -> Result<RevisionObject, StoreError> {
        Ok(self.revparse_object(spec)?)
    }

    fn tree_entries(&self, tree: &Oid) -> Result<Vec<TreeEntry>, StoreError> {
        Ok(self.list_tree(tree)?)
    }

    fn entry_by_path(&self, root: &Oid, path: &str) -> Result<Option<TreeEntry>, StoreError> {
        Ok(self.find_entry(root, path)?)
    }

    fn read_blob(&self, blob: &Oid) -> Result<Vec<u8>, StoreError> {
        Ok(Git::read_blob(self, blob)?)
    }
}
