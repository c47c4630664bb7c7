//! fs
//!
//! Protocol-neutral filesystem adapter over a [`RepositoryContext`].
//!
//! Every call maps to the operations a userspace filesystem driver issues:
//! attribute lookup, directory listing, open, read and release. Errors carry
//! the errno such a driver reports.
//!
//! # Attributes
//!
//! | Kind  | Type      | Permissions                    | Links       | Size        |
//! |-------|-----------|--------------------------------|-------------|-------------|
//! | tree  | directory | `0555`                         | entries + 2 | entry count |
//! | blob  | file      | mode, minus exec unless allowed| 1           | byte length |
//!
//! Other kinds (submodule links) are reported as missing.
//!
//! With the `fuse` feature, [`fuse::GitFuse`] hands these calls to the
//! kernel; [`inode::InodeTable`] gives every path a stable inode number.

#[cfg(feature = "fuse")]
pub mod fuse;
pub mod inode;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use thiserror::Error;
use tracing::{trace, warn};

use crate::core::types::{ObjectKind, UtcTimestamp};
use crate::mount::{MountError, ObjectHandle, RepositoryContext};

pub use libc::{EBADF, EIO, EISDIR, ENOENT, ENOTDIR};

/// Permission bits of every directory.
const DIR_PERM: u32 = 0o555;

/// Errors from filesystem calls.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("no such file or directory: {0}")]
    NotFound(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("bad file handle: {0}")]
    BadHandle(u64),

    #[error(transparent)]
    Mount(MountError),
}

impl FsError {
    /// The errno a filesystem driver returns for this error.
    pub fn errno(&self) -> i32 {
        match self {
            FsError::NotFound(_) => ENOENT,
            FsError::NotADirectory(_) => ENOTDIR,
            FsError::IsADirectory(_) => EISDIR,
            FsError::BadHandle(_) => EBADF,
            FsError::Mount(_) => EIO,
        }
    }
}

impl From<MountError> for FsError {
    fn from(err: MountError) -> Self {
        match err {
            MountError::PathNotFound { path } => FsError::NotFound(path),
            MountError::NotATree { path } => FsError::NotADirectory(path),
            err if err.is_not_found() => FsError::NotFound(err.to_string()),
            err => FsError::Mount(err),
        }
    }
}

/// File type as reported to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Directory,
    RegularFile,
}

/// Attributes of one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileAttr {
    pub path: String,
    pub kind: FileType,
    pub perm: u32,
    pub nlink: u32,
    pub size: u64,
    pub uid: u32,
    pub gid: u32,
    /// Access, modification and change time alike.
    pub time: UtcTimestamp,
    pub object: String,
}

/// One name in a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntry {
    pub name: String,
    pub kind: ObjectKind,
}

/// Identifier of an open file.
pub type FileHandle = u64;

/// The filesystem.
#[derive(Debug)]
pub struct GitFs {
    context: RepositoryContext,
    allow_exec: bool,
    open_files: Mutex<HashMap<FileHandle, ObjectHandle>>,
    next_handle: AtomicU64,
}

impl GitFs {
    /// Serve `context`; with `allow_exec`, executable files keep exec bits.
    pub fn new(context: RepositoryContext, allow_exec: bool) -> Self {
        Self {
            context,
            allow_exec,
            open_files: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    pub fn context(&self) -> &RepositoryContext {
        &self.context
    }

    fn attr_of(&self, object: &ObjectHandle) -> Result<FileAttr, FsError> {
        let (kind, perm, nlink) = match object.kind() {
            ObjectKind::Tree => (
                FileType::Directory,
                DIR_PERM,
                u32::try_from(object.entry_count()).unwrap_or(u32::MAX).saturating_add(2),
            ),
            ObjectKind::Blob => {
                let mask = if self.allow_exec { 0o777 } else { 0o666 };
                (FileType::RegularFile, object.mode() & mask, 1)
            }
            ObjectKind::Unknown => return Err(FsError::NotFound(object.path().to_string())),
        };
        Ok(FileAttr {
            path: object.path().to_string(),
            kind,
            perm,
            nlink,
            size: object.size(),
            uid: self.context.uid(),
            gid: self.context.gid(),
            time: object.generation().time().clone(),
            object: object.id().to_string(),
        })
    }

    /// Attributes of `path`.
    pub fn getattr(&self, path: &str) -> Result<FileAttr, FsError> {
        trace!(path, "getattr");
        let object = self.context.get(path)?;
        let attr = self.attr_of(&object);
        object.release();
        attr
    }

    /// Names in the directory `path`, starting with `.` and `..`.
    pub fn readdir(&self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        trace!(path, "readdir");
        let dir = self.context.get(path)?;
        if !dir.is_tree() {
            let err = FsError::NotADirectory(dir.path().to_string());
            dir.release();
            return Err(err);
        }

        let mut listing = Vec::with_capacity(dir.entry_count() + 2);
        for dot in [".", ".."] {
            listing.push(DirEntry {
                name: dot.to_string(),
                kind: ObjectKind::Tree,
            });
        }
        for index in 0..dir.entry_count() {
            let child = match self.context.get_child(&dir, index) {
                Ok(child) => child,
                Err(err) => {
                    warn!(path, index, error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            listing.push(DirEntry {
                name: child.name().to_string(),
                kind: child.kind(),
            });
            child.release();
        }
        dir.release();
        Ok(listing)
    }

    /// Open the file at `path` for reading.
    pub fn open(&self, path: &str) -> Result<FileHandle, FsError> {
        let object = self.context.get(path)?;
        match object.kind() {
            ObjectKind::Blob => {}
            ObjectKind::Tree => {
                let err = FsError::IsADirectory(object.path().to_string());
                object.release();
                return Err(err);
            }
            ObjectKind::Unknown => {
                let err = FsError::NotFound(object.path().to_string());
                object.release();
                return Err(err);
            }
        }
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        trace!(path, handle, "open");
        self.open_files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle, object);
        Ok(handle)
    }

    /// Up to `size` bytes at `offset`; empty at or past the end.
    pub fn read(&self, handle: FileHandle, offset: u64, size: usize) -> Result<Vec<u8>, FsError> {
        let open_files = self.open_files.lock().unwrap_or_else(PoisonError::into_inner);
        let object = open_files.get(&handle).ok_or(FsError::BadHandle(handle))?;
        let bytes = object
            .read_at(offset, size)
            .ok_or_else(|| FsError::IsADirectory(object.path().to_string()))?;
        Ok(bytes.to_vec())
    }

    /// Close `handle`. Returns `true` if that retired a generation.
    pub fn release(&self, handle: FileHandle) -> Result<bool, FsError> {
        let object = self
            .open_files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle)
            .ok_or(FsError::BadHandle(handle))?;
        trace!(handle, "release");
        Ok(object.release())
    }

    /// Number of open files.
    pub fn open_count(&self) -> usize {
        self.open_files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Close every file and stop the context.
    pub fn destroy(&self) {
        let open: Vec<ObjectHandle> = self
            .open_files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, object)| object)
            .collect();
        for object in open {
            object.release();
        }
        self.context.stop();
    }
}
