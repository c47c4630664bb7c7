//! fs::fuse
//!
//! Kernel mount of a [`GitFs`] through `fuser`.
//!
//! The adapter only translates: inode numbers to paths through an
//! [`InodeTable`], [`FsError`]s to errno replies, and [`FileAttr`]s to the
//! kernel's attribute record. Everything else happens in [`GitFs`].

use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

use fuser::{
    MountOption, ReplyAttr, ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen,
    Request,
};
use tracing::{debug, trace};

use super::inode::InodeTable;
use super::{FileAttr, FileType, FsError, GitFs};
use crate::core::types::{ObjectKind, RepoPath};

/// Attribute lifetime for a tree that cannot move.
const FIXED_TTL: Duration = Duration::from_secs(60);

const BLOCK_SIZE: u32 = 512;

/// `fuser` filesystem serving a [`GitFs`].
#[derive(Debug)]
pub struct GitFuse {
    fs: GitFs,
    inodes: InodeTable,
    ttl: Duration,
}

impl GitFuse {
    pub fn new(fs: GitFs) -> Self {
        // a moving tree must be re-asked on every access
        let ttl = if fs.context().is_monitored() {
            Duration::ZERO
        } else {
            FIXED_TTL
        };
        Self {
            fs,
            inodes: InodeTable::new(),
            ttl,
        }
    }

    fn path(&self, inode: u64) -> Result<RepoPath, FsError> {
        self.inodes
            .path(inode)
            .cloned()
            .ok_or_else(|| FsError::NotFound(format!("inode {}", inode)))
    }

    fn getattr_path(&self, inode: u64, path: &RepoPath) -> Result<fuser::FileAttr, FsError> {
        let attr = self.fs.getattr(path.as_str())?;
        Ok(kernel_attr(inode, &attr))
    }
}

/// Serve `fs` read-only at `mountpoint` until it is unmounted.
pub fn mount(fs: GitFs, mountpoint: &Path) -> std::io::Result<()> {
    let options = [
        MountOption::RO,
        MountOption::FSName("gitmod".to_string()),
        MountOption::Subtype("gitmod".to_string()),
        MountOption::DefaultPermissions,
    ];
    fuser::mount2(GitFuse::new(fs), mountpoint, &options)
}

/// The kernel's attribute record for `attr`.
pub fn kernel_attr(inode: u64, attr: &FileAttr) -> fuser::FileAttr {
    let time = attr.time.to_system_time();
    fuser::FileAttr {
        ino: inode,
        size: attr.size,
        blocks: attr.size.div_ceil(u64::from(BLOCK_SIZE)),
        atime: time,
        mtime: time,
        ctime: time,
        crtime: time,
        kind: kernel_type(attr.kind),
        perm: (attr.perm & 0o7777) as u16,
        nlink: attr.nlink,
        uid: attr.uid,
        gid: attr.gid,
        rdev: 0,
        blksize: BLOCK_SIZE,
        flags: 0,
    }
}

fn kernel_type(kind: FileType) -> fuser::FileType {
    match kind {
        FileType::Directory => fuser::FileType::Directory,
        FileType::RegularFile => fuser::FileType::RegularFile,
    }
}

fn listing_type(kind: ObjectKind) -> fuser::FileType {
    match kind {
        ObjectKind::Tree => fuser::FileType::Directory,
        ObjectKind::Blob | ObjectKind::Unknown => fuser::FileType::RegularFile,
    }
}

impl fuser::Filesystem for GitFuse {
    fn destroy(&mut self) {
        debug!(inodes = self.inodes.len(), "unmounting");
        self.fs.destroy();
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        // listed names are always UTF-8
        let Some(name) = name.to_str() else {
            reply.error(libc::ENOENT);
            return;
        };
        let Some((inode, path)) = self.inodes.child(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.getattr_path(inode, &path) {
            Ok(attr) => reply.entry(&self.ttl, &attr, 0),
            Err(err) => reply.error(err.errno()),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        match self.path(ino).and_then(|path| self.getattr_path(ino, &path)) {
            Ok(attr) => reply.attr(&self.ttl, &attr),
            Err(err) => reply.error(err.errno()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let listing = match self.path(ino).and_then(|path| self.fs.readdir(path.as_str())) {
            Ok(listing) => listing,
            Err(err) => {
                reply.error(err.errno());
                return;
            }
        };
        let skip = usize::try_from(offset).unwrap_or(0);
        for (index, entry) in listing.into_iter().enumerate().skip(skip) {
            let inode = match entry.name.as_str() {
                "." => Some(ino),
                ".." => self.inodes.parent(ino),
                name => self.inodes.child(ino, name).map(|(inode, _)| inode),
            };
            let Some(inode) = inode else {
                continue;
            };
            // the offset handed back is where the next call resumes
            if reply.add(inode, index as i64 + 1, listing_type(entry.kind), &entry.name) {
                break;
            }
        }
        reply.ok();
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        if flags & libc::O_ACCMODE != libc::O_RDONLY {
            reply.error(libc::EROFS);
            return;
        }
        match self.path(ino).and_then(|path| self.fs.open(path.as_str())) {
            Ok(handle) => reply.opened(handle, 0),
            Err(err) => reply.error(err.errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let offset = u64::try_from(offset).unwrap_or(0);
        match self.fs.read(fh, offset, size as usize) {
            Ok(bytes) => reply.data(&bytes),
            Err(err) => reply.error(err.errno()),
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        match self.fs.release(fh) {
            Ok(retired) => {
                trace!(handle = fh, retired, "released");
                reply.ok();
            }
            Err(err) => reply.error(err.errno()),
        }
    }
}
