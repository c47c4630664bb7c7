//! mount::resolver
//!
//! Classify what a tracked name resolves to and extract its snapshot.
//!
//! | Resolved object            | Tree used       | Time                 |
//! |----------------------------|-----------------|----------------------|
//! | tree                       | itself          | wall clock           |
//! | commit                     | its tree        | commit time          |
//! | tag pointing at a commit   | commit's tree   | commit time          |
//! | anything else              | rejected        |                      |

use serde::Serialize;

use crate::core::types::{Oid, UtcTimestamp};
use crate::store::{ObjectStore, RevisionObject};

use super::MountError;

/// How the tracked name resolved the first time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    /// A raw tree.
    Tree,
    /// A commit (branch, revision expression, commit id).
    Commit,
    /// An annotated tag of a commit.
    Tag,
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReferenceKind::Tree => "tree",
            ReferenceKind::Commit => "commit",
            ReferenceKind::Tag => "tag",
        };
        write!(f, "{}", s)
    }
}

/// A concrete tree plus the time it is presented with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub tree: Oid,
    pub time: UtcTimestamp,
}

/// Turn a parsed object into a snapshot.
///
/// `now` supplies the time of raw trees. Errors carry a message only; the
/// caller knows the reference name.
pub fn classify(
    object: RevisionObject,
    now: impl FnOnce() -> UtcTimestamp,
) -> Result<(ReferenceKind, Snapshot), String> {
    match object {
        RevisionObject::Tree { id } => Ok((ReferenceKind::Tree, Snapshot { tree: id, time: now() })),
        RevisionObject::Commit { tree, time, .. } => Ok((ReferenceKind::Commit, Snapshot { tree, time })),
        RevisionObject::Tag { target, .. } => match *target {
            RevisionObject::Commit { tree, time, .. } => Ok((ReferenceKind::Tag, Snapshot { tree, time })),
            other => Err(format!(
                "tag points at a {}, expected a commit",
                other.kind_name()
            )),
        },
        RevisionObject::Other { kind, .. } => Err(format!(
            "{} does not address a usable snapshot",
            kind
        )),
    }
}

/// Resolve `reference` against `store`.
///
/// # Errors
///
/// [`MountError::ReferenceResolution`] if the name does not parse or
/// classifies as unusable.
pub fn resolve_reference(
    store: &dyn ObjectStore,
    reference: &str,
) -> Result<(ReferenceKind, Snapshot), MountError> {
    let failed = |message: String| MountError::ReferenceResolution {
        reference: reference.to_string(),
        message,
    };
    let object = store.revparse(reference).map_err(|e| failed(e.to_string()))?;
    classify(object, UtcTimestamp::now).map_err(failed)
}
