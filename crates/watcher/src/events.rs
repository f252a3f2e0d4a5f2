//! Event types and path state records
//!
//! This module defines the vocabulary of the watcher: raw notifications as
//! delivered by the notification primitive, the semantic events delivered to
//! callers, and the per-path existence snapshots the classifier tracks
//! between deliveries.

#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::time::Instant;

/// The kind of a semantic event delivered to a watch callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticKind {
    /// A new entry appeared under a watched directory
    Create,
    /// A watched path's content or metadata changed in place
    Change,
    /// A watched path no longer exists
    Remove,
    /// A watched file's path now points at a different underlying file
    /// (rename-over-target)
    Replace,
}

impl SemanticKind {
    /// Stable lowercase name, matching the serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Change => "change",
            Self::Remove => "remove",
            Self::Replace => "replace",
        }
    }
}

impl fmt::Display for SemanticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized event delivered to a watch callback
///
/// `watched_path` is the path the caller registered; `affected_path` is the
/// specific path that changed. The two are equal for file-level watches and
/// for directory-level events that could not be attributed to a descendant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticEvent {
    pub kind: SemanticKind,
    pub watched_path: PathBuf,
    pub affected_path: PathBuf,
}

impl SemanticEvent {
    pub fn new(kind: SemanticKind, watched_path: PathBuf, affected_path: PathBuf) -> Self {
        Self {
            kind,
            watched_path,
            affected_path,
        }
    }
}

/// Raw notification class, as reported by the notification primitive
///
/// Platforms conflate many operations under these two codes; the classifier
/// resolves the ambiguity with existence probes rather than trusting them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawKind {
    /// Content or metadata changed
    Data,
    /// Name or existence changed (create, remove, rename)
    Name,
}

/// A single raw notification from the primitive, consumed within one
/// coalescing cycle
#[derive(Debug, Clone)]
pub struct RawNotification {
    pub kind: RawKind,
    /// Path as reported; may be relative to the subscription root, or
    /// absent entirely on platforms that only say "something changed here"
    pub path: Option<PathBuf>,
}

impl RawNotification {
    pub fn data(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: RawKind::Data,
            path: Some(path.into()),
        }
    }

    pub fn name(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: RawKind::Name,
            path: Some(path.into()),
        }
    }

    pub fn bare(kind: RawKind) -> Self {
        Self { kind, path: None }
    }

    /// Resolve the reported path against the subscription root
    ///
    /// An absent path falls back to the root; a relative one is joined to it.
    pub fn resolve(&self, root: &Path) -> PathBuf {
        match &self.path {
            None => root.to_path_buf(),
            Some(p) if p.as_os_str().is_empty() => root.to_path_buf(),
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => root.join(p),
        }
    }
}

/// Last-known existence and identity of a path, as of the most recent
/// delivered semantic event for it
///
/// Mutated only by the classifier after a delivery; raw notifications never
/// touch it, which is what lets net-zero flicker inside a debounce window be
/// detected and suppressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistenceSnapshot {
    pub exists: bool,
    /// Modification time, when the platform exposes one
    pub modified: Option<SystemTime>,
    /// Inode (or platform file id) as an identity proxy; `None` where
    /// unavailable
    pub file_id: Option<u64>,
    pub last_seen: SystemTime,
}

impl ExistenceSnapshot {
    /// Snapshot for a path known not to exist
    pub fn absent() -> Self {
        Self {
            exists: false,
            modified: None,
            file_id: None,
            last_seen: SystemTime::now(),
        }
    }

    /// Probe the filesystem for the current state of `path`
    ///
    /// A missing path is a successful probe of a non-existent file; any
    /// other I/O failure is returned to the caller for retry handling.
    pub async fn probe(path: &Path, follow_symlinks: bool) -> std::io::Result<Self> {
        let meta = if follow_symlinks {
            tokio::fs::metadata(path).await
        } else {
            tokio::fs::symlink_metadata(path).await
        };

        match meta {
            Ok(meta) => Ok(Self::from_metadata(&meta)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::absent()),
            Err(e) => Err(e),
        }
    }

    /// Build a snapshot from metadata already in hand (registration-time
    /// seeding walks the tree once and reuses each entry's metadata)
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        Self {
            exists: true,
            modified: meta.modified().ok(),
            file_id: file_id_of(meta),
            last_seen: SystemTime::now(),
        }
    }

    /// Whether two snapshots plausibly describe the same underlying file
    ///
    /// With file ids on both sides this is exact; otherwise existence
    /// agreement is the best available proxy.
    pub fn same_identity(&self, other: &Self) -> bool {
        match (self.file_id, other.file_id) {
            (Some(a), Some(b)) => a == b,
            _ => self.exists == other.exists,
        }
    }

    /// Whether a fresh probe shows no observable transition from this
    /// snapshot
    pub fn matches(&self, probed: &Self) -> bool {
        self.exists == probed.exists
            && self.modified == probed.modified
            && self.file_id == probed.file_id
    }
}

#[cfg(unix)]
fn file_id_of(meta: &std::fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(meta.ino())
}

#[cfg(not(unix))]
fn file_id_of(_meta: &std::fs::Metadata) -> Option<u64> {
    None
}

/// Raw notifications accumulated for one path during a debounce window
///
/// Individual notifications are not kept; classification only needs the
/// burst's shape — how many arrived, and whether any carried a name-class
/// code.
#[derive(Debug, Clone)]
pub struct PendingBurst {
    pub first_seen: Instant,
    pub last_extended: Instant,
    pub occurrence_count: u32,
    pub saw_name_code: bool,
}

impl PendingBurst {
    pub fn new(kind: RawKind) -> Self {
        let now = Instant::now();
        Self {
            first_seen: now,
            last_extended: now,
            occurrence_count: 1,
            saw_name_code: kind == RawKind::Name,
        }
    }

    /// Fold another raw notification into the burst, extending the window
    pub fn absorb(&mut self, kind: RawKind) {
        self.last_extended = Instant::now();
        self.occurrence_count += 1;
        self.saw_name_code |= kind == RawKind::Name;
    }

    /// Whether the path has been quiet for a full debounce window
    pub fn quiesced(&self, window: Duration) -> bool {
        self.last_extended.elapsed() >= window
    }
}
