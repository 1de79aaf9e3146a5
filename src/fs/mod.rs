//! Filesystem seams.
//!
//! The pipeline consumes mrls produced by an external discoverer and only
//! needs a thin view of the filesystem: which factory claims a scheme,
//! whether an mrl is a directory, and the device mountpoint backing it.
//! Real factories live outside this crate; tests provide mocks.

mod mrl;

pub use mrl::Mrl;

use mediatheque_common::{FolderId, PlaylistId, Result};

/// Maps a scheme to filesystem handles. One factory per scheme family
/// (`file://`, `smb://`, ...).
pub trait FsFactory: Send + Sync {
    /// Whether this factory handles the mrl's scheme.
    fn accepts(&self, mrl: &Mrl) -> bool;

    /// Whether the mrl denotes a directory.
    fn is_directory(&self, mrl: &Mrl) -> Result<bool>;

    /// The mountpoint of the device holding the mrl, if known.
    fn device_mountpoint(&self, mrl: &Mrl) -> Option<Mrl>;
}

/// Restricts a secondary discovery to a single path, so ingesting one
/// playlist element does not rescan the whole entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathProbe {
    /// The scheme-less path the discovery is allowed to visit.
    pub path: String,
    pub is_directory: bool,
    /// The playlist the discovered media must be attached to.
    pub playlist_id: Option<PlaylistId>,
    /// 1-based position within that playlist.
    pub playlist_index: Option<i64>,
    /// The folder the discovery starts under, when already known.
    pub parent_folder_id: Option<FolderId>,
}

/// Hooks into the external filesystem discoverer.
pub trait Discoverer: Send + Sync {
    /// Scan a new entry point.
    fn discover(&self, entry_point: &Mrl, probe: Option<PathProbe>);

    /// Re-scan a known entry point.
    fn reload(&self, entry_point: &Mrl, probe: Option<PathProbe>);
}
