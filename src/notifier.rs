//! Library change notifications.
//!
//! The pipeline reports catalog changes through this callback surface. All
//! methods default to no-ops so implementors only override what they
//! observe. Callbacks are invoked from worker threads.

use mediatheque_db::models::{Album, AlbumTrack, Artist, Media};

/// Callback surface for catalog changes and pipeline progress.
pub trait LibraryNotifier: Send + Sync {
    fn on_media_created(&self, _media: &Media) {}

    fn on_album_created(&self, _album: &Album) {}

    fn on_album_track_created(&self, _track: &AlbumTrack) {}

    fn on_artist_created(&self, _artist: &Artist) {}

    /// Parsing progress: tasks done out of tasks scheduled. Both counters
    /// reset once the pipeline drains.
    fn on_parsing_stats_updated(&self, _done: u32, _scheduled: u32) {}

    /// The whole pipeline became idle, or picked up work again.
    fn on_idle_changed(&self, _idle: bool) {}
}

/// A notifier that ignores every event.
pub struct NullNotifier;

impl LibraryNotifier for NullNotifier {}
