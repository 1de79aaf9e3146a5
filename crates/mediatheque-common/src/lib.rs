//! Mediatheque-common: shared types for the mediatheque workspace.
//!
//! # Modules
//!
//! - `error` - Unified error and result types
//! - `ids` - Typed id newtypes over SQLite rowids
//! - `types` - Catalog enums (media type, file role, thumbnail origin, ...)

pub mod error;
pub mod ids;
pub mod types;

pub use error::{Error, Result};
pub use ids::{
    AlbumId, AlbumTrackId, ArtistId, DeviceId, FileId, FolderId, GenreId, MediaId, MovieId,
    PlaylistId, ShowEpisodeId, ShowId, TaskId, ThumbnailId, UNKNOWN_ARTIST_ID, VARIOUS_ARTISTS_ID,
};
pub use types::{
    FileType, MediaSubType, MediaType, MetadataEntityType, Step, StepMask, ThumbnailOrigin,
    TrackKind, MAX_TASK_RETRIES,
};
