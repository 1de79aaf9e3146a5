//! Internal Rust models matching the database schema.
//!
//! Strongly-typed projections of catalog rows. The database is the single
//! source of truth; these structs are read-mostly snapshots with explicit
//! id back-references rather than owning pointers, so cyclic relations
//! (album <-> track, show <-> episode) stay acyclic in memory.

use mediatheque_common::{
    AlbumId, AlbumTrackId, ArtistId, DeviceId, FileId, FileType, FolderId, GenreId, MediaId,
    MediaSubType, MediaType, MovieId, PlaylistId, ShowEpisodeId, ShowId, StepMask, TaskId,
    ThumbnailId, ThumbnailOrigin,
};
use serde::{Deserialize, Serialize};

/// One logical item of content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Media {
    pub id: MediaId,
    pub media_type: MediaType,
    pub sub_type: MediaSubType,
    /// Duration in milliseconds; negative means unknown.
    pub duration: i64,
    pub play_count: i64,
    pub last_played_date: Option<i64>,
    /// Last playback that was not injected by a history replay.
    pub real_last_played_date: Option<i64>,
    pub insertion_date: i64,
    pub release_year: Option<i64>,
    pub thumbnail_id: Option<ThumbnailId>,
    pub title: String,
    pub filename: String,
    pub is_favorite: bool,
    /// Cache maintained by triggers on playlist_media_relation.
    pub nb_playlists: i64,
    pub device_id: Option<DeviceId>,
    pub folder_id: Option<FolderId>,
}

/// A physical or external resource backing a media or a playlist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct File {
    pub id: FileId,
    pub media_id: Option<MediaId>,
    pub playlist_id: Option<PlaylistId>,
    pub mrl: String,
    pub file_type: FileType,
    pub last_modification_date: i64,
    pub size: i64,
    pub is_removable: bool,
    pub folder_id: Option<FolderId>,
    pub is_external: bool,
}

/// A directory on a known device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Folder {
    pub id: FolderId,
    pub path: String,
    pub parent_id: Option<FolderId>,
    pub device_id: Option<DeviceId>,
    pub is_removable: bool,
}

/// A storage device / mountpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Device {
    pub id: DeviceId,
    pub uuid: String,
    pub scheme: String,
    pub is_removable: bool,
    pub is_present: bool,
    pub last_seen: i64,
}

/// An album. `title` is NULL for an artist's "unknown album" bucket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Album {
    pub id: AlbumId,
    pub title: Option<String>,
    /// The album artist. Mandatory once tracks exist; may be one of the
    /// sentinel artists.
    pub artist_id: Option<ArtistId>,
    /// NULL when unknown or when tracks carried conflicting years.
    pub release_year: Option<i64>,
    pub thumbnail_id: Option<ThumbnailId>,
    pub nb_tracks: i64,
    pub duration: i64,
}

/// Keys a media into exactly one album.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlbumTrack {
    pub id: AlbumTrackId,
    pub media_id: MediaId,
    pub album_id: AlbumId,
    pub artist_id: ArtistId,
    pub genre_id: Option<GenreId>,
    pub track_number: i64,
    pub disc_number: i64,
    pub duration: i64,
}

/// An artist. `name` is NULL for the two sentinel rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Artist {
    pub id: ArtistId,
    pub name: Option<String>,
    pub thumbnail_id: Option<ThumbnailId>,
    pub nb_tracks: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Genre {
    pub id: GenreId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Show {
    pub id: ShowId,
    pub name: String,
    pub release_date: Option<i64>,
    pub short_summary: Option<String>,
    pub artwork_mrl: Option<String>,
    pub tvdb_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShowEpisode {
    pub id: ShowEpisodeId,
    pub media_id: MediaId,
    pub show_id: ShowId,
    pub episode_number: i64,
    pub season_number: Option<i64>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Movie {
    pub id: MovieId,
    pub media_id: MediaId,
    pub title: String,
}

/// An audio elementary stream of a media.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AudioTrack {
    pub id: i64,
    pub codec: Option<String>,
    pub bitrate: i64,
    pub samplerate: i64,
    pub nb_channels: i64,
    pub language: Option<String>,
    pub description: Option<String>,
    pub media_id: MediaId,
}

/// A video elementary stream of a media.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VideoTrack {
    pub id: i64,
    pub codec: Option<String>,
    pub bitrate: i64,
    pub width: i64,
    pub height: i64,
    pub fps_num: i64,
    pub fps_den: i64,
    pub sar_num: i64,
    pub sar_den: i64,
    pub language: Option<String>,
    pub description: Option<String>,
    pub media_id: MediaId,
}

/// A subtitle stream of a media.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubtitleTrack {
    pub id: i64,
    pub codec: Option<String>,
    pub language: Option<String>,
    pub description: Option<String>,
    pub encoding: Option<String>,
    pub media_id: MediaId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Playlist {
    pub id: PlaylistId,
    pub name: String,
    pub file_id: Option<FileId>,
    pub creation_date: i64,
}

/// A thumbnail row. An empty `mrl` with `is_generated = true` is the
/// sentinel recording a failed generation, so the media is not re-attempted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Thumbnail {
    pub id: ThumbnailId,
    pub mrl: String,
    pub origin: ThumbnailOrigin,
    pub is_generated: bool,
}

/// A persisted parser task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskRow {
    pub id: TaskId,
    /// Bitmask of completed steps. Monotonically non-decreasing.
    pub step_done: StepMask,
    pub retry_count: i64,
    pub mrl: String,
    pub file_id: Option<FileId>,
    pub media_id: Option<MediaId>,
    pub parent_folder_id: FolderId,
    pub parent_playlist_id: Option<PlaylistId>,
    pub parent_playlist_index: Option<i64>,
    pub is_refresh: bool,
}
