//! Typed ID wrappers for type safety across mediatheque.
//!
//! Every catalog entity is identified by the 64-bit rowid SQLite assigned on
//! insert. The newtypes prevent mixing identifiers of different entities
//! (e.g. using a `MediaId` where an `AlbumId` is expected).

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw database rowid.
            #[must_use]
            pub fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// The raw rowid value.
            #[must_use]
            pub fn raw(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a media entry.
    MediaId
);
define_id!(
    /// Unique identifier for a file backing a media.
    FileId
);
define_id!(
    /// Unique identifier for a folder.
    FolderId
);
define_id!(
    /// Unique identifier for a storage device.
    DeviceId
);
define_id!(
    /// Unique identifier for an album.
    AlbumId
);
define_id!(
    /// Unique identifier for an album track.
    AlbumTrackId
);
define_id!(
    /// Unique identifier for an artist.
    ArtistId
);
define_id!(
    /// Unique identifier for a genre.
    GenreId
);
define_id!(
    /// Unique identifier for a show.
    ShowId
);
define_id!(
    /// Unique identifier for a show episode.
    ShowEpisodeId
);
define_id!(
    /// Unique identifier for a movie.
    MovieId
);
define_id!(
    /// Unique identifier for a playlist.
    PlaylistId
);
define_id!(
    /// Unique identifier for a thumbnail.
    ThumbnailId
);
define_id!(
    /// Unique identifier for a parser task.
    TaskId
);

/// Reserved artist row for media without any artist tag.
pub const UNKNOWN_ARTIST_ID: ArtistId = ArtistId(1);

/// Reserved artist row for compilation albums.
pub const VARIOUS_ARTISTS_ID: ArtistId = ArtistId(2);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_round_trip() {
        let id = MediaId::new(42);
        assert_eq!(id.raw(), 42);
        assert_eq!(i64::from(id), 42);
        assert_eq!(MediaId::from(42), id);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_serde_transparent() {
        let id = AlbumId::new(7);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "7");
        let back: AlbumId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_sentinel_ids() {
        assert_eq!(UNKNOWN_ARTIST_ID.raw(), 1);
        assert_eq!(VARIOUS_ARTISTS_ID.raw(), 2);
        assert_ne!(UNKNOWN_ARTIST_ID, VARIOUS_ARTISTS_ID);
    }
}
