//! Core type definitions for the media catalog.
//!
//! Enums used throughout mediatheque for classifying media, files,
//! thumbnails, and streams. All enums are stored in the database as their
//! lowercase string form.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type of a media entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// The media has not been analyzed yet, or its type could not be
    /// determined.
    Unknown,
    /// Video media.
    Video,
    /// Audio media.
    Audio,
    /// Media added manually rather than discovered, e.g. a playlist entry
    /// pointing outside every known filesystem. Never analyzed.
    External,
    /// A network stream. A specific kind of external media.
    Stream,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
            Self::External => write!(f, "external"),
            Self::Stream => write!(f, "stream"),
        }
    }
}

impl std::str::FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(Self::Unknown),
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            "external" => Ok(Self::External),
            "stream" => Ok(Self::Stream),
            _ => Err(format!("Invalid media type: {}", s)),
        }
    }
}

/// Refinement of a media's type, consistent with the relational row
/// referencing it (an `album_track`, `show_episode`, or `movie` row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaSubType {
    Unknown,
    ShowEpisode,
    Movie,
    AlbumTrack,
}

impl fmt::Display for MediaSubType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::ShowEpisode => write!(f, "showepisode"),
            Self::Movie => write!(f, "movie"),
            Self::AlbumTrack => write!(f, "albumtrack"),
        }
    }
}

impl std::str::FromStr for MediaSubType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(Self::Unknown),
            "showepisode" => Ok(Self::ShowEpisode),
            "movie" => Ok(Self::Movie),
            "albumtrack" => Ok(Self::AlbumTrack),
            _ => Err(format!("Invalid media sub-type: {}", s)),
        }
    }
}

/// Role of a file backing a media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// The main resource of a media. Exactly one Main or Disc file exists
    /// per non-external media.
    Main,
    /// A part of a multi-part media.
    Part,
    /// An external soundtrack.
    Soundtrack,
    /// An external subtitle file.
    Subtitle,
    /// The file a playlist was imported from.
    Playlist,
    /// A disc image acting as the main resource.
    Disc,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => write!(f, "main"),
            Self::Part => write!(f, "part"),
            Self::Soundtrack => write!(f, "soundtrack"),
            Self::Subtitle => write!(f, "subtitle"),
            Self::Playlist => write!(f, "playlist"),
            Self::Disc => write!(f, "disc"),
        }
    }
}

impl std::str::FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" => Ok(Self::Main),
            "part" => Ok(Self::Part),
            "soundtrack" => Ok(Self::Soundtrack),
            "subtitle" => Ok(Self::Subtitle),
            "playlist" => Ok(Self::Playlist),
            "disc" => Ok(Self::Disc),
            _ => Err(format!("Invalid file type: {}", s)),
        }
    }
}

/// Where a thumbnail came from. Determines whether a better-sourced
/// thumbnail may later replace it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailOrigin {
    /// Explicitly set by the user. Never overwritten automatically.
    UserProvided,
    /// Extracted from or generated for the media itself.
    Media,
    /// Taken from the album's artwork.
    Album,
    /// Propagated to an artist from an album they authored.
    AlbumArtist,
    /// Propagated to an artist from an album they only appear on.
    Artist,
}

impl fmt::Display for ThumbnailOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserProvided => write!(f, "user"),
            Self::Media => write!(f, "media"),
            Self::Album => write!(f, "album"),
            Self::AlbumArtist => write!(f, "albumartist"),
            Self::Artist => write!(f, "artist"),
        }
    }
}

impl std::str::FromStr for ThumbnailOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::UserProvided),
            "media" => Ok(Self::Media),
            "album" => Ok(Self::Album),
            "albumartist" => Ok(Self::AlbumArtist),
            "artist" => Ok(Self::Artist),
            _ => Err(format!("Invalid thumbnail origin: {}", s)),
        }
    }
}

/// Kind of an elementary stream within a media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
    Subtitle,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
            Self::Subtitle => write!(f, "subtitle"),
        }
    }
}

/// A unit of work on a parser task. Stored as a bit in the task's
/// `step_done` bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Step {
    MetadataExtraction = 0x01,
    MetadataAnalysis = 0x02,
    Thumbnail = 0x04,
    /// Terminal marker. Set on full completion, and on permanent failure so
    /// the task is ignored on restart.
    Completed = 0x08,
}

/// Bitmask of completed steps. Bits are only ever added, never cleared.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepMask(u8);

impl StepMask {
    pub const NONE: StepMask = StepMask(0);

    #[must_use]
    pub fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn raw(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn contains(self, step: Step) -> bool {
        self.0 & step as u8 != 0
    }

    /// The mask with one more step bit set.
    #[must_use]
    pub fn with(self, step: Step) -> Self {
        Self(self.0 | step as u8)
    }

    /// Whether the terminal Completed bit is set.
    #[must_use]
    pub fn is_completed(self) -> bool {
        self.contains(Step::Completed)
    }

    /// The first pipeline step whose bit is not set yet, if any.
    #[must_use]
    pub fn next_unset(self) -> Option<Step> {
        [Step::MetadataExtraction, Step::MetadataAnalysis, Step::Thumbnail]
            .into_iter()
            .find(|&step| !self.contains(step))
    }
}

/// A task stops being rescheduled once its retry counter reaches this.
pub const MAX_TASK_RETRIES: i64 = 3;

/// Entity a metadata key/value row is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataEntityType {
    Media,
    Album,
    Artist,
    Show,
    Playlist,
}

impl fmt::Display for MetadataEntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Media => write!(f, "media"),
            Self::Album => write!(f, "album"),
            Self::Artist => write!(f, "artist"),
            Self::Show => write!(f, "show"),
            Self::Playlist => write!(f, "playlist"),
        }
    }
}

impl std::str::FromStr for MetadataEntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "media" => Ok(Self::Media),
            "album" => Ok(Self::Album),
            "artist" => Ok(Self::Artist),
            "show" => Ok(Self::Show),
            "playlist" => Ok(Self::Playlist),
            _ => Err(format!("Invalid metadata entity type: {}", s)),
        }
    }
}
