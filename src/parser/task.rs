//! Parser tasks and their in-flight content.
//!
//! A task wraps one persisted task row plus the `Item` the extraction
//! service fills. Only the worker currently holding a task mutates it.

use std::collections::HashMap;

use mediatheque_common::{FolderId, PlaylistId, Result, Step, StepMask, TaskId, TrackKind};
use mediatheque_db::models::{File, Media, TaskRow};
use mediatheque_db::queries::{files, media, tasks};
use rusqlite::Connection;

use crate::fs::Mrl;

/// Outcome of running one service step on a task. The only status type
/// propagated through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The step is done; persist the bit and advance.
    Success,
    /// The whole task finished before all steps ran (e.g. a playlist).
    Completed,
    /// Transient failure; the operation may succeed next time.
    Error,
    /// The backing device or network is gone; defer until it returns.
    TemporaryUnavailable,
    /// The task will never succeed; stop re-queueing it.
    Fatal,
    /// The task is invalid (orphan file); its row was deleted.
    Discarded,
}

/// Scalar tags the extraction service can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Meta {
    Title,
    ArtworkUrl,
    ShowName,
    Episode,
    Album,
    Genre,
    Date,
    AlbumArtist,
    Artist,
    TrackNumber,
    DiscNumber,
    DiscTotal,
}

/// One elementary stream reported by the extraction service.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Codec fourcc.
    pub codec: String,
    pub bitrate: i64,
    pub language: String,
    pub description: String,
    pub details: TrackDetails,
}

/// Per-kind stream fields.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackDetails {
    Audio {
        nb_channels: i64,
        sample_rate: i64,
    },
    Video {
        width: i64,
        height: i64,
        fps_num: i64,
        fps_den: i64,
        sar_num: i64,
        sar_den: i64,
    },
    Subtitle {
        encoding: String,
    },
}

impl Track {
    pub fn kind(&self) -> TrackKind {
        match self.details {
            TrackDetails::Audio { .. } => TrackKind::Audio,
            TrackDetails::Video { .. } => TrackKind::Video,
            TrackDetails::Subtitle { .. } => TrackKind::Subtitle,
        }
    }
}

/// The in-flight representation of a task's parsed content: tags, typed
/// tracks, and sub-items for playlists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Item {
    mrl: Mrl,
    duration: i64,
    meta: HashMap<Meta, String>,
    tracks: Vec<Track>,
    sub_items: Vec<Item>,
}

impl Item {
    pub fn new(mrl: Mrl) -> Self {
        Self {
            mrl,
            duration: -1,
            ..Default::default()
        }
    }

    pub fn mrl(&self) -> &Mrl {
        &self.mrl
    }

    pub fn duration(&self) -> i64 {
        self.duration
    }

    pub fn set_duration(&mut self, duration: i64) {
        self.duration = duration;
    }

    /// A scalar tag, if the extraction reported a non-empty value.
    pub fn meta(&self, meta: Meta) -> Option<&str> {
        self.meta.get(&meta).map(String::as_str)
    }

    /// Store a scalar tag. Empty values are treated as absent.
    pub fn set_meta<S: Into<String>>(&mut self, meta: Meta, value: S) {
        let value = value.into();
        if value.is_empty() {
            self.meta.remove(&meta);
        } else {
            self.meta.insert(meta, value);
        }
    }

    /// A tag parsed as an integer. A leading integer prefix counts, so the
    /// common combined form "2/3" reads as disc 2 of 3; values with no
    /// leading digits count as 0.
    pub fn int_meta(&self, meta: Meta) -> i64 {
        let Some(raw) = self.meta(meta) else {
            return 0;
        };
        let trimmed = raw.trim_start();
        let digits_end = trimmed
            .char_indices()
            .take_while(|&(i, c)| c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+')))
            .last()
            .map(|(i, _)| i + 1)
            .unwrap_or(0);
        trimmed[..digits_end].parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid integer tag {:?}: {:?}", meta, raw);
            0
        })
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn add_track(&mut self, track: Track) {
        self.tracks.push(track);
    }

    pub fn sub_items(&self) -> &[Item] {
        &self.sub_items
    }

    /// Append a sub-item (a playlist element). Sub-items are 1-indexed in
    /// playlist order.
    pub fn add_sub_item(&mut self, item: Item) {
        self.sub_items.push(item);
    }
}

/// One unit of pipeline work over a single filesystem item.
#[derive(Debug, Clone)]
pub struct Task {
    id: TaskId,
    step_done: StepMask,
    retry_count: i64,
    pub item: Item,
    pub file: Option<File>,
    pub media: Option<Media>,
    pub parent_folder_id: FolderId,
    pub parent_playlist_id: Option<PlaylistId>,
    pub parent_playlist_index: Option<i64>,
    pub is_refresh: bool,
}

impl Task {
    /// Rebuild a task from its persisted row.
    pub fn from_row(row: TaskRow) -> Self {
        Self {
            id: row.id,
            step_done: row.step_done,
            retry_count: row.retry_count,
            item: Item::new(Mrl::new(row.mrl)),
            file: None,
            media: None,
            parent_folder_id: row.parent_folder_id,
            parent_playlist_id: row.parent_playlist_id,
            parent_playlist_index: row.parent_playlist_index,
            is_refresh: row.is_refresh,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn step_done(&self) -> StepMask {
        self.step_done
    }

    pub fn retry_count(&self) -> i64 {
        self.retry_count
    }

    pub fn is_step_completed(&self, step: Step) -> bool {
        self.step_done.contains(step)
    }

    /// Set a step bit in memory. Persisted separately by `save_steps`.
    pub fn mark_step_completed(&mut self, step: Step) {
        self.step_done = self.step_done.with(step);
    }

    /// Durably persist the current step bitmask.
    pub fn save_steps(&self, conn: &Connection) -> Result<()> {
        tasks::save_steps(conn, self.id, self.step_done)
    }

    /// Increment the retry counter before running a step, durably.
    pub fn start_step(&mut self, conn: &Connection) -> Result<()> {
        self.retry_count = tasks::start_step(conn, self.id)?;
        Ok(())
    }

    /// Refund one retry, floored at zero.
    pub fn decrement_retry(&mut self, conn: &Connection) -> Result<()> {
        self.retry_count = tasks::decrement_retry(conn, self.id)?;
        Ok(())
    }

    /// Reload the file/media rows referenced by a restored task. Returns
    /// false when a referenced row disappeared, in which case the task
    /// should not be resumed.
    pub fn restore_linked_entities(&mut self, conn: &Connection, row: &TaskRow) -> Result<bool> {
        if let Some(file_id) = row.file_id {
            match files::get(conn, file_id) {
                Ok(file) => self.file = Some(file),
                Err(e) if matches!(e, mediatheque_common::Error::NotFound(_)) => {
                    return Ok(false)
                }
                Err(e) => return Err(e),
            }
        }
        if let Some(media_id) = row.media_id {
            match media::get(conn, media_id) {
                Ok(m) => self.media = Some(m),
                Err(e) if matches!(e, mediatheque_common::Error::NotFound(_)) => {
                    return Ok(false)
                }
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_meta_handling() {
        let mut item = Item::new(Mrl::new("file:///music/a.flac"));
        assert_eq!(item.meta(Meta::Title), None);

        item.set_meta(Meta::Title, "Blue in Green");
        assert_eq!(item.meta(Meta::Title), Some("Blue in Green"));

        // Empty values are treated as absent.
        item.set_meta(Meta::Title, "");
        assert_eq!(item.meta(Meta::Title), None);
    }

    #[test]
    fn test_int_meta_parses_leading_digits() {
        let mut item = Item::new(Mrl::new("file:///music/a.flac"));
        item.set_meta(Meta::TrackNumber, "7");
        item.set_meta(Meta::DiscNumber, "2/3");
        item.set_meta(Meta::Episode, " 12 ");
        item.set_meta(Meta::Date, "-4");
        item.set_meta(Meta::Genre, "Post-Rock");

        assert_eq!(item.int_meta(Meta::TrackNumber), 7);
        // The combined disc form keeps its leading number.
        assert_eq!(item.int_meta(Meta::DiscNumber), 2);
        assert_eq!(item.int_meta(Meta::Episode), 12);
        assert_eq!(item.int_meta(Meta::Date), -4);
        // No leading digits at all.
        assert_eq!(item.int_meta(Meta::Genre), 0);
        assert_eq!(item.int_meta(Meta::DiscTotal), 0);
    }

    #[test]
    fn test_track_kind() {
        let track = Track {
            codec: "h264".to_string(),
            bitrate: 0,
            language: String::new(),
            description: String::new(),
            details: TrackDetails::Video {
                width: 1920,
                height: 1080,
                fps_num: 25,
                fps_den: 1,
                sar_num: 1,
                sar_den: 1,
            },
        };
        assert_eq!(track.kind(), TrackKind::Video);
    }

    #[test]
    fn test_task_step_accounting_in_memory() {
        let row = TaskRow {
            id: TaskId::new(1),
            step_done: StepMask::NONE,
            retry_count: 0,
            mrl: "file:///music/a.flac".to_string(),
            file_id: None,
            media_id: None,
            parent_folder_id: FolderId::new(1),
            parent_playlist_id: None,
            parent_playlist_index: None,
            is_refresh: false,
        };
        let mut task = Task::from_row(row);

        assert!(!task.is_step_completed(Step::MetadataExtraction));
        task.mark_step_completed(Step::MetadataExtraction);
        assert!(task.is_step_completed(Step::MetadataExtraction));
        assert_eq!(task.item.mrl().as_str(), "file:///music/a.flac");
    }
}
