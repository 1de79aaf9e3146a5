//! Thumbnailer service.
//!
//! Runs post-analysis on video media only. Asks the external pixel
//! generator for a frame, compresses it to JPEG, and records the result as
//! a Media-origin thumbnail. A failed generation is recorded too, with an
//! empty mrl, so the media is never re-attempted.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use image::codecs::jpeg::JpegEncoder;
use mediatheque_common::{MediaType, Step, ThumbnailOrigin};
use mediatheque_db::pool::{get_conn, DbPool};
use mediatheque_db::queries::thumbnails;

use crate::fs::Mrl;
use crate::parser::task::{Status, Task};
use crate::services::ParserService;

/// Target width of generated thumbnails.
pub const DEFAULT_THUMBNAIL_WIDTH: u32 = 320;

/// JPEG quality of generated thumbnails.
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// How long to wait for the generator to deliver a frame.
pub const FRAME_TIMEOUT: Duration = Duration::from_secs(3);

/// Why the pixel generator failed to deliver a frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThumbnailerError {
    #[error("thumbnail generation failed: {0}")]
    Failed(String),

    #[error("thumbnail generation timed out")]
    Timeout,
}

/// A decoded RGB8 frame, row-major, scaled to the requested width with the
/// height following the source aspect ratio.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// The external pixel generator.
pub trait Thumbnailer: Send + Sync {
    fn frame(
        &self,
        mrl: &Mrl,
        desired_width: u32,
        timeout: Duration,
    ) -> Result<RawFrame, ThumbnailerError>;
}

/// The Thumbnail stage.
pub struct ThumbnailerService {
    pool: DbPool,
    thumbnailer: Arc<dyn Thumbnailer>,
    thumbnail_dir: PathBuf,
    width: u32,
    quality: u8,
}

impl ThumbnailerService {
    pub fn new(pool: DbPool, thumbnailer: Arc<dyn Thumbnailer>, thumbnail_dir: PathBuf) -> Self {
        Self {
            pool,
            thumbnailer,
            thumbnail_dir,
            width: DEFAULT_THUMBNAIL_WIDTH,
            quality: DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn with_dimensions(mut self, width: u32, quality: u8) -> Self {
        self.width = width;
        self.quality = quality;
        self
    }

    fn write_jpeg(&self, frame: &RawFrame, path: &std::path::Path) -> std::io::Result<()> {
        let image = image::RgbImage::from_raw(frame.width, frame.height, frame.data.clone())
            .ok_or_else(|| std::io::Error::other("frame buffer does not match its dimensions"))?;
        let mut file = std::fs::File::create(path)?;
        let encoder = JpegEncoder::new_with_quality(&mut file, self.quality);
        image
            .write_with_encoder(encoder)
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        file.flush()
    }
}

impl ParserService for ThumbnailerService {
    fn name(&self) -> &'static str {
        "Thumbnailer"
    }

    fn target_step(&self) -> Step {
        Step::Thumbnail
    }

    fn nb_threads(&self) -> u8 {
        // The generator wraps a stateful native decoder.
        1
    }

    fn run(&self, task: &mut Task) -> Status {
        let Some(media_row) = task.media.clone() else {
            return Status::Fatal;
        };
        // Only video media get a generated thumbnail.
        if media_row.media_type != MediaType::Video {
            return Status::Success;
        }

        let conn = match get_conn(&self.pool) {
            Ok(conn) => conn,
            Err(_) => return Status::Error,
        };

        // A previous attempt, successful or not, is never redone.
        match thumbnails::for_media(&conn, media_row.id) {
            Ok(Some(existing)) if existing.is_generated => return Status::Success,
            Ok(_) => {}
            Err(_) => return Status::Error,
        }

        let mrl = task.item.mrl().clone();
        match self.thumbnailer.frame(&mrl, self.width, FRAME_TIMEOUT) {
            Ok(frame) => {
                if let Err(e) = std::fs::create_dir_all(&self.thumbnail_dir) {
                    tracing::error!("Cannot create thumbnail directory: {}", e);
                    return Status::Error;
                }
                let dest = self.thumbnail_dir.join(format!("{}.jpg", media_row.id));
                if let Err(e) = self.write_jpeg(&frame, &dest) {
                    tracing::error!("Failed to store thumbnail for {}: {}", mrl, e);
                    return self.record_failure(&conn, &media_row);
                }
                let dest_mrl = format!("file://{}", dest.display());
                match thumbnails::set_media_thumbnail(
                    &conn,
                    media_row.id,
                    &dest_mrl,
                    ThumbnailOrigin::Media,
                    true,
                ) {
                    Ok(_) => Status::Success,
                    Err(_) => Status::Error,
                }
            }
            Err(e) => {
                tracing::warn!("Thumbnail generation failed for {}: {}", mrl, e);
                self.record_failure(&conn, &media_row)
            }
        }
    }
}

impl ThumbnailerService {
    /// Store the empty-mrl sentinel so this media is not re-attempted.
    fn record_failure(
        &self,
        conn: &rusqlite::Connection,
        media_row: &mediatheque_db::models::Media,
    ) -> Status {
        match thumbnails::set_media_thumbnail(conn, media_row.id, "", ThumbnailOrigin::Media, true)
        {
            Ok(_) => Status::Success,
            Err(_) => Status::Error,
        }
    }
}
