//! Mediatheque: a local media library.
//!
//! A persistent catalog of audio/video files discovered on local and
//! removable storage, enriched with metadata and linked into an
//! album/artist/show graph. This crate hosts the ingestion pipeline: a
//! multi-stage worker system that turns raw filesystem discoveries into a
//! normalized relational catalog.
//!
//! Filesystem discovery, the decoding backend, and thumbnail pixel
//! generation are external collaborators, plugged in through the
//! [`fs::Discoverer`], [`services::prober::MediaProber`], and
//! [`services::thumbnailer::Thumbnailer`] traits.

pub mod config;
pub mod fs;
pub mod notifier;
pub mod parser;
pub mod services;

use std::sync::Arc;

use mediatheque_common::{Error, FolderId, PlaylistId, Result};
use mediatheque_db::pool::{get_conn, init_memory_pool, init_pool, DbPool};
use mediatheque_db::queries::{devices, tasks};

use crate::config::LibraryConfig;
use crate::fs::{Discoverer, FsFactory, Mrl};
use crate::notifier::{LibraryNotifier, NullNotifier};
use crate::parser::task::Task;
use crate::parser::Parser;
use crate::services::analyzer::MetadataAnalyzer;
use crate::services::prober::{MediaProber, ProberService};
use crate::services::thumbnailer::{Thumbnailer, ThumbnailerService};

/// Assembles a [`MediaLibrary`] from its external collaborators.
pub struct MediaLibraryBuilder {
    config: LibraryConfig,
    in_memory: bool,
    notifier: Arc<dyn LibraryNotifier>,
    prober: Option<Arc<dyn MediaProber>>,
    thumbnailer: Option<Arc<dyn Thumbnailer>>,
    fs_factories: Vec<Arc<dyn FsFactory>>,
    discoverer: Option<Arc<dyn Discoverer>>,
}

impl MediaLibraryBuilder {
    pub fn new(config: LibraryConfig) -> Self {
        Self {
            config,
            in_memory: false,
            notifier: Arc::new(NullNotifier),
            prober: None,
            thumbnailer: None,
            fs_factories: Vec::new(),
            discoverer: None,
        }
    }

    /// Use an in-memory catalog. The database is lost on drop.
    pub fn in_memory(mut self) -> Self {
        self.in_memory = true;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn LibraryNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// The decoding backend. Mandatory.
    pub fn prober(mut self, prober: Arc<dyn MediaProber>) -> Self {
        self.prober = Some(prober);
        self
    }

    /// The pixel generator. Without one, the thumbnail stage is skipped
    /// entirely and tasks complete after analysis.
    pub fn thumbnailer(mut self, thumbnailer: Arc<dyn Thumbnailer>) -> Self {
        self.thumbnailer = Some(thumbnailer);
        self
    }

    pub fn fs_factory(mut self, factory: Arc<dyn FsFactory>) -> Self {
        self.fs_factories.push(factory);
        self
    }

    pub fn discoverer(mut self, discoverer: Arc<dyn Discoverer>) -> Self {
        self.discoverer = Some(discoverer);
        self
    }

    pub fn build(self) -> Result<MediaLibrary> {
        let prober = self
            .prober
            .ok_or_else(|| Error::invalid_input("a media prober is required"))?;

        let pool = if self.in_memory {
            init_memory_pool()?
        } else {
            init_pool(&self.config.database_path.to_string_lossy())?
        };

        let parser = Parser::new(pool.clone(), self.notifier.clone());
        parser.add_service(Arc::new(ProberService::new(prober)))?;
        parser.add_service(Arc::new(MetadataAnalyzer::new(
            pool.clone(),
            self.notifier.clone(),
            self.fs_factories.clone(),
            self.discoverer.clone(),
        )))?;
        if let Some(thumbnailer) = self.thumbnailer {
            parser.add_service(Arc::new(
                ThumbnailerService::new(
                    pool.clone(),
                    thumbnailer,
                    self.config.thumbnail_dir.clone(),
                )
                .with_dimensions(self.config.thumbnail_width, self.config.thumbnail_quality),
            ))?;
        }

        Ok(MediaLibrary {
            pool,
            notifier: self.notifier,
            parser,
        })
    }
}

/// The media library: catalog plus ingestion pipeline.
pub struct MediaLibrary {
    pool: DbPool,
    notifier: Arc<dyn LibraryNotifier>,
    parser: Parser,
}

impl MediaLibrary {
    pub fn builder(config: LibraryConfig) -> MediaLibraryBuilder {
        MediaLibraryBuilder::new(config)
    }

    /// Resume any pipeline work left over from a previous run.
    pub fn start(&self) {
        self.parser.start();
    }

    /// The catalog connection pool, for queries outside the pipeline.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn notifier(&self) -> &Arc<dyn LibraryNotifier> {
        &self.notifier
    }

    /// Entry point for the filesystem discoverer: enqueue one discovered
    /// file for ingestion.
    pub fn add_discovered_file(
        &self,
        mrl: &Mrl,
        parent_folder: FolderId,
        is_refresh: bool,
    ) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        let row = tasks::create(
            &conn,
            mrl.as_str(),
            None,
            None,
            parent_folder,
            None,
            None,
            is_refresh,
        )?;
        drop(conn);
        self.parser.parse(Task::from_row(row));
        Ok(())
    }

    /// Entry point for restricted playlist discoveries: enqueue a file that
    /// belongs to a playlist at a given 1-based position.
    pub fn add_discovered_playlist_entry(
        &self,
        mrl: &Mrl,
        parent_folder: FolderId,
        playlist: PlaylistId,
        index: i64,
    ) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        let row = tasks::create(
            &conn,
            mrl.as_str(),
            None,
            None,
            parent_folder,
            Some(playlist),
            Some(index),
            false,
        )?;
        drop(conn);
        self.parser.parse(Task::from_row(row));
        Ok(())
    }

    /// A device was mounted: mark it present and resume deferred tasks.
    pub fn on_device_plugged(&self, uuid: &str) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        devices::set_present(&conn, uuid, true)?;
        drop(conn);
        self.parser.restart();
        Ok(())
    }

    /// A device was unplugged: its media stay in the catalog but are
    /// hidden, and its in-flight tasks will report TemporaryUnavailable.
    pub fn on_device_unplugged(&self, uuid: &str) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        devices::set_present(&conn, uuid, false)
    }

    /// Whether every worker pool is idle.
    pub fn is_idle(&self) -> bool {
        self.parser.is_idle()
    }

    pub fn pause(&self) {
        self.parser.pause();
    }

    pub fn resume(&self) {
        self.parser.resume();
    }

    /// Drain and drop all queued pipeline work.
    pub fn flush(&self) {
        self.parser.flush();
    }

    /// Stop the pipeline. Tasks currently executing run to completion and
    /// their results are still persisted.
    pub fn stop(&self) {
        self.parser.stop();
    }
}
