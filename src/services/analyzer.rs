//! Metadata analyzer service.
//!
//! Takes the `Item` filled by the extraction service and integrates it into
//! the relational catalog: media and file rows, stream rows, and the
//! album/artist/genre/show graph. Runs on a single thread so its resolution
//! caches (previous album, sentinel artists) stay trivially consistent.

use std::sync::Arc;

use mediatheque_common::{
    ArtistId, Error, FileType, FolderId, MediaType, Result, Step, ThumbnailOrigin,
    UNKNOWN_ARTIST_ID, VARIOUS_ARTISTS_ID,
};
use mediatheque_db::models::{Album, AlbumTrack, Artist, Genre, Media, Playlist};
use mediatheque_db::pool::{get_conn, map_sqlite_err, with_retries, DbPool};
use mediatheque_db::queries::{
    albums, artists, files, folders, genres, media, playlists, shows, tasks, thumbnails, tracks,
};
use parking_lot::Mutex;
use rusqlite::Connection;

use crate::fs::{Discoverer, FsFactory, Mrl, PathProbe};
use crate::notifier::LibraryNotifier;
use crate::parser::task::{Item, Meta, Status, Task, TrackDetails};
use crate::services::ParserService;

/// Busy-retry budget for the analyzer's write transactions.
const NB_WRITE_RETRIES: u32 = 3;

#[derive(Default)]
struct AnalyzerState {
    unknown_artist: Option<Artist>,
    various_artists: Option<Artist>,
    previous_album: Option<Album>,
    previous_folder_id: Option<FolderId>,
}

/// The MetadataAnalysis stage.
pub struct MetadataAnalyzer {
    pool: DbPool,
    notifier: Arc<dyn LibraryNotifier>,
    fs_factories: Vec<Arc<dyn FsFactory>>,
    discoverer: Option<Arc<dyn Discoverer>>,
    state: Mutex<AnalyzerState>,
}

impl MetadataAnalyzer {
    pub fn new(
        pool: DbPool,
        notifier: Arc<dyn LibraryNotifier>,
        fs_factories: Vec<Arc<dyn FsFactory>>,
        discoverer: Option<Arc<dyn Discoverer>>,
    ) -> Self {
        Self {
            pool,
            notifier,
            fs_factories,
            discoverer,
            state: Mutex::new(AnalyzerState::default()),
        }
    }

    fn cache_unknown_artist(&self) -> bool {
        let conn = match get_conn(&self.pool) {
            Ok(conn) => conn,
            Err(_) => return false,
        };
        match artists::get(&conn, UNKNOWN_ARTIST_ID) {
            Ok(artist) => {
                self.state.lock().unknown_artist = Some(artist);
                true
            }
            Err(e) => {
                tracing::error!("Failed to cache unknown artist: {}", e);
                false
            }
        }
    }

    fn unknown_artist(&self, conn: &Connection, state: &mut AnalyzerState) -> Result<Artist> {
        if let Some(artist) = &state.unknown_artist {
            return Ok(artist.clone());
        }
        let artist = artists::get(conn, UNKNOWN_ARTIST_ID)?;
        state.unknown_artist = Some(artist.clone());
        Ok(artist)
    }

    fn various_artists(&self, conn: &Connection, state: &mut AnalyzerState) -> Result<Artist> {
        if let Some(artist) = &state.various_artists {
            return Ok(artist.clone());
        }
        let artist = artists::get(conn, VARIOUS_ARTISTS_ID)?;
        state.various_artists = Some(artist.clone());
        Ok(artist)
    }

    fn run_inner(&self, task: &mut Task) -> Result<Status> {
        let conn = get_conn(&self.pool)?;

        // A file with sub-items is a playlist.
        if !task.item.sub_items().is_empty() {
            self.add_playlist_medias(&conn, task)?;
            task.mark_step_completed(Step::Completed);
            task.save_steps(&conn)?;
            return Ok(Status::Success);
        }

        let mut already_in_parser = false;
        if task.file.is_none() {
            match self.create_media_and_file(&conn, task) {
                Ok(()) => {}
                Err(e) if e.is_constraint_violation() => {
                    // A valid but less common case: the file was already
                    // inserted by a previous discovery of the same mrl.
                    tracing::info!(
                        "Creation of media & file for {} failed: {}. Assuming this task is a duplicate",
                        task.item.mrl(),
                        e
                    );
                    let mrl = task.item.mrl().clone();
                    let file = match files::from_mrl(&conn, mrl.as_str())? {
                        Some(file) => file,
                        None => {
                            tracing::error!("File {} no longer present in DB, aborting", mrl);
                            return Ok(Status::Fatal);
                        }
                    };
                    let media_id = match file.media_id {
                        Some(id) => id,
                        None => return Ok(Status::Fatal),
                    };
                    task.media = Some(media::get(&conn, media_id)?);
                    task.file = Some(file);
                    already_in_parser = true;
                }
                Err(e) => return Err(e),
            }
        } else if task.media.is_none() {
            // A file without a media leaves nothing to attach the analysis
            // to.
            return Ok(Status::Fatal);
        }

        let media_row = task
            .media
            .clone()
            .ok_or_else(|| Error::internal("task has no media after creation"))?;

        if let Some(playlist_id) = task.parent_playlist_id {
            playlists::add_media(
                &conn,
                playlist_id,
                media_row.id,
                task.parent_playlist_index.unwrap_or(0),
            )?;
        }

        if already_in_parser {
            // Let the worker drop this duplicate task and forget its row.
            task.mark_step_completed(Step::Completed);
            tasks::destroy(&conn, task.id())?;
            return Ok(Status::Success);
        }

        if task.item.tracks().is_empty() {
            return Ok(Status::Fatal);
        }

        let is_audio = with_retries(NB_WRITE_RETRIES, || {
            let tx = conn.unchecked_transaction().map_err(map_sqlite_err)?;
            let mut is_audio = true;
            for track in task.item.tracks() {
                match &track.details {
                    TrackDetails::Video {
                        width,
                        height,
                        fps_num,
                        fps_den,
                        sar_num,
                        sar_den,
                    } => {
                        tracks::add_video_track(
                            &tx,
                            media_row.id,
                            &track.codec,
                            track.bitrate,
                            *width,
                            *height,
                            *fps_num,
                            *fps_den,
                            *sar_num,
                            *sar_den,
                            &track.language,
                            &track.description,
                        )?;
                        is_audio = false;
                    }
                    TrackDetails::Audio {
                        nb_channels,
                        sample_rate,
                    } => {
                        tracks::add_audio_track(
                            &tx,
                            media_row.id,
                            &track.codec,
                            track.bitrate,
                            *sample_rate,
                            *nb_channels,
                            &track.language,
                            &track.description,
                        )?;
                    }
                    TrackDetails::Subtitle { encoding } => {
                        tracks::add_subtitle_track(
                            &tx,
                            media_row.id,
                            &track.codec,
                            &track.language,
                            &track.description,
                            encoding,
                        )?;
                    }
                }
            }
            media::set_duration(&tx, media_row.id, task.item.duration())?;
            tx.commit().map_err(map_sqlite_err)?;
            Ok(is_audio)
        })?;

        if is_audio {
            self.parse_audio(&conn, task, &media_row)?;
        } else {
            self.parse_video(&conn, task, &media_row)?;
        }

        task.mark_step_completed(Step::MetadataAnalysis);
        task.save_steps(&conn)?;

        let refreshed = media::get(&conn, media_row.id)?;
        task.media = Some(refreshed.clone());
        self.notifier.on_media_created(&refreshed);
        Ok(Status::Success)
    }

    fn create_media_and_file(&self, conn: &Connection, task: &mut Task) -> Result<()> {
        let mrl = task.item.mrl().clone();
        let folder = folders::get(conn, task.parent_folder_id)?;

        let tx = conn.unchecked_transaction().map_err(map_sqlite_err)?;
        tracing::info!("Adding {}", mrl);
        let media_row = media::create(
            &tx,
            MediaType::Unknown,
            mrl.file_name(),
            Some(folder.id),
            folder.device_id,
        )?;
        let file = files::create(
            &tx,
            media_row.id,
            mrl.as_str(),
            FileType::Main,
            Some(folder.id),
            folder.is_removable,
            0,
            0,
        )?;
        tasks::set_entities(&tx, task.id(), file.id, media_row.id)?;
        tx.commit().map_err(map_sqlite_err)?;

        task.file = Some(file);
        task.media = Some(media_row);
        Ok(())
    }

    /* Playlist files */

    fn add_playlist_medias(&self, conn: &Connection, task: &mut Task) -> Result<()> {
        let mrl = task.item.mrl().clone();
        tracing::info!("Importing {} as a playlist", mrl);
        let folder = folders::get(conn, task.parent_folder_id)?;

        let name = match task.item.meta(Meta::Title) {
            Some(title) => title.to_string(),
            None => mrl.decoded_file_name(),
        };

        let tx = conn.unchecked_transaction().map_err(map_sqlite_err)?;
        let playlist = playlists::create(&tx, &name)?;
        let file =
            files::create_playlist_file(&tx, playlist.id, mrl.as_str(), Some(folder.id), folder.is_removable)?;
        playlists::set_file(&tx, playlist.id, file.id)?;
        tx.commit().map_err(map_sqlite_err)?;
        task.file = Some(file);

        let sub_items = task.item.sub_items().to_vec();
        for (i, sub_item) in sub_items.iter().enumerate() {
            self.add_playlist_element(conn, &playlist, sub_item, (i + 1) as i64);
        }
        Ok(())
    }

    fn add_playlist_element(
        &self,
        conn: &Connection,
        playlist: &Playlist,
        item: &Item,
        index: i64,
    ) {
        if let Err(e) = self.try_add_playlist_element(conn, playlist, item, index) {
            tracing::error!(
                "Failed to add {} to playlist {}: {}",
                item.mrl(),
                playlist.name,
                e
            );
        }
    }

    fn try_add_playlist_element(
        &self,
        conn: &Connection,
        playlist: &Playlist,
        item: &Item,
        index: i64,
    ) -> Result<()> {
        let mrl = item.mrl();
        if let Some(existing) = media::from_mrl(conn, mrl.as_str())? {
            tracing::info!(
                "Media for {} already exists, adding it to playlist {}",
                mrl,
                playlist.name
            );
            return playlists::add_media(conn, playlist.id, existing.id, index);
        }

        let factory = self.fs_factories.iter().find(|f| f.accepts(mrl));
        let Some(factory) = factory else {
            // No filesystem claims this mrl; register it as external.
            let tx = conn.unchecked_transaction().map_err(map_sqlite_err)?;
            let title = item.meta(Meta::Title).unwrap_or(mrl.as_str());
            let external = media::create(&tx, MediaType::External, title, None, None)?;
            files::add_external(&tx, external.id, mrl.as_str(), FileType::Main)?;
            playlists::add_media(&tx, playlist.id, external.id, index)?;
            tx.commit().map_err(map_sqlite_err)?;
            return Ok(());
        };

        let is_directory = factory.is_directory(mrl)?;
        tracing::info!(
            "Importing {} {} into playlist {}",
            if is_directory { "folder" } else { "file" },
            mrl,
            playlist.name
        );
        let directory_mrl = mrl.directory();
        let parent_folder = folders::from_path(conn, directory_mrl.as_str())?;

        let Some(discoverer) = &self.discoverer else {
            tracing::warn!("No discoverer registered, cannot import {}", mrl);
            return Ok(());
        };
        let probe = PathProbe {
            path: mrl.strip_scheme().to_string(),
            is_directory,
            playlist_id: Some(playlist.id),
            playlist_index: Some(index),
            parent_folder_id: parent_folder.as_ref().map(|f| f.id),
        };
        match parent_folder {
            Some(_) => discoverer.reload(&directory_mrl, Some(probe)),
            None => {
                let Some(mountpoint) = factory.device_mountpoint(mrl) else {
                    tracing::error!("Cannot import {} from an unknown storage device", mrl);
                    return Ok(());
                };
                discoverer.discover(&mountpoint, Some(probe));
            }
        }
        Ok(())
    }

    /* Video files */

    fn parse_video(&self, conn: &Connection, task: &Task, media_row: &Media) -> Result<()> {
        media::set_type(conn, media_row.id, MediaType::Video)?;

        let Some(title) = task.item.meta(Meta::Title) else {
            return Ok(());
        };

        with_retries(NB_WRITE_RETRIES, || {
            let tx = conn.unchecked_transaction().map_err(map_sqlite_err)?;
            media::set_title(&tx, media_row.id, title)?;

            if let Some(artwork) = task.item.meta(Meta::ArtworkUrl) {
                thumbnails::set_media_thumbnail(
                    &tx,
                    media_row.id,
                    artwork,
                    ThumbnailOrigin::Media,
                    false,
                )?;
            }

            if let Some(show_name) = task.item.meta(Meta::ShowName) {
                let show = match shows::from_name(&tx, show_name)? {
                    Some(show) => show,
                    None => shows::create(&tx, show_name)?,
                };
                let episode = task.item.int_meta(Meta::Episode);
                if episode > 0 {
                    shows::add_episode(&tx, show.id, media_row.id, episode, Some(title))?;
                }
            }
            tx.commit().map_err(map_sqlite_err)?;
            Ok(())
        })
    }

    /* Audio files */

    fn parse_audio(&self, conn: &Connection, task: &Task, media_row: &Media) -> Result<()> {
        media::set_type(conn, media_row.id, MediaType::Audio)?;

        let mut artwork_mrl = task.item.meta(Meta::ArtworkUrl).map(str::to_string);
        if let Some(artwork) = &artwork_mrl {
            thumbnails::set_media_thumbnail(
                conn,
                media_row.id,
                artwork,
                ThumbnailOrigin::Media,
                false,
            )?;
            // An attachment mrl is only valid while the decoder holds the
            // file open; never propagate it to albums or artists.
            if Mrl::new(artwork.as_str()).scheme_is("attachment") {
                artwork_mrl = None;
            }
        }

        let genre = self.handle_genre(conn, task)?;

        let mut state = self.state.lock();
        let (album_artist, track_artist) = self.find_or_create_artists(conn, task, &mut state)?;
        if album_artist.is_none() && track_artist.is_none() {
            return Err(Error::internal("no artist could be resolved"));
        }
        let found_album =
            self.find_album(conn, task, album_artist.as_ref(), track_artist.as_ref(), &mut state)?;

        with_retries(NB_WRITE_RETRIES, || {
            let tx = conn.unchecked_transaction().map_err(map_sqlite_err)?;
            let album = match &found_album {
                Some(album) => album.clone(),
                None => {
                    let album_name = task
                        .item
                        .meta(Meta::Album)
                        .ok_or_else(|| Error::internal("creating an album without a name"))?;
                    let thumbnail_id = match &artwork_mrl {
                        Some(artwork) => {
                            Some(thumbnails::create(&tx, artwork, ThumbnailOrigin::Album, false)?.id)
                        }
                        None => None,
                    };
                    let album = albums::create(&tx, Some(album_name), thumbnail_id)?;
                    self.notifier.on_album_created(&album);
                    album
                }
            };

            // If we know a track artist, credit it; otherwise fall back to
            // the album artist.
            let credited = track_artist.as_ref().or(album_artist.as_ref());
            let credited = credited.ok_or_else(|| Error::internal("no credited artist"))?;
            self.handle_track(&tx, task, media_row, &album, credited, genre.as_ref())?;

            self.link(
                &tx,
                media_row,
                &album,
                album_artist.clone(),
                track_artist.clone(),
                &mut state,
            )?;
            tx.commit().map_err(map_sqlite_err)?;
            Ok(())
        })
    }

    fn handle_genre(&self, conn: &Connection, task: &Task) -> Result<Option<Genre>> {
        let Some(genre_name) = task.item.meta(Meta::Genre) else {
            return Ok(None);
        };
        match genres::from_name(conn, genre_name)? {
            Some(genre) => Ok(Some(genre)),
            None => Ok(Some(genres::create(conn, genre_name)?)),
        }
    }

    /// Artists involved on a track: the album artist first, then the track
    /// artist when it differs. Both default to the unknown-artist sentinel
    /// when the tags are empty.
    fn find_or_create_artists(
        &self,
        conn: &Connection,
        task: &Task,
        state: &mut AnalyzerState,
    ) -> Result<(Option<Artist>, Option<Artist>)> {
        let album_artist_tag = task.item.meta(Meta::AlbumArtist);
        let artist_tag = task.item.meta(Meta::Artist);

        if album_artist_tag.is_none() && artist_tag.is_none() {
            let unknown = self.unknown_artist(conn, state)?;
            return Ok((Some(unknown.clone()), Some(unknown)));
        }

        let mut album_artist = None;
        if let Some(name) = album_artist_tag {
            album_artist = Some(self.find_or_create_artist(conn, name)?);
        }
        let mut artist = None;
        if let Some(name) = artist_tag {
            if album_artist_tag != Some(name) {
                artist = Some(self.find_or_create_artist(conn, name)?);
            }
        }
        Ok((album_artist, artist))
    }

    fn find_or_create_artist(&self, conn: &Connection, name: &str) -> Result<Artist> {
        if let Some(artist) = artists::from_name(conn, name)? {
            return Ok(artist);
        }
        let artist = artists::create(conn, name)?;
        self.notifier.on_artist_created(&artist);
        Ok(artist)
    }

    /* Album handling */

    /// Resolve the album a track belongs to, or None when a new album must
    /// be created.
    ///
    /// Album matching depends on the difference between artist and album
    /// artist: an album "A" by "john" must not swallow an album "A" by
    /// "doe", while a multi-disc edition spread over several folders must
    /// stay one album.
    fn find_album(
        &self,
        conn: &Connection,
        task: &Task,
        album_artist: Option<&Artist>,
        track_artist: Option<&Artist>,
        state: &mut AnalyzerState,
    ) -> Result<Option<Album>> {
        let Some(album_name) = task.item.meta(Meta::Album) else {
            let owner = album_artist
                .or(track_artist)
                .cloned()
                .map(Ok)
                .unwrap_or_else(|| self.unknown_artist(conn, state))?;
            return albums::unknown_album(conn, owner.id).map(Some);
        };

        // Hot path: tracks of one album are overwhelmingly discovered
        // back-to-back from the same folder.
        if let (Some(previous), Some(previous_folder)) =
            (&state.previous_album, state.previous_folder_id)
        {
            let task_folder = task.file.as_ref().and_then(|f| f.folder_id);
            if previous.title.as_deref() == Some(album_name) && task_folder == Some(previous_folder)
            {
                return Ok(Some(previous.clone()));
            }
        }
        state.previous_album = None;
        state.previous_folder_id = None;

        let candidates = albums::all_by_title(conn, album_name)?;
        if candidates.is_empty() {
            return Ok(None);
        }

        let disc_total = task.item.int_meta(Meta::DiscTotal);
        let disc_number = task.item.int_meta(Meta::DiscNumber);
        let new_file_folder = task
            .file
            .as_ref()
            .map(|f| Mrl::new(f.mrl.as_str()).directory());
        let tagged_year: Option<i64> = task
            .item
            .meta(Meta::Date)
            .and_then(|d| d.trim().parse().ok());

        let mut kept = Vec::new();
        for candidate in candidates {
            if let Some(album_artist) = album_artist {
                // An album without an album artist is a positive match;
                // without proper tags there is only so much we can do.
                if let Some(candidate_artist) = candidate.artist_id {
                    if candidate_artist != album_artist.id {
                        continue;
                    }
                }
            }

            // A multi-disc album can be spread over multiple folders, and
            // the folders can come in any order. Tagged disc info settles
            // it early, without fetching the candidate's tracks.
            if disc_total > 1 || disc_number > 1 {
                kept.push(candidate);
                continue;
            }

            let candidate_tracks = albums::candidate_tracks(conn, candidate.id)?;
            if candidate_tracks.is_empty() {
                // Nothing to compare with; hope this is the only match.
                kept.push(candidate);
                continue;
            }

            let mut multi_disc = false;
            let mut multiple_artists = false;
            let mut previous_artist = track_artist.map(|a| a.id);
            for candidate_track in &candidate_tracks {
                if candidate_track.disc_number > 1 {
                    multi_disc = true;
                }
                if let Some(previous) = previous_artist {
                    if previous != candidate_track.artist_id {
                        multiple_artists = true;
                    }
                }
                previous_artist = Some(candidate_track.artist_id);
                if multi_disc && multiple_artists {
                    break;
                }
            }
            if multi_disc {
                kept.push(candidate);
                continue;
            }

            // Assume an album's files all live in the same folder, and
            // compare against the candidate's first track.
            let candidate_folder = candidate_tracks[0]
                .file_mrl
                .as_deref()
                .map(|mrl| Mrl::new(mrl).directory());
            let same_folder = match (&new_file_folder, &candidate_folder) {
                (Some(new_folder), Some(existing)) => new_folder == existing,
                _ => true,
            };
            if same_folder {
                kept.push(candidate);
                continue;
            }

            // Different folder, single disc. Try to discriminate by date,
            // but only within a single artist; compilations are frequently
            // only partially tagged with a year.
            if !multiple_artists {
                if let Some(year) = tagged_year {
                    if candidate.release_year == Some(year) {
                        kept.push(candidate);
                    }
                    continue;
                }
            }

            // Different folder, not multi-disc, and no date to
            // discriminate: assume a negative match.
        }

        if kept.is_empty() {
            return Ok(None);
        }
        if kept.len() > 1 {
            tracing::warn!(
                "Multiple candidates for album {}. Selecting first one out of luck",
                album_name
            );
        }
        let album = kept.remove(0);
        state.previous_folder_id = task.file.as_ref().and_then(|f| f.folder_id);
        state.previous_album = Some(album.clone());
        Ok(Some(album))
    }

    /* Track handling */

    fn handle_track(
        &self,
        tx: &Connection,
        task: &Task,
        media_row: &Media,
        album: &Album,
        artist: &Artist,
        genre: Option<&Genre>,
    ) -> Result<AlbumTrack> {
        let track_number = task.item.int_meta(Meta::TrackNumber);
        let disc_number = task.item.int_meta(Meta::DiscNumber);

        let mut title = task.item.meta(Meta::Title).map(str::to_string);
        if title.is_none() {
            tracing::warn!("Failed to get track title for {}", task.item.mrl());
            if track_number != 0 {
                title = Some(format!("Track #{}", track_number));
            }
        }
        if let Some(title) = &title {
            media::set_title(tx, media_row.id, title)?;
        }

        let track = albums::add_track(
            tx,
            album.id,
            media_row.id,
            artist.id,
            genre.map(|g| g.id),
            track_number,
            disc_number,
            task.item.duration(),
        )?;

        if let Some(year) = task
            .item
            .meta(Meta::Date)
            .and_then(|d| d.trim().parse::<i64>().ok())
        {
            media::set_release_year(tx, media_row.id, year)?;
            // The album reconciles dates across its tracks itself.
            albums::set_release_year(tx, album.id, year, false)?;
        }

        self.notifier.on_album_track_created(&track);
        Ok(track)
    }

    /* Linking */

    fn link(
        &self,
        tx: &Connection,
        media_row: &Media,
        album: &Album,
        album_artist: Option<Artist>,
        track_artist: Option<Artist>,
        state: &mut AnalyzerState,
    ) -> Result<()> {
        let album_artist = match album_artist {
            Some(artist) => artist,
            None => track_artist
                .clone()
                .ok_or_else(|| Error::internal("linking without any artist"))?,
        };

        let is_sentinel =
            |id: ArtistId| id == UNKNOWN_ARTIST_ID || id == VARIOUS_ARTISTS_ID;
        let album_thumbnail = thumbnails::for_album(tx, album.id)?;

        // A properly tagged album artist is a trustworthy match for the
        // album's artwork. Sentinel artists are skipped: their thumbnail
        // would reflect an arbitrary album. An existing Artist-origin
        // thumbnail is weaker than a dedicated one but is left alone.
        if let Some(thumbnail) = &album_thumbnail {
            if !is_sentinel(album_artist.id)
                && thumbnails::for_artist(tx, album_artist.id)?.is_none()
            {
                thumbnails::set_artist_thumbnail(
                    tx,
                    album_artist.id,
                    &thumbnail.mrl,
                    ThumbnailOrigin::AlbumArtist,
                )?;
            }
            if let Some(artist) = &track_artist {
                if !is_sentinel(artist.id) && thumbnails::for_artist(tx, artist.id)?.is_none() {
                    thumbnails::set_artist_thumbnail(
                        tx,
                        artist.id,
                        &thumbnail.mrl,
                        ThumbnailOrigin::Artist,
                    )?;
                }
            }
        }

        artists::add_media(tx, album_artist.id, media_row.id)?;
        if let Some(artist) = &track_artist {
            if artist.id != album_artist.id {
                artists::add_media(tx, artist.id, media_row.id)?;
            }
        }

        let current = albums::get(tx, album.id)?;
        match current.artist_id {
            None => {
                // No main artist yet. We don't know whether the tag said
                // artist or album artist; assign it as the album artist
                // until a later track proves us wrong.
                albums::set_album_artist(tx, album.id, album_artist.id)?;
                albums::add_artist(tx, album.id, album_artist.id)?;
                artists::update_nb_tracks(tx, album_artist.id, 1)?;
                if let Some(artist) = &track_artist {
                    if artist.id != album_artist.id {
                        artists::update_nb_tracks(tx, artist.id, 1)?;
                    }
                    albums::add_artist(tx, album.id, artist.id)?;
                }
            }
            Some(current_artist_id) => {
                if album_artist.id != current_artist_id {
                    // More than one artist on this album: it is a
                    // compilation now.
                    let various = self.various_artists(tx, state)?;
                    if various.id != current_artist_id {
                        // Every track of the album must be reflected in
                        // the sentinel's track count.
                        artists::update_nb_tracks(tx, various.id, current.nb_tracks)?;
                        albums::set_album_artist(tx, album.id, various.id)?;
                    } else {
                        artists::update_nb_tracks(tx, various.id, 1)?;
                    }
                    // The incoming artist is featuring on the album.
                    albums::add_artist(tx, album.id, album_artist.id)?;
                }
                if let Some(artist) = &track_artist {
                    if artist.id != album_artist.id {
                        albums::add_artist(tx, album.id, artist.id)?;
                        artists::update_nb_tracks(tx, artist.id, 1)?;
                    }
                }
                artists::update_nb_tracks(tx, album_artist.id, 1)?;
            }
        }
        Ok(())
    }
}

impl ParserService for MetadataAnalyzer {
    fn name(&self) -> &'static str {
        "Metadata"
    }

    fn target_step(&self) -> Step {
        Step::MetadataAnalysis
    }

    fn nb_threads(&self) -> u8 {
        // The resolution caches assume a single writer.
        1
    }

    fn initialize(&self) -> bool {
        self.cache_unknown_artist()
    }

    fn run(&self, task: &mut Task) -> Status {
        match self.run_inner(task) {
            Ok(status) => status,
            Err(Error::DeviceRemoved) => Status::TemporaryUnavailable,
            Err(Error::DatabaseBusy) => Status::Error,
            Err(e) => {
                tracing::error!("Analysis of {} failed: {}", task.item.mrl(), e);
                Status::Fatal
            }
        }
    }

    fn on_flushing(&self) {
        let mut state = self.state.lock();
        state.various_artists = None;
        state.previous_album = None;
        state.previous_folder_id = None;
    }

    fn on_restarted(&self) {
        // Reset locally cached entities.
        self.cache_unknown_artist();
    }
}
