//! Shared fixtures for pipeline integration tests: a scripted prober, a
//! recording notifier, and minimal filesystem mocks.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use mediatheque::config::LibraryConfig;
use mediatheque::fs::{Discoverer, FsFactory, Mrl, PathProbe};
use mediatheque::notifier::LibraryNotifier;
use mediatheque::parser::task::{Item, Meta, Track, TrackDetails};
use mediatheque::services::prober::{MediaProber, ProbeError};
use mediatheque::MediaLibrary;
use mediatheque_db::models::{Album, AlbumTrack, Artist, Media};

/// Canned extraction output for one mrl.
#[derive(Debug, Clone, Default)]
pub struct MediaSpec {
    pub tags: Vec<(Meta, String)>,
    pub tracks: Vec<Track>,
    pub duration: i64,
    /// (mrl, tags) pairs, in playlist order.
    pub sub_items: Vec<(String, Vec<(Meta, String)>)>,
}

impl MediaSpec {
    pub fn audio() -> Self {
        Self {
            tracks: vec![audio_track()],
            duration: 180_000,
            ..Default::default()
        }
    }

    pub fn video() -> Self {
        Self {
            tracks: vec![video_track()],
            duration: 2_400_000,
            ..Default::default()
        }
    }

    pub fn playlist(sub_items: Vec<(String, Vec<(Meta, String)>)>) -> Self {
        Self {
            sub_items,
            ..Default::default()
        }
    }

    pub fn tag<S: Into<String>>(mut self, meta: Meta, value: S) -> Self {
        self.tags.push((meta, value.into()));
        self
    }
}

pub fn audio_track() -> Track {
    Track {
        codec: "flac".to_string(),
        bitrate: 900_000,
        language: String::new(),
        description: String::new(),
        details: TrackDetails::Audio {
            nb_channels: 2,
            sample_rate: 44_100,
        },
    }
}

pub fn video_track() -> Track {
    Track {
        codec: "h264".to_string(),
        bitrate: 5_000_000,
        language: String::new(),
        description: String::new(),
        details: TrackDetails::Video {
            width: 1920,
            height: 1080,
            fps_num: 24_000,
            fps_den: 1001,
            sar_num: 1,
            sar_den: 1,
        },
    }
}

/// A prober that plays back canned specs keyed by mrl. Unknown mrls fail
/// the probe. An mrl queued in `unavailable` reports a removed device once
/// per queue entry.
#[derive(Default)]
pub struct MockProber {
    specs: Mutex<HashMap<String, MediaSpec>>,
    unavailable: Mutex<Vec<String>>,
}

impl MockProber {
    pub fn add(&self, mrl: &str, spec: MediaSpec) {
        self.specs.lock().insert(mrl.to_string(), spec);
    }

    /// Make the next probe of `mrl` fail as if its device was unplugged.
    pub fn fail_once_unavailable(&self, mrl: &str) {
        self.unavailable.lock().push(mrl.to_string());
    }
}

impl MediaProber for MockProber {
    fn probe(
        &self,
        item: &mut Item,
        _timeout: Duration,
        _use_playback: bool,
    ) -> Result<(), ProbeError> {
        let mrl = item.mrl().as_str().to_string();
        {
            let mut unavailable = self.unavailable.lock();
            if let Some(pos) = unavailable.iter().position(|m| m == &mrl) {
                unavailable.remove(pos);
                return Err(ProbeError::DeviceRemoved);
            }
        }
        let specs = self.specs.lock();
        let spec = specs
            .get(&mrl)
            .ok_or_else(|| ProbeError::Failed(format!("no spec for {}", mrl)))?;
        for (meta, value) in &spec.tags {
            item.set_meta(*meta, value.clone());
        }
        for track in &spec.tracks {
            item.add_track(track.clone());
        }
        item.set_duration(spec.duration);
        for (sub_mrl, tags) in &spec.sub_items {
            let mut sub_item = Item::new(Mrl::new(sub_mrl.clone()));
            for (meta, value) in tags {
                sub_item.set_meta(*meta, value.clone());
            }
            item.add_sub_item(sub_item);
        }
        Ok(())
    }
}

/// Records every notification the pipeline emits.
#[derive(Default)]
pub struct RecordingNotifier {
    pub media: Mutex<Vec<Media>>,
    pub albums: Mutex<Vec<Album>>,
    pub tracks: Mutex<Vec<AlbumTrack>>,
    pub artists: Mutex<Vec<Artist>>,
    pub idle_flips: Mutex<Vec<bool>>,
}

impl LibraryNotifier for RecordingNotifier {
    fn on_media_created(&self, media: &Media) {
        self.media.lock().push(media.clone());
    }
    fn on_album_created(&self, album: &Album) {
        self.albums.lock().push(album.clone());
    }
    fn on_album_track_created(&self, track: &AlbumTrack) {
        self.tracks.lock().push(track.clone());
    }
    fn on_artist_created(&self, artist: &Artist) {
        self.artists.lock().push(artist.clone());
    }
    fn on_idle_changed(&self, idle: bool) {
        self.idle_flips.lock().push(idle);
    }
}

/// A factory claiming one scheme, with every mrl a plain file under a
/// single mountpoint.
pub struct MockFsFactory {
    pub scheme: &'static str,
    pub mountpoint: &'static str,
}

impl FsFactory for MockFsFactory {
    fn accepts(&self, mrl: &Mrl) -> bool {
        mrl.scheme_is(self.scheme)
    }
    fn is_directory(&self, _mrl: &Mrl) -> mediatheque_common::Result<bool> {
        Ok(false)
    }
    fn device_mountpoint(&self, _mrl: &Mrl) -> Option<Mrl> {
        Some(Mrl::new(self.mountpoint))
    }
}

/// Records discover/reload requests instead of scanning anything.
#[derive(Default)]
pub struct RecordingDiscoverer {
    pub discovered: Mutex<Vec<(Mrl, Option<PathProbe>)>>,
    pub reloaded: Mutex<Vec<(Mrl, Option<PathProbe>)>>,
}

impl Discoverer for RecordingDiscoverer {
    fn discover(&self, entry_point: &Mrl, probe: Option<PathProbe>) {
        self.discovered.lock().push((entry_point.clone(), probe));
    }
    fn reload(&self, entry_point: &Mrl, probe: Option<PathProbe>) {
        self.reloaded.lock().push((entry_point.clone(), probe));
    }
}

/// Everything a pipeline test needs in one place.
pub struct TestLibrary {
    pub library: MediaLibrary,
    pub prober: Arc<MockProber>,
    pub notifier: Arc<RecordingNotifier>,
    pub discoverer: Arc<RecordingDiscoverer>,
}

impl TestLibrary {
    pub fn new() -> Self {
        init_tracing();
        let prober = Arc::new(MockProber::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let discoverer = Arc::new(RecordingDiscoverer::default());
        let library = MediaLibrary::builder(LibraryConfig::default())
            .in_memory()
            .prober(prober.clone())
            .notifier(notifier.clone())
            .discoverer(discoverer.clone())
            .fs_factory(Arc::new(MockFsFactory {
                scheme: "file",
                mountpoint: "file:///",
            }))
            .build()
            .unwrap();
        Self {
            library,
            prober,
            notifier,
            discoverer,
        }
    }

    /// Block until the pipeline drains.
    pub fn drain(&self) {
        // Give the first submission a beat to leave the idle state.
        std::thread::sleep(Duration::from_millis(30));
        let deadline = Instant::now() + Duration::from_secs(5);
        while !self.library.is_idle() {
            assert!(Instant::now() < deadline, "pipeline did not drain in time");
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}

/// Route pipeline logs through the test harness when RUST_LOG asks for
/// them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Poll until `cond` holds, or fail after five seconds.
pub fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        std::thread::sleep(Duration::from_millis(10));
    }
}
