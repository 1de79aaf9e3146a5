//! Pipeline-level scenarios: persistence across restarts, retry
//! accounting, device removal, and lifecycle control.

mod common;

use std::sync::Arc;

use common::{wait_until, MediaSpec, MockProber, TestLibrary};
use mediatheque::fs::Mrl;
use mediatheque::notifier::NullNotifier;
use mediatheque::parser::task::{Meta, Status, Task};
use mediatheque::parser::Parser;
use mediatheque::services::prober::ProberService;
use mediatheque::services::ParserService;
use mediatheque_common::{FileType, FolderId, MediaType, Step, MAX_TASK_RETRIES};
use mediatheque_db::pool::{get_conn, init_memory_pool, init_pool};
use mediatheque_db::queries::{albums, devices, files, folders, media, tasks};
use parking_lot::Mutex;

fn folder(lib: &TestLibrary, path: &str) -> FolderId {
    let conn = get_conn(lib.library.pool()).unwrap();
    match folders::from_path(&conn, path).unwrap() {
        Some(existing) => existing.id,
        None => folders::create(&conn, path, None, None, false).unwrap().id,
    }
}

#[test]
fn media_and_file_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");
    let db_path = db_path.to_string_lossy();

    let (media_id, file_id, original_media, original_file) = {
        let pool = init_pool(&db_path).unwrap();
        let conn = get_conn(&pool).unwrap();
        let media_row = media::create(&conn, MediaType::Audio, "a.flac", None, None).unwrap();
        let file_row = files::create(
            &conn,
            media_row.id,
            "file:///music/a.flac",
            FileType::Main,
            None,
            false,
            4096,
            1_700_000_000,
        )
        .unwrap();
        (media_row.id, file_row.id, media_row, file_row)
    };

    // Reopen the database and fetch the same rows.
    let pool = init_pool(&db_path).unwrap();
    let conn = get_conn(&pool).unwrap();
    assert_eq!(media::get(&conn, media_id).unwrap(), original_media);
    assert_eq!(files::get(&conn, file_id).unwrap(), original_file);
}

/// An analysis stage that always reports a transient error.
struct BrokenAnalysis {
    calls: Mutex<u32>,
}

impl ParserService for BrokenAnalysis {
    fn name(&self) -> &'static str {
        "BrokenAnalysis"
    }
    fn target_step(&self) -> Step {
        Step::MetadataAnalysis
    }
    fn nb_threads(&self) -> u8 {
        1
    }
    fn run(&self, _task: &mut Task) -> Status {
        *self.calls.lock() += 1;
        Status::Error
    }
}

#[test]
fn successful_extraction_does_not_shield_a_failing_analysis() {
    let pool = init_memory_pool().unwrap();
    let prober = Arc::new(MockProber::default());
    prober.add("file:///music/cursed.mp3", MediaSpec::audio());

    let parser = Parser::new(pool.clone(), Arc::new(NullNotifier));
    parser
        .add_service(Arc::new(ProberService::new(prober)))
        .unwrap();
    let analysis = Arc::new(BrokenAnalysis {
        calls: Mutex::new(0),
    });
    parser.add_service(analysis.clone()).unwrap();

    let task_id = {
        let conn = get_conn(&pool).unwrap();
        let parent = folders::create(&conn, "/music", None, None, false).unwrap();
        let row = tasks::create(
            &conn,
            "file:///music/cursed.mp3",
            None,
            None,
            parent.id,
            None,
            None,
            false,
        )
        .unwrap();
        row.id
    };
    {
        let conn = get_conn(&pool).unwrap();
        parser.parse(Task::from_row(tasks::get(&conn, task_id).unwrap()));
    }

    wait_until(|| {
        let conn = get_conn(&pool).unwrap();
        tasks::get(&conn, task_id).unwrap().step_done.is_completed()
    });
    parser.stop();

    let conn = get_conn(&pool).unwrap();
    let row = tasks::get(&conn, task_id).unwrap();
    // The extraction refunds its own retry, so the analysis gets the full
    // budget before the task is marked failed.
    assert_eq!(*analysis.calls.lock(), MAX_TASK_RETRIES as u32);
    assert_eq!(row.retry_count, MAX_TASK_RETRIES);
    assert!(tasks::fetch_uncompleted(&conn).unwrap().is_empty());
}

#[test]
fn successful_pipeline_leaves_retry_budget_intact() {
    let lib = TestLibrary::new();
    let parent = folder(&lib, "file:///music/ok/");
    lib.prober.add(
        "file:///music/ok/01.mp3",
        MediaSpec::audio()
            .tag(Meta::Title, "Fine")
            .tag(Meta::Album, "All Good")
            .tag(Meta::AlbumArtist, "Someone")
            .tag(Meta::TrackNumber, "1"),
    );
    lib.library
        .add_discovered_file(&Mrl::new("file:///music/ok/01.mp3"), parent, false)
        .unwrap();

    wait_until(|| lib.notifier.tracks.lock().len() == 1);
    wait_until(|| {
        let conn = get_conn(lib.library.pool()).unwrap();
        tasks::fetch_uncompleted(&conn).unwrap().is_empty()
    });
    lib.library.stop();

    let conn = get_conn(lib.library.pool()).unwrap();
    let retry_count: i64 = conn
        .query_row("SELECT retry_count FROM task", [], |row| row.get(0))
        .unwrap();
    assert!(retry_count <= 1);
}

#[test]
fn absent_device_defers_task_until_replugged() {
    let lib = TestLibrary::new();

    // A half-analyzed file on a removable device: media and file rows
    // exist, the analysis step does not.
    let mrl = "file:///mnt/usb/music/01.mp3";
    let (task_id, device_uuid) = {
        let conn = get_conn(lib.library.pool()).unwrap();
        let device = devices::create(&conn, "usb-1", "file://", true).unwrap();
        let usb_folder =
            folders::create(&conn, "file:///mnt/usb/music/", None, Some(device.id), true).unwrap();
        let media_row = media::create(
            &conn,
            MediaType::Unknown,
            "01.mp3",
            Some(usb_folder.id),
            Some(device.id),
        )
        .unwrap();
        let file_row = files::create(
            &conn,
            media_row.id,
            mrl,
            FileType::Main,
            Some(usb_folder.id),
            true,
            0,
            0,
        )
        .unwrap();
        let row = tasks::create(
            &conn,
            mrl,
            Some(file_row.id),
            Some(media_row.id),
            usb_folder.id,
            None,
            None,
            false,
        )
        .unwrap();
        (row.id, device.uuid)
    };
    lib.prober.add(
        mrl,
        MediaSpec::audio()
            .tag(Meta::Title, "Portable")
            .tag(Meta::Album, "On The Go")
            .tag(Meta::AlbumArtist, "Traveler")
            .tag(Meta::TrackNumber, "1"),
    );

    // The device is gone before the pipeline resumes.
    lib.library.on_device_unplugged(&device_uuid).unwrap();
    lib.library.start();

    // The task is deferred: its step mask stays clear and it remains
    // uncompleted, but it is not failed either.
    std::thread::sleep(std::time::Duration::from_millis(200));
    {
        let conn = get_conn(lib.library.pool()).unwrap();
        let row = tasks::get(&conn, task_id).unwrap();
        assert!(!row.step_done.contains(Step::MetadataExtraction));
        assert!(!row.step_done.is_completed());
        assert_eq!(tasks::fetch_uncompleted(&conn).unwrap().len(), 1);
    }

    // Replugging restarts the pipeline and the task completes fully.
    lib.library.on_device_plugged(&device_uuid).unwrap();
    wait_until(|| {
        let conn = get_conn(lib.library.pool()).unwrap();
        tasks::get(&conn, task_id).unwrap().step_done.is_completed()
    });
    lib.library.stop();

    let conn = get_conn(lib.library.pool()).unwrap();
    let media_row = media::from_mrl(&conn, mrl).unwrap().unwrap();
    assert_eq!(media_row.media_type, MediaType::Audio);
    let track = albums::track_for_media(&conn, media_row.id).unwrap().unwrap();
    let album = albums::get(&conn, track.album_id).unwrap();
    assert_eq!(album.title.as_deref(), Some("On The Go"));
}

#[test]
fn flush_drops_queued_work_but_keeps_task_rows() {
    let lib = TestLibrary::new();
    let parent = folder(&lib, "file:///music/q/");
    lib.prober
        .add("file:///music/q/01.mp3", MediaSpec::audio());

    lib.library.pause();
    lib.library
        .add_discovered_file(&Mrl::new("file:///music/q/01.mp3"), parent, false)
        .unwrap();
    lib.library.flush();
    lib.library.resume();

    std::thread::sleep(std::time::Duration::from_millis(100));
    lib.library.stop();

    let conn = get_conn(lib.library.pool()).unwrap();
    // Never processed: no media row, but the task row survives for the
    // next restore.
    assert!(media::from_mrl(&conn, "file:///music/q/01.mp3")
        .unwrap()
        .is_none());
    assert_eq!(tasks::fetch_uncompleted(&conn).unwrap().len(), 1);
}

#[test]
fn unplugging_hides_media_without_deleting_them() {
    let lib = TestLibrary::new();
    let conn = get_conn(lib.library.pool()).unwrap();

    let device = devices::create(&conn, "sd-1", "file://", true).unwrap();
    let sd_folder =
        folders::create(&conn, "file:///mnt/sd/", None, Some(device.id), true).unwrap();
    let on_sd = media::create(
        &conn,
        MediaType::Video,
        "clip.mkv",
        Some(sd_folder.id),
        Some(device.id),
    )
    .unwrap();
    drop(conn);

    lib.library.on_device_unplugged("sd-1").unwrap();
    let conn = get_conn(lib.library.pool()).unwrap();
    assert!(media::list_present(&conn).unwrap().is_empty());
    assert!(media::get(&conn, on_sd.id).is_ok());
    drop(conn);

    lib.library.on_device_plugged("sd-1").unwrap();
    let conn = get_conn(lib.library.pool()).unwrap();
    assert_eq!(media::list_present(&conn).unwrap().len(), 1);
    lib.library.stop();
}
