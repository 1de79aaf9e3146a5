//! Playlist ingestion scenarios: linking existing media, registering
//! external entries, and launching restricted discoveries for unknown
//! local files.

mod common;

use common::{wait_until, MediaSpec, TestLibrary};
use mediatheque::fs::Mrl;
use mediatheque::parser::task::Meta;
use mediatheque_common::{FileType, FolderId, MediaType};
use mediatheque_db::pool::get_conn;
use mediatheque_db::queries::{files, folders, media, playlists};

fn folder(lib: &TestLibrary, path: &str) -> FolderId {
    let conn = get_conn(lib.library.pool()).unwrap();
    match folders::from_path(&conn, path).unwrap() {
        Some(existing) => existing.id,
        None => folders::create(&conn, path, None, None, false).unwrap().id,
    }
}

#[test]
fn playlist_with_known_unknown_and_remote_entries() {
    let lib = TestLibrary::new();
    let music = folder(&lib, "file:///music/");

    // Entry 1 already exists in the catalog.
    {
        let conn = get_conn(lib.library.pool()).unwrap();
        let existing = media::create(
            &conn,
            MediaType::Audio,
            "existing.mp3",
            Some(music),
            None,
        )
        .unwrap();
        files::create(
            &conn,
            existing.id,
            "file:///music/existing.mp3",
            FileType::Main,
            Some(music),
            false,
            0,
            0,
        )
        .unwrap();
    }

    lib.prober.add(
        "file:///music/morning.m3u",
        MediaSpec::playlist(vec![
            ("file:///music/existing.mp3".to_string(), vec![]),
            ("file:///music/unknown.mp3".to_string(), vec![]),
            (
                "http://dead.example/stream".to_string(),
                vec![(Meta::Title, "Dead Stream".to_string())],
            ),
        ])
        .tag(Meta::Title, "Morning"),
    );
    lib.library
        .add_discovered_file(&Mrl::new("file:///music/morning.m3u"), music, false)
        .unwrap();

    // The remote entry lands as an external media immediately.
    wait_until(|| {
        let conn = get_conn(lib.library.pool()).unwrap();
        media::from_mrl(&conn, "http://dead.example/stream")
            .unwrap()
            .is_some()
    });

    // The unknown local entry is handed to the discoverer as a restricted
    // reload of its parent directory.
    let (entry_point, probe) = {
        let reloaded = lib.discoverer.reloaded.lock();
        assert_eq!(reloaded.len(), 1);
        reloaded[0].clone()
    };
    assert_eq!(entry_point, Mrl::new("file:///music/"));
    let probe = probe.expect("playlist reload carries a path probe");
    assert_eq!(probe.path, "/music/unknown.mp3");
    assert!(!probe.is_directory);
    assert_eq!(probe.playlist_index, Some(2));
    let playlist_id = probe.playlist_id.expect("probe targets the playlist");

    // Play the discoverer's part: feed the probed file back in.
    lib.prober.add(
        "file:///music/unknown.mp3",
        MediaSpec::audio().tag(Meta::Title, "Found You"),
    );
    lib.library
        .add_discovered_playlist_entry(
            &Mrl::new("file:///music/unknown.mp3"),
            music,
            playlist_id,
            2,
        )
        .unwrap();

    wait_until(|| {
        let conn = get_conn(lib.library.pool()).unwrap();
        playlists::media(&conn, playlist_id).unwrap().len() == 3
    });
    lib.library.stop();

    let conn = get_conn(lib.library.pool()).unwrap();
    let playlist = playlists::get(&conn, playlist_id).unwrap();
    assert_eq!(playlist.name, "Morning");
    assert!(playlist.file_id.is_some());

    // Entries come back in their 1-based playlist order.
    let members = playlists::media(&conn, playlist_id).unwrap();
    assert_eq!(members.len(), 3);
    assert_eq!(members[0].filename, "existing.mp3");
    assert_eq!(members[1].title, "Found You");
    assert_eq!(members[2].media_type, MediaType::External);
    assert_eq!(members[2].title, "Dead Stream");
    assert_eq!(playlists::positions(&conn, playlist_id).unwrap(), vec![1, 2, 3]);

    // Each member's nb_playlists cache reflects the membership.
    for member in &members {
        assert_eq!(media::get(&conn, member.id).unwrap().nb_playlists, 1);
    }

    // The external entry is backed by an external file.
    let external_file = files::from_mrl(&conn, "http://dead.example/stream")
        .unwrap()
        .unwrap();
    assert!(external_file.is_external);
}

#[test]
fn playlist_name_falls_back_to_decoded_file_name() {
    let lib = TestLibrary::new();
    let music = folder(&lib, "file:///music/");

    lib.prober.add(
        "file:///music/Road%20Trip.m3u",
        MediaSpec::playlist(vec![(
            "http://radio.example/live".to_string(),
            vec![(Meta::Title, "Radio".to_string())],
        )]),
    );
    lib.library
        .add_discovered_file(&Mrl::new("file:///music/Road%20Trip.m3u"), music, false)
        .unwrap();

    wait_until(|| {
        let conn = get_conn(lib.library.pool()).unwrap();
        media::from_mrl(&conn, "http://radio.example/live")
            .unwrap()
            .is_some()
    });
    lib.library.stop();

    let conn = get_conn(lib.library.pool()).unwrap();
    let file = files::from_mrl(&conn, "file:///music/Road%20Trip.m3u")
        .unwrap()
        .unwrap();
    assert_eq!(file.file_type, FileType::Playlist);
    let playlist_id = file.playlist_id.unwrap();
    assert_eq!(playlists::get(&conn, playlist_id).unwrap().name, "Road Trip.m3u");
}

#[test]
fn playlist_task_completes_without_running_later_steps() {
    let lib = TestLibrary::new();
    let music = folder(&lib, "file:///music/");

    lib.prober.add(
        "file:///music/empty.m3u",
        MediaSpec::playlist(vec![(
            "http://one.example/a".to_string(),
            vec![(Meta::Title, "A".to_string())],
        )]),
    );
    lib.library
        .add_discovered_file(&Mrl::new("file:///music/empty.m3u"), music, false)
        .unwrap();

    wait_until(|| {
        let conn = get_conn(lib.library.pool()).unwrap();
        mediatheque_db::queries::tasks::fetch_uncompleted(&conn)
            .unwrap()
            .is_empty()
    });
    lib.library.stop();

    // No media notification was emitted for the playlist file itself.
    assert!(lib
        .notifier
        .media
        .lock()
        .iter()
        .all(|m| m.media_type == MediaType::External || m.filename != "empty.m3u"));
}
