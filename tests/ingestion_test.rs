//! Ingestion integration tests
//!
//! Directory expansion, duplicate and unsupported handling, and progress
//! reporting through the orchestrator.

mod common;

use assert_matches::assert_matches;
use common::{EngineScript, TestHarness};
use imageforged::state::{EventPayload, Status};
use imageforged_common::{EntryId, Error};
use std::path::PathBuf;

#[tokio::test]
async fn test_directory_entries_grouped_under_directory_name() {
    let h = TestHarness::new();
    h.inspector.jpeg("/photos/holiday/beach.jpg", 10);
    h.inspector.png("/photos/holiday/sunset.png", 20);
    h.inspector.file("/photos/holiday/readme.md", "text/plain", 1);
    let holiday = PathBuf::from("/photos/holiday");

    let flags = h.orchestrator.ingest(&[holiday]).await.unwrap();

    assert_eq!(flags.added, 2);
    assert!(!flags.saw_nested_directory);
    assert!(!flags.unsupported_found);
    assert_eq!(
        h.standby_names(),
        vec!["holiday/beach.jpg", "holiday/sunset.png"]
    );
    let standby = h.orchestrator.standby();
    assert!(standby.iter().all(|e| e.size_after == 0));
    assert_eq!(standby[0].dir_segments, vec!["holiday".to_string()]);
    assert_eq!(standby[0].base_name, "beach");
}

#[tokio::test]
async fn test_nested_directory_flagged_and_excluded() {
    let h = TestHarness::new();
    h.inspector.jpeg("/photos/holiday/beach.jpg", 10);
    h.inspector.jpeg("/photos/holiday/day2/hike.jpg", 10);

    let flags = h
        .orchestrator
        .ingest(&[PathBuf::from("/photos/holiday")])
        .await
        .unwrap();

    assert!(flags.saw_nested_directory);
    assert_eq!(h.standby_names(), vec!["holiday/beach.jpg"]);
}

#[tokio::test]
async fn test_mixed_selection_keeps_input_order() {
    let h = TestHarness::new();
    let loose = h.inspector.png("/desk/z.png", 5);
    h.inspector.jpeg("/desk/album/a.jpg", 5);

    h.orchestrator
        .ingest(&[loose, PathBuf::from("/desk/album")])
        .await
        .unwrap();

    assert_eq!(h.standby_names(), vec!["z.png", "album/a.jpg"]);
}

#[tokio::test]
async fn test_ingesting_same_path_twice_is_idempotent() {
    let h = TestHarness::new();
    let a = h.inspector.jpeg("/in/a.jpg", 10);

    let first = h.orchestrator.ingest(&[a.clone()]).await.unwrap();
    assert!(!first.duplicate_found);

    let second = h.orchestrator.ingest(&[a.clone()]).await.unwrap();
    assert!(second.duplicate_found);
    assert!(second.result_was_empty);
    assert_eq!(second.skipped, 1);
    assert_eq!(h.orchestrator.standby().len(), 1);

    // listed twice in one call
    let h = TestHarness::new();
    let a = h.inspector.jpeg("/in/a.jpg", 10);
    let flags = h.orchestrator.ingest(&[a.clone(), a]).await.unwrap();
    assert!(flags.duplicate_found);
    assert_eq!(flags.added, 1);
}

#[tokio::test]
async fn test_unsupported_missing_and_unreadable_files() {
    let h = TestHarness::new();
    let gif = h.inspector.file("/in/anim.gif", "image/gif", 10);
    let unreadable = h.inspector.jpeg("/in/locked.jpg", 10);
    h.inspector.make_unreadable(&unreadable);
    let missing = PathBuf::from("/in/vanished.jpg");
    let ok = h.inspector.jpeg("/in/ok.jpg", 10);

    let flags = h
        .orchestrator
        .ingest(&[gif, unreadable, missing, ok])
        .await
        .unwrap();

    assert!(flags.unsupported_found);
    assert!(!flags.duplicate_found);
    assert_eq!(flags.added, 1);
    assert_eq!(flags.skipped, 3);
    assert_eq!(h.standby_names(), vec!["ok.jpg"]);

    let progress = h.orchestrator.progress();
    assert_eq!(progress.status, Status::Idle);
    assert_eq!(progress.count, 4);
    assert_eq!(progress.total, 4);
}

#[tokio::test]
async fn test_only_unsupported_files_gives_empty_result() {
    let h = TestHarness::new();
    let text = h.inspector.file("/in/notes.txt", "text/plain", 3);

    let flags = h.orchestrator.ingest(&[text]).await.unwrap();

    assert!(flags.result_was_empty);
    assert!(flags.unsupported_found);
    assert!(h.orchestrator.standby().is_empty());
}

#[tokio::test]
async fn test_empty_selection_is_noop() {
    let h = TestHarness::new();
    let mut events = h.orchestrator.subscribe();

    let flags = h.orchestrator.ingest(&[]).await.unwrap();

    assert!(flags.result_was_empty);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_ids_are_stable_per_path() {
    let h = TestHarness::new();
    let a = h.inspector.jpeg("/in/a.jpg", 10);

    h.orchestrator.ingest(&[a.clone()]).await.unwrap();
    let id = h.orchestrator.standby()[0].id;
    assert_eq!(id, EntryId::from_path(&a));

    h.orchestrator.remove_item(id);
    h.orchestrator.ingest(&[a]).await.unwrap();
    assert_eq!(h.orchestrator.standby()[0].id, id);
}

#[tokio::test]
async fn test_reingesting_converted_path_supersedes_completed_record() {
    let h = TestHarness::new();
    let a = h.inspector.jpeg("/in/a.jpg", 10);
    let b = h.inspector.jpeg("/in/b.jpg", 10);

    h.orchestrator.ingest(&[a.clone(), b]).await.unwrap();
    h.orchestrator.convert().await.unwrap();
    assert_eq!(h.orchestrator.complete().len(), 2);

    let flags = h.orchestrator.ingest(&[a.clone()]).await.unwrap();
    assert_eq!(flags.added, 1);

    let id = EntryId::from_path(&a);
    assert!(h.orchestrator.standby().iter().any(|e| e.id == id));
    assert_eq!(h.complete_names(), vec!["b.webp"]);
    assert_eq!(h.orchestrator.backup().len(), 1);
}

#[tokio::test]
async fn test_ingest_rejected_while_converting() {
    let h = TestHarness::new();
    let a = h.inspector.jpeg("/in/a.jpg", 10);
    let b = h.inspector.jpeg("/in/b.jpg", 10);
    h.orchestrator.ingest(&[a]).await.unwrap();
    h.engine.script(EngineScript::ConvertAll);

    let gate = h.engine.hold();
    let orchestrator = h.orchestrator.clone();
    let task = tokio::spawn(async move { orchestrator.convert().await });
    h.wait_until_locked().await;

    assert_matches!(h.orchestrator.ingest(&[b]).await, Err(Error::Busy(_)));

    gate.notify_one();
    let outcome = task.await.unwrap().unwrap();
    assert!(outcome.is_success());
    assert!(!h.orchestrator.is_locked());
}

#[tokio::test]
async fn test_ingest_emits_events() {
    let h = TestHarness::new();
    let a = h.inspector.jpeg("/in/a.jpg", 10);
    let mut events = h.orchestrator.subscribe();

    h.orchestrator.ingest(&[a]).await.unwrap();

    let mut payloads = Vec::new();
    while let Ok(event) = events.try_recv() {
        payloads.push(event.payload);
    }
    assert_matches!(
        payloads.first(),
        Some(EventPayload::StatusChanged {
            status: Status::Loading
        })
    );
    assert!(payloads
        .iter()
        .any(|p| matches!(p, EventPayload::EntriesAdded { ids } if ids.len() == 1)));
    assert_matches!(
        payloads.last(),
        Some(EventPayload::StatusChanged {
            status: Status::Idle
        })
    );
}

#[tokio::test]
async fn test_relative_selection_matches_absolute_path() {
    let h = TestHarness::new();
    let absolute = std::env::current_dir().unwrap().join("shots").join("a.jpg");
    h.inspector.jpeg(absolute.to_str().unwrap(), 10);

    let first = h
        .orchestrator
        .ingest(&[PathBuf::from("shots/a.jpg")])
        .await
        .unwrap();
    assert_eq!(first.added, 1);
    let standby = h.orchestrator.standby();
    assert_eq!(standby[0].path, absolute);
    assert_eq!(standby[0].id, EntryId::from_path(&absolute));

    let second = h.orchestrator.ingest(&[absolute]).await.unwrap();
    assert!(second.duplicate_found);
    assert_eq!(h.orchestrator.standby().len(), 1);
}
