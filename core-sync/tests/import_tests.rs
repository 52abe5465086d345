//! Import pipeline: destination choice, deduplication, upload and indexing.

mod common;

use common::{Harness, START_MILLIS};
use core_runtime::events::{CoreEvent, LibraryEvent};
use core_sync::import::content_hash;
use core_sync::{ResolverRegistry, RootRelativePath, SyncConfig, SyncError};
use std::path::Path;

const INBOX: &str = "/external/inbox";

fn source(name: &str) -> std::path::PathBuf {
    Path::new(INBOX).join(name)
}

#[core_async::test]
async fn test_import_new_file_uploads_and_indexes() {
    let h = Harness::local().await;
    h.fs.add_file(source("report.txt"), "quarterly numbers", 5);
    h.clock.set_millis(START_MILLIS + 99);

    let identifier = h
        .coordinator
        .import_file(&source("report.txt"), Some("https://example.com/report.txt"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(identifier, "local://report.txt");
    assert_eq!(
        h.fs.file(h.local_path("report.txt")).unwrap().as_ref(),
        b"quarterly numbers"
    );

    let record = h.record(&identifier).await.unwrap();
    assert!(record.physical_media);
    assert_eq!(record.publication_date, Some(START_MILLIS + 99));
    assert_eq!(record.source_url.as_deref(), Some("https://example.com/report.txt"));
    assert_eq!(record.mime_type, "text/plain");
}

#[core_async::test]
async fn test_import_identical_content_skips_upload() {
    let h = Harness::local().await;
    h.fs.add_file(h.local_path("report.txt"), "same bytes", 1);
    completed_refresh(&h).await;
    let before = h.record("local://report.txt").await.unwrap();

    h.fs.add_file(source("report.txt"), "same bytes", 50);
    h.fs.set_write_time(777);
    let mut events = h.events.subscribe();

    let identifier = h
        .coordinator
        .import_file(&source("report.txt"), None)
        .await
        .unwrap();

    assert_eq!(identifier.as_deref(), Some("local://report.txt"));
    assert_eq!(h.fs.files_under(common::LOCAL_ROOT).len(), 1);
    // No upload happened, so the stored mtime is untouched.
    let after = h.record("local://report.txt").await.unwrap();
    assert_eq!(after.last_refreshed, before.last_refreshed);
    assert!(after.physical_media);

    let mut saw_dedup = false;
    while let Ok(event) = events.try_recv() {
        if let CoreEvent::Library(LibraryEvent::FileImported { deduplicated, .. }) = event {
            saw_dedup = deduplicated;
        }
    }
    assert!(saw_dedup);
}

#[core_async::test]
async fn test_import_distinct_content_gets_hash_suffix() {
    let h = Harness::local().await;
    h.fs.add_file(h.local_path("report.txt"), "old draft", 1);
    completed_refresh(&h).await;

    h.fs.add_file(source("report.txt"), "final version", 2);
    let identifier = h
        .coordinator
        .import_file(&source("report.txt"), None)
        .await
        .unwrap()
        .unwrap();

    let hash6 = &content_hash(b"final version")[..6];
    assert!(hash6.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    let expected_name = format!("report ({hash6}).txt");
    assert_eq!(
        identifier,
        format!("local://report%20%28{hash6}%29.txt")
    );
    assert_eq!(
        h.fs.file(h.local_path(&expected_name)).unwrap().as_ref(),
        b"final version"
    );
    assert_eq!(
        h.fs.file(h.local_path("report.txt")).unwrap().as_ref(),
        b"old draft"
    );

    let record = h.record(&identifier).await.unwrap();
    assert_eq!(record.title, format!("report ({hash6})"));
    assert_eq!(h.live_ids().await.len(), 2);
}

#[core_async::test]
async fn test_reimport_of_renamed_copy_is_deduplicated() {
    let h = Harness::local().await;
    h.fs.add_file(h.local_path("report.txt"), "old draft", 1);
    h.fs.add_file(source("report.txt"), "final version", 2);

    let first = h
        .coordinator
        .import_file(&source("report.txt"), None)
        .await
        .unwrap();
    let second = h
        .coordinator
        .import_file(&source("report.txt"), None)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(h.fs.files_under(common::LOCAL_ROOT).len(), 2);
}

#[core_async::test]
async fn test_differing_content_at_renamed_target_is_replaced() {
    let h = Harness::builder()
        .config(SyncConfig {
            hash_length: 1,
            ..SyncConfig::default()
        })
        .build()
        .await;
    let hash1 = &content_hash(b"final version")[..1];
    let renamed = format!("report ({hash1}).txt");
    h.fs.add_file(h.local_path("report.txt"), "old draft", 1);
    h.fs.add_file(h.local_path(&renamed), "an unrelated edit", 1);
    h.fs.add_file(source("report.txt"), "final version", 2);

    let identifier = h
        .coordinator
        .import_file(&source("report.txt"), None)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(identifier, format!("local://report%20%28{hash1}%29.txt"));
    assert_eq!(
        h.fs.file(h.local_path(&renamed)).unwrap().as_ref(),
        b"final version"
    );
    assert_eq!(
        h.fs.file(h.local_path("report.txt")).unwrap().as_ref(),
        b"old draft"
    );
    assert_eq!(h.fs.files_under(common::LOCAL_ROOT).len(), 2);
}

#[core_async::test]
async fn test_import_prefers_cloud_drive() {
    let h = Harness::builder().with_cloud().build().await;
    h.fs.add_file(source("notes.md"), "# notes", 1);

    let identifier = h
        .coordinator
        .import_file(&source("notes.md"), None)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(identifier, "icloud://notes.md");
    assert!(h.fs.file(h.cloud_path("notes.md")).is_some());
    assert!(h.fs.file(h.local_path("notes.md")).is_none());
}

#[core_async::test]
async fn test_destination_resolver_places_file() {
    let registry = ResolverRegistry::new().with_destination_resolver(|file: &Path| {
        (file.extension()? == "opml").then(|| RootRelativePath::new("Feeds").ok())?
    });
    let h = Harness::builder().registry(registry).build().await;
    h.fs.add_file(source("subs.opml"), "<opml/>", 1);
    h.fs.add_file(source("book.txt"), "text", 1);

    let feeds = h
        .coordinator
        .import_file(&source("subs.opml"), None)
        .await
        .unwrap();
    let book = h
        .coordinator
        .import_file(&source("book.txt"), None)
        .await
        .unwrap();

    assert_eq!(feeds.as_deref(), Some("local://Feeds/subs.opml"));
    assert_eq!(book.as_deref(), Some("local://book.txt"));
}

#[core_async::test]
async fn test_import_directory_package() {
    let h = Harness::local().await;
    h.fs.add_file(source("Novel.epub/mimetype"), "application/epub+zip", 1);
    h.fs.add_file(source("Novel.epub/OEBPS/ch1.xhtml"), "<html/>", 1);

    let identifier = h
        .coordinator
        .import_file(&source("Novel.epub"), None)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(identifier, "local://Novel.epub");
    assert!(h.fs.file(h.local_path("Novel.epub/OEBPS/ch1.xhtml")).is_some());
    let record = h.record(&identifier).await.unwrap();
    assert_eq!(
        record.archive_entries,
        Some(vec!["OEBPS/ch1.xhtml".to_string(), "mimetype".to_string()])
    );

    // Same package again: contents concatenate to the same bytes.
    let again = h
        .coordinator
        .import_file(&source("Novel.epub"), None)
        .await
        .unwrap();
    assert_eq!(again.as_deref(), Some("local://Novel.epub"));
    assert_eq!(h.live_ids().await.len(), 1);
}

#[core_async::test]
async fn test_reimport_package_with_prefix_named_sibling() {
    let h = Harness::local().await;
    // "OEBPS-notes.txt" sorts before "OEBPS/ch1.xhtml" as a string but after
    // it component by component.
    h.fs.add_file(source("Novel.epub/OEBPS/ch1.xhtml"), "<html/>", 1);
    h.fs.add_file(source("Novel.epub/OEBPS-notes.txt"), "notes", 1);

    let first = h
        .coordinator
        .import_file(&source("Novel.epub"), None)
        .await
        .unwrap();
    let again = h
        .coordinator
        .import_file(&source("Novel.epub"), None)
        .await
        .unwrap();

    assert_eq!(first.as_deref(), Some("local://Novel.epub"));
    assert_eq!(again, first);
    assert_eq!(h.live_ids().await, vec!["local://Novel.epub".to_string()]);
    assert_eq!(h.fs.files_under(common::LOCAL_ROOT).len(), 2);
}

#[core_async::test]
async fn test_import_keeps_earlier_publication_date() {
    let h = Harness::local().await;
    h.fs.add_file(source("a.txt"), "a", 1);
    h.coordinator.import_file(&source("a.txt"), None).await.unwrap();

    h.clock.set_millis(START_MILLIS + 10_000);
    h.coordinator
        .import_file(&source("a.txt"), Some("https://mirror.example.com/a.txt"))
        .await
        .unwrap();

    let record = h.record("local://a.txt").await.unwrap();
    assert_eq!(record.publication_date, Some(START_MILLIS));
    assert_eq!(record.source_url.as_deref(), Some("https://mirror.example.com/a.txt"));
}

#[core_async::test]
async fn test_import_failures() {
    let h = Harness::local().await;

    let missing = h
        .coordinator
        .import_file(&source("ghost.txt"), None)
        .await
        .unwrap_err();
    assert!(matches!(missing, SyncError::InvalidInput(_)));

    // Reserved names land on disk but never become records.
    h.fs.add_file(source("cache.tmp"), "scratch", 1);
    let reserved = h
        .coordinator
        .import_file(&source("cache.tmp"), None)
        .await
        .unwrap();
    assert_eq!(reserved, None);
}

#[core_async::test]
async fn test_import_without_connected_drive() {
    let h = Harness::local().await;
    h.coordinator
        .configure_drives(vec![core_sync::Drive::cloud(
            common::CONTAINER_ID,
            None,
            h.fs.clone(),
        )])
        .await;
    h.fs.add_file(source("a.txt"), "a", 1);

    let err = h
        .coordinator
        .import_file(&source("a.txt"), None)
        .await
        .unwrap_err();
    assert!(err.is_drive_unavailable());
}

async fn completed_refresh(h: &Harness) {
    match h.coordinator.refresh_all().await {
        core_sync::RefreshOutcome::Completed(_) => {}
        other => panic!("refresh did not complete: {other:?}"),
    }
}
