//! Tests for the catalog store (use in-memory DB helper from db).

use crate::catalog::db::open_memory;
use crate::catalog::{ListFilter, NewEntry};

fn entry(source_ref: &str, file_path: &str) -> NewEntry {
    NewEntry {
        source_ref: source_ref.to_string(),
        file_path: file_path.to_string(),
        file_size: 1024,
    }
}

#[tokio::test]
async fn lookup_miss_on_empty_catalog() {
    let store = open_memory().await.unwrap();
    assert!(store.lookup("https://example.com/a").await.unwrap().is_none());
}

#[tokio::test]
async fn record_then_lookup_roundtrip() {
    let store = open_memory().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("track.mp3");
    std::fs::write(&file, b"audio").unwrap();

    let recorded = store
        .record(&entry("https://example.com/a", file.to_str().unwrap()))
        .await
        .unwrap();
    assert_eq!(recorded.source_ref, "https://example.com/a");

    let hit = store.lookup("https://example.com/a").await.unwrap().unwrap();
    assert!(hit.file_present);
    assert_eq!(hit.entry.id, recorded.id);
    assert_eq!(hit.entry.file_size, 1024);
    assert!(hit.entry.completed_at > 0);
}

#[tokio::test]
async fn lookup_detects_stale_entry_when_file_missing() {
    let store = open_memory().await.unwrap();
    store
        .record(&entry("https://example.com/gone", "/nonexistent/path/track.mp3"))
        .await
        .unwrap();

    let hit = store.lookup("https://example.com/gone").await.unwrap().unwrap();
    assert!(!hit.file_present);
}

#[tokio::test]
async fn record_upserts_on_source_ref() {
    let store = open_memory().await.unwrap();
    let first = store
        .record(&entry("https://example.com/a", "/tmp/old.mp3"))
        .await
        .unwrap();
    let second = store
        .record(&NewEntry {
            source_ref: "https://example.com/a".to_string(),
            file_path: "/tmp/new.mp3".to_string(),
            file_size: 2048,
        })
        .await
        .unwrap();

    // Same logical row: source_ref still maps to exactly one entry.
    assert_eq!(first.id, second.id);
    assert_eq!(second.file_path, "/tmp/new.mp3");
    assert_eq!(second.file_size, 2048);

    let all = store.list(&ListFilter::default()).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn list_filters_by_substring() {
    let store = open_memory().await.unwrap();
    store
        .record(&entry("https://example.com/alpha", "/music/alpha.mp3"))
        .await
        .unwrap();
    store
        .record(&entry("https://example.com/beta", "/music/beta.mp3"))
        .await
        .unwrap();

    let all = store.list(&ListFilter::default()).await.unwrap();
    assert_eq!(all.len(), 2);

    let filtered = store
        .list(&ListFilter { contains: Some("alpha".to_string()) })
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].source_ref, "https://example.com/alpha");

    let none = store
        .list(&ListFilter { contains: Some("zeta".to_string()) })
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn clear_removes_everything() {
    let store = open_memory().await.unwrap();
    store.record(&entry("https://example.com/a", "/tmp/a.mp3")).await.unwrap();
    store.record(&entry("https://example.com/b", "/tmp/b.mp3")).await.unwrap();

    let n = store.clear().await.unwrap();
    assert_eq!(n, 2);
    assert!(store.list(&ListFilter::default()).await.unwrap().is_empty());
    assert!(store.lookup("https://example.com/a").await.unwrap().is_none());
}
