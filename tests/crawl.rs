// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Integration tests: tree crawling and bulk migration.

mod common;

use common::{MockStore, StoreCall};
use floodgate_sync::config::{CrawlConfig, StoreConfig, SyncConfig};
use floodgate_sync::crawler::{CrawlFrontier, TreeCrawler};
use floodgate_sync::error::SyncError;
use floodgate_sync::migrate::migrate_tree;
use floodgate_sync::replicator::{CopyMode, Variant};
use floodgate_sync::store::StoreKind;
use std::sync::Arc;
use std::time::Duration;

fn crawler(store: &Arc<MockStore>) -> TreeCrawler<MockStore> {
    TreeCrawler::new(Arc::clone(store), StoreConfig::default(), CrawlConfig::default())
}

// =============================================================================
// Crawl
// =============================================================================

#[tokio::test]
async fn crawl_finds_nested_documents_and_drains_frontier() {
    let store = Arc::new(MockStore::new());
    store.add_file(StoreKind::Primary, "/a/file1.docx", "1").await;
    store.add_file(StoreKind::Primary, "/a/b/file2.docx", "2").await;

    let frontier = crawler(&store).crawl(StoreKind::Primary).await.unwrap();

    assert!(frontier.is_drained());
    let mut paths: Vec<&str> = frontier.documents.iter().map(|d| d.path.as_str()).collect();
    paths.sort_unstable();
    assert_eq!(
        paths,
        vec!["/drive/root:/bacom/a/b/file2.docx", "/drive/root:/bacom/a/file1.docx"]
    );
    assert_eq!(frontier.visited_folders, 3);
    assert!(frontier.failed_folders.is_empty());
    assert_eq!(
        frontier.documents[0].download_url.as_deref(),
        Some("https://download.test/a/file1.docx")
    );
}

#[tokio::test]
async fn crawl_is_breadth_first() {
    let store = Arc::new(MockStore::new());
    store.add_file(StoreKind::Primary, "/a/x/deep.docx", "").await;
    store.add_file(StoreKind::Primary, "/b/top.docx", "").await;

    crawler(&store).crawl(StoreKind::Primary).await.unwrap();
    let folders: Vec<String> = store
        .list_calls()
        .await
        .into_iter()
        .filter_map(|c| match c {
            StoreCall::ListChildren { folder, .. } => Some(folder),
            _ => None,
        })
        .collect();
    assert_eq!(folders, vec!["", "/a", "/b", "/a/x"]);
}

#[tokio::test]
async fn crawl_skips_other_mime_types() {
    let store = Arc::new(MockStore::new());
    store.add_file(StoreKind::Preview, "/docs/keep.docx", "").await;
    store.add_file(StoreKind::Preview, "/docs/notes.txt", "").await;

    let frontier = crawler(&store).crawl(StoreKind::Preview).await.unwrap();
    assert_eq!(frontier.documents.len(), 1);
    assert_eq!(
        frontier.documents[0].relative_path("/drive/root:/milo-pink"),
        "/docs/keep.docx"
    );
}

#[tokio::test]
async fn crawl_records_failed_folders_and_continues() {
    let store = Arc::new(MockStore::new());
    store.add_file(StoreKind::Primary, "/bad/lost.docx", "").await;
    store.add_file(StoreKind::Primary, "/good/found.docx", "").await;
    store.fail_list("/bad").await;

    let frontier = crawler(&store).crawl(StoreKind::Primary).await.unwrap();
    assert_eq!(frontier.failed_folders, vec!["/bad".to_string()]);
    assert_eq!(frontier.documents.len(), 1);
    assert!(frontier.documents[0].path.ends_with("/good/found.docx"));
    let summary = frontier.summary(StoreKind::Primary);
    assert_eq!(summary.documents, 1);
    assert_eq!(summary.failed_folders.len(), 1);
}

#[tokio::test]
async fn crawl_from_seeded_frontier() {
    let store = Arc::new(MockStore::new());
    store.add_file(StoreKind::Primary, "/a/one.docx", "").await;
    store.add_file(StoreKind::Primary, "/b/two.docx", "").await;

    let seeded = CrawlFrontier::seeded(vec!["/b".to_string()]);
    let frontier = crawler(&store).crawl_from(seeded, StoreKind::Primary).await.unwrap();
    assert_eq!(frontier.documents.len(), 1);
    assert!(frontier.documents[0].path.ends_with("/b/two.docx"));
    assert_eq!(frontier.visited_folders, 1);
}

#[tokio::test]
async fn crawl_aborts_past_folder_limit() {
    let store = Arc::new(MockStore::new());
    for i in 0..5 {
        store.add_file(StoreKind::Primary, &format!("/f{}/doc.docx", i), "").await;
    }
    let limited = TreeCrawler::new(
        Arc::clone(&store),
        StoreConfig::default(),
        CrawlConfig { max_folders: Some(3) },
    );

    let err = limited.crawl(StoreKind::Primary).await.unwrap_err();
    assert!(matches!(err, SyncError::Internal(_)));
}

#[tokio::test]
async fn concurrent_crawls_do_not_share_state() {
    let store = Arc::new(MockStore::new());
    store.add_file(StoreKind::Primary, "/p/a.docx", "").await;
    store.add_file(StoreKind::Preview, "/q/b.docx", "").await;
    store.add_file(StoreKind::Preview, "/q/c.docx", "").await;

    let c = crawler(&store);
    let (primary, preview) = tokio::join!(c.crawl(StoreKind::Primary), c.crawl(StoreKind::Preview));
    assert_eq!(primary.unwrap().documents.len(), 1);
    assert_eq!(preview.unwrap().documents.len(), 2);
}

// =============================================================================
// Migration
// =============================================================================

#[tokio::test]
async fn migrate_to_preview_copies_and_overwrites() {
    let store = Arc::new(MockStore::new());
    store.add_file(StoreKind::Primary, "/a/new.docx", "new").await;
    store.add_file(StoreKind::Primary, "/a/b/changed.docx", "v2").await;
    store.add_file(StoreKind::Preview, "/a/b/changed.docx", "v1").await;

    let report = migrate_tree(Arc::clone(&store), &SyncConfig::for_testing(), Variant::Preview)
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.crawl.documents, 2);
    assert_eq!(report.replication.results.len(), 2);
    let changed = report
        .replication
        .results
        .iter()
        .find(|r| r.source_path == "/a/b/changed.docx")
        .unwrap();
    assert_eq!(changed.mode, CopyMode::Overwrite);
    assert_eq!(store.file(StoreKind::Preview, "/a/new.docx").await.unwrap(), "new");
    assert_eq!(store.file(StoreKind::Preview, "/a/b/changed.docx").await.unwrap(), "v2");
}

#[tokio::test]
async fn migrate_to_child_skips_existing_child_folders() {
    let store = Arc::new(MockStore::new());
    store.add_file(StoreKind::Primary, "/a/page.docx", "p").await;
    store.add_file(StoreKind::Primary, "/a/child/page.docx", "old").await;

    let report = migrate_tree(Arc::clone(&store), &SyncConfig::for_testing(), Variant::Child)
        .await
        .unwrap();

    assert_eq!(report.crawl.documents, 2);
    assert_eq!(report.replication.results.len(), 1);
    assert_eq!(report.replication.results[0].destination_path, "/a/child/page.docx");
    assert_eq!(report.replication.results[0].mode, CopyMode::Overwrite);
    assert!(report.is_success());
    assert!(!store.has_file(StoreKind::Primary, "/a/child/child/page.docx").await);
}

#[tokio::test]
async fn migrate_bounds_concurrent_status_batches() {
    let store = Arc::new(MockStore::new());
    store.set_batch_delay(Duration::from_millis(10)).await;
    for i in 0..60 {
        store.add_file(StoreKind::Primary, &format!("/bulk/d{}.docx", i), "x").await;
    }

    let mut config = SyncConfig::for_testing();
    config.store.max_concurrent_batches = 3;
    let report = migrate_tree(Arc::clone(&store), &config, Variant::Preview)
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.replication.results.len(), 60);
    assert_eq!(store.batch_calls().await.len(), 30);
    assert!(
        store.max_batch_in_flight() <= 3,
        "max batch calls in flight {}",
        store.max_batch_in_flight()
    );
    assert!(store.max_batch_in_flight() >= 1);
}
