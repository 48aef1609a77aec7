//! In-memory RemoteStore for testing.
//!
//! Holds one file tree per StoreKind, records every call, and can be told to
//! fail specific operations or to scramble batch responses.

use bytes::Bytes;
use floodgate_sync::config::StoreConfig;
use floodgate_sync::error::SyncError;
use floodgate_sync::store::{BatchLookupItem, BoxFuture, ChildEntry, EntryKind, RemoteStore, StoreKind};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// A recorded store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Copy {
        source: String,
        dest_folder: String,
        new_name: Option<String>,
        target: StoreKind,
    },
    Read {
        path: String,
        store: StoreKind,
    },
    Write {
        path: String,
        store: StoreKind,
    },
    BatchStatus {
        paths: Vec<String>,
        first_id: usize,
        store: StoreKind,
    },
    ListChildren {
        folder: String,
        store: StoreKind,
    },
}

#[derive(Default)]
struct Failures {
    copy_sources: HashSet<String>,
    read_paths: HashSet<String>,
    write_paths: HashSet<String>,
    batch_first_ids: HashSet<usize>,
    list_folders: HashSet<String>,
    dropped_ids: HashSet<String>,
}

/// Mock implementation of RemoteStore backed by two in-memory trees.
///
/// # Example
/// ```rust,ignore
/// let store = MockStore::new();
/// store.add_file(StoreKind::Primary, "/a/page.docx", "hello").await;
/// store.fail_copy("/a/page.docx").await;
///
/// // Use in tests...
///
/// assert_eq!(store.copies().await.len(), 1);
/// ```
pub struct MockStore {
    primary: RwLock<BTreeMap<String, Bytes>>,
    preview: RwLock<BTreeMap<String, Bytes>>,
    calls: RwLock<Vec<StoreCall>>,
    failures: RwLock<Failures>,
    config: StoreConfig,
    reverse_batches: AtomicBool,
    delay: RwLock<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    copy_starts: Mutex<Vec<Instant>>,
    batch_delay: RwLock<Duration>,
    batch_in_flight: AtomicUsize,
    max_batch_in_flight: AtomicUsize,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            primary: RwLock::new(BTreeMap::new()),
            preview: RwLock::new(BTreeMap::new()),
            calls: RwLock::new(Vec::new()),
            failures: RwLock::new(Failures::default()),
            config: StoreConfig::default(),
            reverse_batches: AtomicBool::new(false),
            delay: RwLock::new(Duration::ZERO),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            copy_starts: Mutex::new(Vec::new()),
            batch_delay: RwLock::new(Duration::ZERO),
            batch_in_flight: AtomicUsize::new(0),
            max_batch_in_flight: AtomicUsize::new(0),
        }
    }

    fn tree(&self, store: StoreKind) -> &RwLock<BTreeMap<String, Bytes>> {
        match store {
            StoreKind::Primary => &self.primary,
            StoreKind::Preview => &self.preview,
        }
    }

    // =========================================================================
    // Setup
    // =========================================================================

    pub async fn add_file(&self, store: StoreKind, path: &str, content: impl Into<Bytes>) {
        self.tree(store).write().await.insert(path.to_string(), content.into());
    }

    /// Return batch entries in reverse order.
    pub fn reverse_batch_responses(&self) {
        self.reverse_batches.store(true, Ordering::SeqCst);
    }

    /// Delay every copy/read/write by `delay`.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    /// Delay every batch_status call by `delay`.
    pub async fn set_batch_delay(&self, delay: Duration) {
        *self.batch_delay.write().await = delay;
    }

    pub async fn fail_copy(&self, source: &str) {
        self.failures.write().await.copy_sources.insert(source.to_string());
    }

    pub async fn fail_read(&self, path: &str) {
        self.failures.write().await.read_paths.insert(path.to_string());
    }

    pub async fn fail_write(&self, path: &str) {
        self.failures.write().await.write_paths.insert(path.to_string());
    }

    pub async fn fail_batch(&self, first_id: usize) {
        self.failures.write().await.batch_first_ids.insert(first_id);
    }

    pub async fn fail_list(&self, folder: &str) {
        self.failures.write().await.list_folders.insert(folder.to_string());
    }

    /// Leave the entry with this id out of batch responses.
    pub async fn drop_batch_id(&self, id: usize) {
        self.failures.write().await.dropped_ids.insert(id.to_string());
    }

    // =========================================================================
    // Query Methods
    // =========================================================================

    pub async fn file(&self, store: StoreKind, path: &str) -> Option<Bytes> {
        self.tree(store).read().await.get(path).cloned()
    }

    pub async fn has_file(&self, store: StoreKind, path: &str) -> bool {
        self.tree(store).read().await.contains_key(path)
    }

    pub async fn calls(&self) -> Vec<StoreCall> {
        self.calls.read().await.clone()
    }

    pub async fn copies(&self) -> Vec<StoreCall> {
        self.calls_matching(|c| matches!(c, StoreCall::Copy { .. })).await
    }

    pub async fn reads(&self) -> Vec<StoreCall> {
        self.calls_matching(|c| matches!(c, StoreCall::Read { .. })).await
    }

    pub async fn writes(&self) -> Vec<StoreCall> {
        self.calls_matching(|c| matches!(c, StoreCall::Write { .. })).await
    }

    pub async fn batch_calls(&self) -> Vec<StoreCall> {
        self.calls_matching(|c| matches!(c, StoreCall::BatchStatus { .. })).await
    }

    pub async fn list_calls(&self) -> Vec<StoreCall> {
        self.calls_matching(|c| matches!(c, StoreCall::ListChildren { .. })).await
    }

    /// Highest number of copy/read/write calls that were in progress at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of batch_status calls that were in progress at once.
    pub fn max_batch_in_flight(&self) -> usize {
        self.max_batch_in_flight.load(Ordering::SeqCst)
    }

    /// When each copy call arrived, in arrival order.
    pub fn copy_starts(&self) -> Vec<Instant> {
        self.copy_starts.lock().unwrap().clone()
    }

    async fn calls_matching(&self, f: impl Fn(&StoreCall) -> bool) -> Vec<StoreCall> {
        self.calls.read().await.iter().filter(|c| f(c)).cloned().collect()
    }

    async fn record(&self, call: StoreCall) {
        self.calls.write().await.push(call);
    }

    async fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn item_body(path: &str) -> serde_json::Value {
        let name = path.rsplit('/').next().unwrap_or(path);
        json!({
            "name": name,
            "webUrl": format!("https://store.test{}", path),
            "lastModifiedDateTime": "2024-05-01T10:00:00Z",
            "lastModifiedBy": { "user": { "displayName": "Mock Author" } }
        })
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

fn join(folder: &str, name: &str) -> String {
    format!("{}/{}", folder, name)
}

impl RemoteStore for MockStore {
    fn copy<'a>(
        &'a self,
        source_path: &'a str,
        dest_folder: &'a str,
        new_name: Option<&'a str>,
        target: StoreKind,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.copy_starts.lock().unwrap().push(Instant::now());
            self.record(StoreCall::Copy {
                source: source_path.to_string(),
                dest_folder: dest_folder.to_string(),
                new_name: new_name.map(str::to_string),
                target,
            })
            .await;
            self.enter().await;
            let result: floodgate_sync::Result<()> = async {
                if self.failures.read().await.copy_sources.contains(source_path) {
                    return Err(SyncError::transport_msg("copy", "injected failure"));
                }
                let content = self
                    .file(StoreKind::Primary, source_path)
                    .await
                    .ok_or_else(|| SyncError::remote_status("copy", 404))?;
                let name = new_name.unwrap_or_else(|| source_path.rsplit('/').next().unwrap_or(source_path));
                let destination = join(dest_folder, name);
                let mut tree = self.tree(target).write().await;
                if tree.contains_key(&destination) {
                    return Err(SyncError::remote_status("copy", 409));
                }
                tree.insert(destination, content);
                Ok(())
            }
            .await;
            self.leave();
            result
        })
    }

    fn read<'a>(&'a self, path: &'a str, store: StoreKind) -> BoxFuture<'a, Option<Bytes>> {
        Box::pin(async move {
            self.record(StoreCall::Read {
                path: path.to_string(),
                store,
            })
            .await;
            self.enter().await;
            let result = if self.failures.read().await.read_paths.contains(path) {
                Err(SyncError::transport_msg("read", "injected failure"))
            } else {
                Ok(self.file(store, path).await)
            };
            self.leave();
            result
        })
    }

    fn write<'a>(&'a self, content: Bytes, dest_path: &'a str, store: StoreKind) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.record(StoreCall::Write {
                path: dest_path.to_string(),
                store,
            })
            .await;
            self.enter().await;
            let result = if self.failures.read().await.write_paths.contains(dest_path) {
                Err(SyncError::remote_status("write", 500))
            } else {
                self.tree(store).write().await.insert(dest_path.to_string(), content);
                Ok(())
            };
            self.leave();
            result
        })
    }

    fn batch_status<'a>(
        &'a self,
        paths: &'a [String],
        first_id: usize,
        store: StoreKind,
    ) -> BoxFuture<'a, Vec<BatchLookupItem>> {
        Box::pin(async move {
            self.record(StoreCall::BatchStatus {
                paths: paths.to_vec(),
                first_id,
                store,
            })
            .await;
            let now = self.batch_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_batch_in_flight.fetch_max(now, Ordering::SeqCst);
            let delay = *self.batch_delay.read().await;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            self.batch_in_flight.fetch_sub(1, Ordering::SeqCst);

            let failures = self.failures.read().await;
            if failures.batch_first_ids.contains(&first_id) {
                return Err(SyncError::transport_msg("batch_status", "injected failure"));
            }

            let tree = self.tree(store).read().await;
            let mut items: Vec<BatchLookupItem> = paths
                .iter()
                .enumerate()
                .map(|(i, path)| {
                    let found = tree.contains_key(path);
                    BatchLookupItem {
                        id: (first_id + i).to_string(),
                        status: if found { 200 } else { 404 },
                        body: Some(if found {
                            Self::item_body(path)
                        } else {
                            json!({ "error": { "code": "itemNotFound" } })
                        }),
                    }
                })
                .filter(|item| !failures.dropped_ids.contains(&item.id))
                .collect();
            if self.reverse_batches.load(Ordering::SeqCst) {
                items.reverse();
            }
            Ok(items)
        })
    }

    fn list_children<'a>(&'a self, folder: &'a str, store: StoreKind) -> BoxFuture<'a, Vec<ChildEntry>> {
        Box::pin(async move {
            self.record(StoreCall::ListChildren {
                folder: folder.to_string(),
                store,
            })
            .await;
            if self.failures.read().await.list_folders.contains(folder) {
                return Err(SyncError::remote_status("list_children", 503));
            }

            let parent_path = format!("{}{}", self.config.parent_reference_prefix(store), folder);
            let prefix = format!("{}/", folder);
            let tree = self.tree(store).read().await;

            let mut folders = BTreeSet::new();
            let mut entries = Vec::new();
            for path in tree.keys() {
                let Some(rest) = path.strip_prefix(&prefix) else {
                    continue;
                };
                match rest.split_once('/') {
                    Some((sub, _)) => {
                        folders.insert(sub.to_string());
                    }
                    None => {
                        let mime = if rest.ends_with(".docx") { DOCX_MIME } else { "text/plain" };
                        entries.push(ChildEntry {
                            name: rest.to_string(),
                            kind: EntryKind::File {
                                mime_type: Some(mime.to_string()),
                            },
                            parent_path: parent_path.clone(),
                            download_url: Some(format!("https://download.test{}", path)),
                        });
                    }
                }
            }
            entries.extend(folders.into_iter().map(|name| ChildEntry {
                name,
                kind: EntryKind::Folder,
                parent_path: parent_path.clone(),
                download_url: None,
            }));
            Ok(entries)
        })
    }
}
