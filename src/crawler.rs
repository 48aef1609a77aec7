// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Breadth-first discovery of documents in a store tree.
//!
//! One children listing per folder. Sub-folders go to the back of the
//! frontier; files with the configured MIME type are collected. A folder that
//! cannot be listed is recorded and skipped.
//!
//! Each call owns its [`CrawlFrontier`], so concurrent crawls never share
//! state.

use crate::config::{CrawlConfig, StoreConfig};
use crate::error::{Result, SyncError};
use crate::metrics;
use crate::store::{RemoteStore, StoreKind};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A discovered document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDescriptor {
    pub download_url: Option<String>,
    /// Store-level path: parent reference path + `/` + name.
    pub path: String,
}

impl DocumentDescriptor {
    /// Path relative to the tree root, given the tree's parent reference prefix.
    pub fn relative_path(&self, prefix: &str) -> String {
        strip_root(&self.path, prefix).to_string()
    }
}

/// Work queue and results of one crawl.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlFrontier {
    /// Folders still to list, relative to the tree root (`""` is the root).
    pub folders: VecDeque<String>,
    pub documents: Vec<DocumentDescriptor>,
    pub visited_folders: usize,
    pub failed_folders: Vec<String>,
}

impl CrawlFrontier {
    /// A frontier seeded with the tree root.
    pub fn new() -> Self {
        Self::seeded([String::new()])
    }

    pub fn seeded(folders: impl IntoIterator<Item = String>) -> Self {
        Self {
            folders: folders.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn is_drained(&self) -> bool {
        self.folders.is_empty()
    }

    pub fn summary(&self, store: StoreKind) -> CrawlSummary {
        CrawlSummary {
            store,
            folders_visited: self.visited_folders,
            documents: self.documents.len(),
            failed_folders: self.failed_folders.clone(),
        }
    }
}

/// Counters of a finished crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    pub store: StoreKind,
    pub folders_visited: usize,
    pub documents: usize,
    pub failed_folders: Vec<String>,
}

/// Walks a store tree breadth-first.
pub struct TreeCrawler<S: RemoteStore> {
    store: Arc<S>,
    store_config: StoreConfig,
    config: CrawlConfig,
}

impl<S: RemoteStore> TreeCrawler<S> {
    pub fn new(store: Arc<S>, store_config: StoreConfig, config: CrawlConfig) -> Self {
        Self {
            store,
            store_config,
            config,
        }
    }

    /// Crawl a whole tree from its root.
    pub async fn crawl(&self, store: StoreKind) -> Result<CrawlFrontier> {
        self.crawl_from(CrawlFrontier::new(), store).await
    }

    /// Drain a caller-seeded frontier.
    ///
    /// Fails only when `max_folders` is exceeded.
    #[instrument(skip(self, frontier), fields(store = %store, seeds = frontier.folders.len()))]
    pub async fn crawl_from(&self, mut frontier: CrawlFrontier, store: StoreKind) -> Result<CrawlFrontier> {
        let prefix = self.store_config.parent_reference_prefix(store);
        let mime = self.store_config.document_mime_type.as_str();

        while let Some(folder) = frontier.folders.pop_front() {
            if let Some(max) = self.config.max_folders {
                if frontier.visited_folders >= max {
                    return Err(SyncError::Internal(format!(
                        "crawl of {} tree exceeded {} folders",
                        store, max
                    )));
                }
            }
            frontier.visited_folders += 1;

            let children = match self.store.list_children(&folder, store).await {
                Ok(children) => children,
                Err(e) => {
                    warn!(folder = %folder, error = %e, "Failed to list folder, skipping");
                    frontier.failed_folders.push(folder);
                    continue;
                }
            };

            for child in children {
                let parent = if child.parent_path.is_empty() {
                    format!("{}{}", prefix, folder)
                } else {
                    child.parent_path.clone()
                };

                if child.is_folder() {
                    let path = format!("{}/{}", strip_root(&parent, &prefix), child.name);
                    debug!(folder = %path, "Queued folder");
                    frontier.folders.push_back(path);
                } else if child.mime_type() == Some(mime) {
                    frontier.documents.push(DocumentDescriptor {
                        download_url: child.download_url,
                        path: format!("{}/{}", parent, child.name),
                    });
                }
            }
        }

        metrics::record_crawl(
            store.as_str(),
            frontier.visited_folders,
            frontier.documents.len(),
            frontier.failed_folders.len(),
        );
        info!(
            folders = frontier.visited_folders,
            documents = frontier.documents.len(),
            failed = frontier.failed_folders.len(),
            "Crawl complete"
        );
        Ok(frontier)
    }
}

/// Strip the tree's parent reference prefix; paths outside the tree are kept as-is.
fn strip_root<'a>(path: &'a str, prefix: &str) -> &'a str {
    match path.strip_prefix(prefix) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => path,
    }
}
