// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Remote document store integration.
//!
//! Defines the seam between the sync core and the hierarchical cloud store.
//! The core only ever talks to a [`RemoteStore`]; [`GraphStore`] is the HTTP
//! implementation and tests plug in in-memory mocks.
//!
//! # Example
//!
//! ```rust,no_run
//! use floodgate_sync::store::{BoxFuture, BatchLookupItem, ChildEntry, RemoteStore, StoreKind};
//! use bytes::Bytes;
//!
//! struct EmptyStore;
//!
//! impl RemoteStore for EmptyStore {
//!     fn copy<'a>(&'a self, _src: &'a str, _folder: &'a str, _name: Option<&'a str>, _target: StoreKind) -> BoxFuture<'a, ()> {
//!         Box::pin(async { Ok(()) })
//!     }
//!     fn read<'a>(&'a self, _path: &'a str, _store: StoreKind) -> BoxFuture<'a, Option<Bytes>> {
//!         Box::pin(async { Ok(None) })
//!     }
//!     fn write<'a>(&'a self, _content: Bytes, _path: &'a str, _store: StoreKind) -> BoxFuture<'a, ()> {
//!         Box::pin(async { Ok(()) })
//!     }
//!     fn batch_status<'a>(&'a self, _paths: &'a [String], _first_id: usize, _store: StoreKind) -> BoxFuture<'a, Vec<BatchLookupItem>> {
//!         Box::pin(async { Ok(Vec::new()) })
//!     }
//!     fn list_children<'a>(&'a self, _folder: &'a str, _store: StoreKind) -> BoxFuture<'a, Vec<ChildEntry>> {
//!         Box::pin(async { Ok(Vec::new()) })
//!     }
//! }
//! ```

mod graph;

pub use graph::{parse_batch_response, parse_children_page, ChildrenPage, GraphStore};

use crate::error::Result;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// Type alias for boxed async futures (reduces trait signature complexity).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Which tree of the store a call addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// The authored (regular) tree.
    Primary,
    /// The preview (floodgate) tree.
    Preview,
}

impl StoreKind {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Preview => "preview",
        }
    }
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a batch status response.
///
/// `id` is the identifier the caller assigned to the request; it is the only
/// reliable way to correlate an entry back to its path.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchLookupItem {
    pub id: String,
    pub status: u16,
    pub body: Option<serde_json::Value>,
}

/// Kind of a children-listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    Folder,
    File { mime_type: Option<String> },
}

/// One child of a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEntry {
    pub name: String,
    pub kind: EntryKind,
    /// Store-level path of the parent, e.g. `/drive/root:/bacom/drafts`.
    pub parent_path: String,
    pub download_url: Option<String>,
}

impl ChildEntry {
    pub fn is_folder(&self) -> bool {
        matches!(self.kind, EntryKind::Folder)
    }

    /// MIME type if this is a file that declares one.
    pub fn mime_type(&self) -> Option<&str> {
        match &self.kind {
            EntryKind::File { mime_type } => mime_type.as_deref(),
            EntryKind::Folder => None,
        }
    }
}

/// Trait defining what the sync core needs from the document store.
///
/// Every method takes the [`StoreKind`] it addresses. Paths are relative to the
/// tree root and start with `/`.
///
/// Not-found is not an error: `read` returns `Ok(None)`, `batch_status`
/// reports the status per entry. `copy` and `write` return an error for any
/// non-success answer.
pub trait RemoteStore: Send + Sync + 'static {
    /// Copy `source_path` (primary tree) into `dest_folder` of the `target`
    /// tree, optionally renaming. Fails if the destination already exists.
    fn copy<'a>(
        &'a self,
        source_path: &'a str,
        dest_folder: &'a str,
        new_name: Option<&'a str>,
        target: StoreKind,
    ) -> BoxFuture<'a, ()>;

    /// Read the full content of a document.
    fn read<'a>(&'a self, path: &'a str, store: StoreKind) -> BoxFuture<'a, Option<Bytes>>;

    /// Create or overwrite a document.
    fn write<'a>(&'a self, content: Bytes, dest_path: &'a str, store: StoreKind) -> BoxFuture<'a, ()>;

    /// Look up the status of several paths in one request.
    ///
    /// Request `i` carries id `first_id + i`. Entries may come back in any
    /// order, and some may be missing.
    fn batch_status<'a>(
        &'a self,
        paths: &'a [String],
        first_id: usize,
        store: StoreKind,
    ) -> BoxFuture<'a, Vec<BatchLookupItem>>;

    /// List the children of a folder (`""` is the tree root).
    fn list_children<'a>(&'a self, folder: &'a str, store: StoreKind) -> BoxFuture<'a, Vec<ChildEntry>>;
}
