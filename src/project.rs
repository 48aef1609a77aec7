// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Project data model.
//!
//! A project is a list of page URLs read from a tabular data file. Each page
//! maps to a [`DocumentReference`] naming the physical documents behind it:
//!
//! ```text
//! https://site.test/drafts/page
//!   ├── doc        /drafts/page.docx          status: { primary, preview }
//!   └── child_doc  /drafts/child/page.docx    status: { primary, preview }
//! ```
//!
//! The preview copy of a page lives at `doc.file_path` in the preview tree, so
//! its status is `doc.status.preview`.
//!
//! # Status
//!
//! Statuses start [`RemoteStatus::Undetermined`] and are only written by the
//! status reconciler. Not-found is a status, never an error.

use crate::error::Result;
use crate::store::StoreKind;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Deserialize;
use url::Url;

// ═══════════════════════════════════════════════════════════════════════════════
// Remote status
// ═══════════════════════════════════════════════════════════════════════════════

/// Metadata of a document that exists in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemMetadata {
    pub name: String,
    pub last_modified_by: Option<String>,
    pub last_modified_at: Option<DateTime<Utc>>,
    pub web_url: Option<String>,
    /// The full item body as returned by the store.
    pub raw: serde_json::Value,
}

impl ItemMetadata {
    /// Extract metadata from a drive item body. Missing fields stay empty.
    pub fn from_item(raw: serde_json::Value) -> Self {
        let name = raw
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let last_modified_by = raw
            .pointer("/lastModifiedBy/user/displayName")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let last_modified_at = raw
            .get("lastModifiedDateTime")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        let web_url = raw
            .get("webUrl")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Self {
            name,
            last_modified_by,
            last_modified_at,
            web_url,
            raw,
        }
    }
}

/// Existence and metadata of one document in one store tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RemoteStatus {
    /// Not looked up yet.
    #[default]
    Undetermined,
    /// Lookup answered 200.
    Found(ItemMetadata),
    /// Lookup answered anything else, or the lookup itself failed.
    NotFound { status: Option<u16> },
}

impl RemoteStatus {
    /// Build a status from one batch lookup answer. Found iff `status == 200`.
    pub fn from_lookup(status: u16, body: Option<serde_json::Value>) -> Self {
        if status == 200 {
            Self::Found(ItemMetadata::from_item(body.unwrap_or(serde_json::Value::Null)))
        } else {
            Self::NotFound {
                status: Some(status),
            }
        }
    }

    /// Status for a path whose lookup never produced an answer.
    pub fn unanswered() -> Self {
        Self::NotFound { status: None }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// HTTP status of the lookup, if one was recorded.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Undetermined => None,
            Self::Found(_) => Some(200),
            Self::NotFound { status } => *status,
        }
    }

    pub fn metadata(&self) -> Option<&ItemMetadata> {
        match self {
            Self::Found(meta) => Some(meta),
            _ => None,
        }
    }
}

/// Status of one location in each store tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VariantStatus {
    pub primary: RemoteStatus,
    pub preview: RemoteStatus,
}

impl VariantStatus {
    pub fn get(&self, store: StoreKind) -> &RemoteStatus {
        match store {
            StoreKind::Primary => &self.primary,
            StoreKind::Preview => &self.preview,
        }
    }

    pub fn get_mut(&mut self, store: StoreKind) -> &mut RemoteStatus {
        match store {
            StoreKind::Primary => &mut self.primary,
            StoreKind::Preview => &mut self.preview,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Locations and references
// ═══════════════════════════════════════════════════════════════════════════════

/// A physical document path plus what the store knows about it.
#[derive(Debug, Clone, PartialEq)]
pub struct DocLocation {
    pub file_path: String,
    pub status: VariantStatus,
}

/// Human-readable summary of a [`DocLocation`] in one tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSummary {
    pub has_source_file: bool,
    /// The file path when found, otherwise a short explanation.
    pub message: String,
    pub modification_info: String,
}

impl DocLocation {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            status: VariantStatus::default(),
        }
    }

    /// Summarize this location's status in the given tree.
    pub fn describe(&self, store: StoreKind) -> StatusSummary {
        match self.status.get(store) {
            RemoteStatus::Found(meta) => {
                let by = meta.last_modified_by.as_deref().unwrap_or("unknown");
                let at = meta
                    .last_modified_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "unknown time".to_string());
                StatusSummary {
                    has_source_file: true,
                    message: self.file_path.clone(),
                    modification_info: format!("By {} at {}", by, at),
                }
            }
            RemoteStatus::NotFound { .. } => StatusSummary {
                has_source_file: false,
                message: "Source file not found!".to_string(),
                modification_info: "N/A".to_string(),
            },
            RemoteStatus::Undetermined => StatusSummary {
                has_source_file: false,
                message: "Status not checked".to_string(),
                modification_info: "N/A".to_string(),
            },
        }
    }
}

/// Logical identity of one authored page.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentReference {
    pub url: String,
    /// The authored document.
    pub doc: DocLocation,
    /// The staged copy under the child folder.
    pub child_doc: DocLocation,
}

impl DocumentReference {
    /// Derive both locations from a page URL.
    pub fn new(url: impl Into<String>, child_folder: &str) -> Self {
        let url = url.into();
        let doc_path = doc_path_from_url(&url);
        let child_path = child_doc_path(&doc_path, child_folder);
        Self {
            url,
            doc: DocLocation::new(doc_path),
            child_doc: DocLocation::new(child_path),
        }
    }

    /// The page URL on the preview origin, if the URL parses.
    pub fn preview_url(&self, preview_origin: &str) -> Option<String> {
        let mut parsed = Url::parse(&self.url).ok()?;
        parsed.set_host(Some(preview_origin)).ok()?;
        Some(parsed.to_string())
    }
}

/// Derive the store path of the document behind a page URL.
///
/// | URL path | Document |
/// |----------|----------|
/// | `/a/data.json` | `/a/data.xlsx` |
/// | `/a/` | `/a/index.docx` |
/// | `/a/page.html` | `/a/page.docx` |
/// | `/a/page` | `/a/page.docx` |
///
/// A URL that does not parse is treated as a bare path.
pub fn doc_path_from_url(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.to_string(),
    };

    if let Some(stem) = path.strip_suffix(".json") {
        return format!("{}.xlsx", stem);
    }

    let mut path = path;
    if path.ends_with('/') {
        path.push_str("index");
    }
    if let Some(stem) = path.strip_suffix(".html") {
        path = stem.to_string();
    }
    format!("{}.docx", path)
}

/// Insert `child_folder` between the parent folder and the file name.
pub fn child_doc_path(doc_path: &str, child_folder: &str) -> String {
    let (parent, name) = split_path(doc_path);
    format!("{}/{}/{}", parent, child_folder, name)
}

/// Split a path into `(parent_folder, file_name)`; the parent has no trailing `/`.
pub fn split_path(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(i) => (&path[..i], &path[i + 1..]),
        None => ("", path),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Project
// ═══════════════════════════════════════════════════════════════════════════════

/// Page references keyed by URL, in first-insertion order.
pub type UrlMap = IndexMap<String, DocumentReference>;

/// A project and all the page references it lists.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectDetail {
    pub url: String,
    pub name: String,
    pub title: String,
    pub description: String,
    pub urls: UrlMap,
    child_folder: String,
}

impl ProjectDetail {
    pub fn new(url: impl Into<String>, name: impl Into<String>, child_folder: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            title: String::new(),
            description: String::new(),
            urls: UrlMap::new(),
            child_folder: child_folder.into(),
        }
    }

    /// Add a page by URL. A URL already present keeps its position and
    /// reference; returns `false` in that case.
    pub fn add_url(&mut self, page_url: &str) -> bool {
        if self.urls.contains_key(page_url) {
            return false;
        }
        let reference = DocumentReference::new(page_url, &self.child_folder);
        self.urls.insert(reference.url.clone(), reference);
        true
    }

    pub fn child_folder(&self) -> &str {
        &self.child_folder
    }

    /// Parse a project data file.
    ///
    /// ```text
    /// { "project": { "data": [{ "title": .., "description": .. }] },
    ///   "urls":    { "data": [{ "URL": "https://.." }, ..] } }
    /// ```
    ///
    /// The URL column may be named `URL`, `urls` or `url`; the first
    /// non-empty one wins. Rows without a URL are skipped.
    pub fn from_data_file(
        url: impl Into<String>,
        name: impl Into<String>,
        bytes: &[u8],
        child_folder: &str,
    ) -> Result<Self> {
        let data: DataFile = serde_json::from_slice(bytes)?;
        let mut detail = Self::new(url, name, child_folder);

        if let Some(row) = data.project.data.into_iter().next() {
            detail.title = row.title;
            detail.description = row.description;
        }
        for row in &data.urls.data {
            if let Some(page) = row_url(row) {
                detail.add_url(page);
            }
        }
        Ok(detail)
    }
}

#[derive(Debug, Deserialize)]
struct DataFile {
    #[serde(default)]
    project: Sheet<ProjectRow>,
    #[serde(default)]
    urls: Sheet<UrlRow>,
}

#[derive(Debug, Deserialize)]
struct Sheet<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

impl<T> Default for Sheet<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

#[derive(Debug, Deserialize)]
struct ProjectRow {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
}

/// Sheet rows are free-form; the URL column name varies between sheets.
type UrlRow = serde_json::Map<String, serde_json::Value>;

const URL_COLUMNS: [&str; 3] = ["URL", "urls", "url"];

fn row_url(row: &UrlRow) -> Option<&str> {
    URL_COLUMNS
        .iter()
        .filter_map(|column| row.get(*column).and_then(serde_json::Value::as_str))
        .map(str::trim)
        .find(|page| !page.is_empty())
}
