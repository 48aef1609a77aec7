// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the floodgate sync engine.
//!
//! All configuration is plain data and can be constructed programmatically or
//! deserialized from YAML/JSON. Every section has defaults, so a config file
//! only needs to name what differs.
//!
//! # Quick Start
//!
//! ```rust
//! use floodgate_sync::config::{SyncConfig, EdgeConfig};
//!
//! let config = SyncConfig {
//!     edge: EdgeConfig {
//!         default_origin: "main--site--org.hlx.live".into(),
//!         preview_origin: "main--site-pink--org.hlx.live".into(),
//!         ..Default::default()
//!     },
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```
//!
//! # Configuration Structure
//!
//! ```text
//! SyncConfig
//! ├── store: StoreConfig              # Graph endpoint, drive roots, batch size and fan-out
//! ├── replication: ReplicationSettings # Concurrency + throttle window
//! ├── crawl: CrawlConfig              # Traversal guard
//! ├── edge: EdgeConfig                # Origins and variant header
//! └── admin: AdminConfig              # Content-admin status API
//! ```
//!
//! # YAML Example
//!
//! ```yaml
//! store:
//!   site_path: "/sites/example.sharepoint.com,123,456"
//!   primary_root: "/bacom"
//!   preview_root: "/milo-pink"
//! replication:
//!   max_concurrent: 8
//!   ops_per_window: 20
//!   window: "2s"
//! edge:
//!   default_origin: "main--site--org.hlx.live"
//!   preview_origin: "main--site-pink--org.hlx.live"
//! ```

use crate::error::{Result, SyncError};
use crate::resilience::RateLimitConfig;
use crate::store::StoreKind;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// Top-level config
// ═══════════════════════════════════════════════════════════════════════════════

/// The top-level config object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub replication: ReplicationSettings,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub edge: EdgeConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

impl SyncConfig {
    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| SyncError::Config(e.to_string()))
    }

    /// Parse a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SyncError::Config(e.to_string()))
    }

    /// Load from a file; `.json` files are parsed as JSON, everything else as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text)?,
            _ => Self::from_yaml_str(&text)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.store.batch_size == 0 {
            return Err(SyncError::Config("store.batch_size must be > 0".into()));
        }
        if self.store.max_concurrent_batches == 0 {
            return Err(SyncError::Config("store.max_concurrent_batches must be > 0".into()));
        }
        if self.replication.max_concurrent == 0 {
            return Err(SyncError::Config("replication.max_concurrent must be > 0".into()));
        }
        if self.replication.ops_per_window == 0 {
            return Err(SyncError::Config("replication.ops_per_window must be > 0".into()));
        }
        if self.edge.default_origin.is_empty() || self.edge.preview_origin.is_empty() {
            return Err(SyncError::Config("edge origins must not be empty".into()));
        }
        if self.replication.child_folder.is_empty() || self.replication.child_folder.contains('/') {
            return Err(SyncError::Config(
                "replication.child_folder must be a single path segment".into(),
            ));
        }
        Ok(())
    }

    /// Minimal config for tests: tiny batches, no throttle delay.
    pub fn for_testing() -> Self {
        Self {
            store: StoreConfig {
                batch_size: 2,
                ..Default::default()
            },
            replication: ReplicationSettings {
                max_concurrent: 4,
                ops_per_window: 1000,
                window: "10ms".to_string(),
                child_folder: "child".to_string(),
            },
            ..Default::default()
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// StoreConfig: Graph-style document store
// ═══════════════════════════════════════════════════════════════════════════════

/// Remote document store settings.
///
/// Item addresses are built as
/// `{graph_api_root}{site_path}/drive/root:{root}{path}` where `root` is the
/// primary or preview root folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// API root, e.g. `https://graph.microsoft.com/v1.0`.
    #[serde(default = "default_graph_api_root")]
    pub graph_api_root: String,

    /// Site prefix, e.g. `/sites/<site-id>`.
    #[serde(default)]
    pub site_path: String,

    /// Root folder of the primary tree.
    #[serde(default = "default_primary_root")]
    pub primary_root: String,

    /// Root folder of the preview (floodgate) tree.
    #[serde(default = "default_preview_root")]
    pub preview_root: String,

    /// Maximum lookups per `$batch` request. The store caps this at 20.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Status `$batch` calls allowed in flight at once.
    #[serde(default = "default_max_concurrent_batches")]
    pub max_concurrent_batches: usize,

    /// Per-request timeout as a duration string (e.g. "30s").
    #[serde(default = "default_request_timeout")]
    pub request_timeout: String,

    /// MIME type of the documents the crawler collects.
    #[serde(default = "default_document_mime_type")]
    pub document_mime_type: String,
}

fn default_graph_api_root() -> String {
    "https://graph.microsoft.com/v1.0".to_string()
}

fn default_primary_root() -> String {
    "/bacom".to_string()
}

fn default_preview_root() -> String {
    "/milo-pink".to_string()
}

fn default_batch_size() -> usize {
    20
}

fn default_max_concurrent_batches() -> usize {
    4
}

fn default_request_timeout() -> String {
    "30s".to_string()
}

fn default_document_mime_type() -> String {
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            graph_api_root: default_graph_api_root(),
            site_path: String::new(),
            primary_root: default_primary_root(),
            preview_root: default_preview_root(),
            batch_size: default_batch_size(),
            max_concurrent_batches: default_max_concurrent_batches(),
            request_timeout: default_request_timeout(),
            document_mime_type: default_document_mime_type(),
        }
    }
}

impl StoreConfig {
    /// Root folder for the given store tree.
    pub fn root(&self, store: StoreKind) -> &str {
        match store {
            StoreKind::Primary => &self.primary_root,
            StoreKind::Preview => &self.preview_root,
        }
    }

    /// Prefix the store puts in front of `parentReference.path` for items in
    /// the given tree. Stripped by the crawler to get store-relative paths.
    pub fn parent_reference_prefix(&self, store: StoreKind) -> String {
        format!("/drive/root:{}", self.root(store))
    }

    /// Site-relative item address used inside `$batch` requests.
    pub fn batch_item_url(&self, store: StoreKind, path: &str) -> String {
        format!("{}/drive/root:{}{}", self.site_path, self.root(store), path)
    }

    /// Absolute item address.
    pub fn item_url(&self, store: StoreKind, path: &str) -> String {
        format!("{}{}", self.graph_api_root, self.batch_item_url(store, path))
    }

    /// Absolute `$batch` endpoint.
    pub fn batch_url(&self) -> String {
        format!("{}/$batch", self.graph_api_root)
    }

    /// Parse the request timeout, falling back to 30 seconds.
    pub fn request_timeout_duration(&self) -> Duration {
        humantime::parse_duration(&self.request_timeout).unwrap_or(Duration::from_secs(30))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ReplicationSettings: bulk copy pacing
// ═══════════════════════════════════════════════════════════════════════════════

/// Bulk replication pacing.
///
/// `max_concurrent` bounds in-flight documents. `ops_per_window` and `window`
/// bound how many documents may *start* per window. Starts are spaced evenly,
/// which keeps large migrations under the store's rate limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationSettings {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    #[serde(default = "default_ops_per_window")]
    pub ops_per_window: u32,

    /// Throttle window as a duration string (e.g. "2s").
    #[serde(default = "default_window")]
    pub window: String,

    /// Folder name for staged child copies.
    #[serde(default = "default_child_folder")]
    pub child_folder: String,
}

fn default_max_concurrent() -> usize {
    10
}

fn default_ops_per_window() -> u32 {
    20
}

fn default_window() -> String {
    "2s".to_string()
}

fn default_child_folder() -> String {
    "child".to_string()
}

impl Default for ReplicationSettings {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            ops_per_window: default_ops_per_window(),
            window: default_window(),
            child_folder: default_child_folder(),
        }
    }
}

impl ReplicationSettings {
    /// Parse the throttle window, falling back to 2 seconds.
    pub fn window_duration(&self) -> Duration {
        humantime::parse_duration(&self.window).unwrap_or(Duration::from_secs(2))
    }

    /// Throttle settings for replication.
    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            burst_size: self.ops_per_window,
            window: self.window_duration(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CrawlConfig
// ═══════════════════════════════════════════════════════════════════════════════

/// Tree crawl settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Abort the crawl if more folders than this are visited.
    /// Unset means unbounded.
    #[serde(default)]
    pub max_folders: Option<usize>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// EdgeConfig
// ═══════════════════════════════════════════════════════════════════════════════

/// Edge router settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeConfig {
    /// Host of the regular site.
    #[serde(default = "default_default_origin")]
    pub default_origin: String,

    /// Host of the preview (floodgate) site.
    #[serde(default = "default_preview_origin")]
    pub preview_origin: String,

    /// Request header carrying the variant flag.
    #[serde(default = "default_variant_header")]
    pub variant_header: String,

    /// Header value that selects the preview origin.
    #[serde(default = "default_preview_value")]
    pub preview_value: String,

    /// Value sent upstream as `x-byo-cdn-type`.
    #[serde(default = "default_cdn_type")]
    pub cdn_type: String,

    /// Response headers removed before returning to the client.
    #[serde(default = "default_strip_headers")]
    pub strip_headers: Vec<String>,

    /// Address the edge binary listens on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Timeout for one upstream fetch as a duration string (e.g. "30s").
    #[serde(default = "default_request_timeout")]
    pub upstream_timeout: String,
}

fn default_default_origin() -> String {
    "main--site--org.hlx.live".to_string()
}

fn default_preview_origin() -> String {
    "main--site-pink--org.hlx.live".to_string()
}

fn default_variant_header() -> String {
    "x-adobe-floodgate".to_string()
}

fn default_preview_value() -> String {
    "pink".to_string()
}

fn default_cdn_type() -> String {
    "cloudflare".to_string()
}

fn default_strip_headers() -> Vec<String> {
    vec!["age".to_string(), "x-robots-tag".to_string()]
}

fn default_listen_addr() -> String {
    "0.0.0.0:8787".to_string()
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            default_origin: default_default_origin(),
            preview_origin: default_preview_origin(),
            variant_header: default_variant_header(),
            preview_value: default_preview_value(),
            cdn_type: default_cdn_type(),
            strip_headers: default_strip_headers(),
            listen_addr: default_listen_addr(),
            upstream_timeout: default_request_timeout(),
        }
    }
}

impl EdgeConfig {
    /// Parse the upstream timeout, falling back to 30 seconds.
    pub fn upstream_timeout_duration(&self) -> Duration {
        humantime::parse_duration(&self.upstream_timeout).unwrap_or(Duration::from_secs(30))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// AdminConfig
// ═══════════════════════════════════════════════════════════════════════════════

/// Content-admin API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Base of the status endpoint; owner/repo/ref are appended.
    #[serde(default = "default_status_api")]
    pub status_api: String,

    /// Per-request timeout as a duration string (e.g. "30s").
    #[serde(default = "default_request_timeout")]
    pub request_timeout: String,
}

fn default_status_api() -> String {
    "https://admin.hlx.page/status".to_string()
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            status_api: default_status_api(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl AdminConfig {
    /// Parse the request timeout, falling back to 30 seconds.
    pub fn request_timeout_duration(&self) -> Duration {
        humantime::parse_duration(&self.request_timeout).unwrap_or(Duration::from_secs(30))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
