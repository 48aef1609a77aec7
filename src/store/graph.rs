// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Graph-style HTTP implementation of [`RemoteStore`].
//!
//! # Endpoints
//!
//! ```text
//! copy           POST {item}:/copy        → 202 + monitor URL (Location)
//! read           GET  {item}:/content
//! write          PUT  {item}:/content
//! batch_status   POST {api}/$batch        { requests: [{ id, method, url }] }
//! list_children  GET  {item}:/children    (follows @odata.nextLink)
//! ```
//!
//! Every request carries the bearer token and goes through
//! [`retry_with_backoff`]: transport errors, 429 and 5xx are retried,
//! honoring `Retry-After` when the store sends one.

use super::{BatchLookupItem, BoxFuture, ChildEntry, EntryKind, RemoteStore, StoreKind};
use crate::config::StoreConfig;
use crate::error::{Result, SyncError};
use crate::metrics;
use crate::resilience::{retry_with_backoff, RetryConfig, RetryHint};
use bytes::Bytes;
use reqwest::header::{LOCATION, RETRY_AFTER};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How many times a copy monitor is polled before the copy is assumed accepted.
const COPY_MONITOR_POLLS: usize = 20;

/// Delay between copy monitor polls.
const COPY_MONITOR_INTERVAL: Duration = Duration::from_millis(500);

/// Store client speaking the Graph drive API.
pub struct GraphStore {
    client: reqwest::Client,
    config: StoreConfig,
    access_token: String,
    retry: RetryConfig,
}

impl GraphStore {
    /// Create a store client. The token is used as-is; acquiring and
    /// refreshing it is the caller's business.
    pub fn new(config: StoreConfig, access_token: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout_duration())
            .build()
            .map_err(|e| SyncError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            access_token: access_token.into(),
            retry: RetryConfig::standard(),
        })
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Send an authenticated request with retries.
    ///
    /// Returns the response for any status the retry policy gives up on or
    /// does not consider retryable; callers interpret the status.
    async fn send<F>(&self, operation: &'static str, store: StoreKind, build: F) -> Result<reqwest::Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let result = retry_with_backoff(&self.retry, operation, |_attempt| {
            let request = build().bearer_auth(&self.access_token);
            async move {
                let start = Instant::now();
                let response = request.send().await.map_err(|e| {
                    metrics::record_store_transport_error(operation);
                    RetryHint::from(SyncError::transport(operation, e))
                })?;

                let status = response.status();
                metrics::record_store_request(operation, store.as_str(), status.as_u16(), start.elapsed());

                if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    return Err(RetryHint {
                        error: SyncError::remote_status(operation, status.as_u16()),
                        retry_after: retry_after(&response),
                    });
                }
                Ok(response)
            }
        })
        .await;

        if let Err(e) = &result {
            debug!(operation, store = %store, error = %e, "Store request failed");
        }
        result
    }

    /// Wait for an accepted copy to finish.
    async fn await_copy(&self, monitor_url: &str, destination: &str) -> Result<()> {
        for _ in 0..COPY_MONITOR_POLLS {
            let response = self
                .client
                .get(monitor_url)
                .send()
                .await
                .map_err(|e| SyncError::transport("copy_monitor", e))?;

            if !response.status().is_success() {
                return Err(SyncError::remote_status("copy_monitor", response.status().as_u16()));
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| SyncError::transport("copy_monitor", e))?;
            let monitor: CopyMonitor = serde_json::from_slice(&bytes)?;

            match monitor.status.as_str() {
                "completed" => return Ok(()),
                "failed" => {
                    return Err(SyncError::RemoteOperation {
                        operation: "copy".to_string(),
                        message: format!("copy into {} reported failure", destination),
                    })
                }
                _ => tokio::time::sleep(COPY_MONITOR_INTERVAL).await,
            }
        }

        warn!(destination, "Copy still in progress after polling, treating as accepted");
        Ok(())
    }
}

fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[derive(Debug, Deserialize)]
struct CopyMonitor {
    #[serde(default)]
    status: String,
}

impl RemoteStore for GraphStore {
    fn copy<'a>(
        &'a self,
        source_path: &'a str,
        dest_folder: &'a str,
        new_name: Option<&'a str>,
        target: StoreKind,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let url = format!("{}:/copy", self.config.item_url(StoreKind::Primary, source_path));
            let mut body = json!({
                "parentReference": {
                    "path": format!("{}{}", self.config.parent_reference_prefix(target), dest_folder),
                },
            });
            if let Some(name) = new_name {
                body["name"] = json!(name);
            }

            let response = self.send("copy", target, || self.client.post(&url).json(&body)).await?;
            let status = response.status();
            if !status.is_success() {
                return Err(SyncError::remote_status("copy", status.as_u16()));
            }

            let monitor = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            if let Some(monitor) = monitor {
                self.await_copy(&monitor, dest_folder).await?;
            }
            Ok(())
        })
    }

    fn read<'a>(&'a self, path: &'a str, store: StoreKind) -> BoxFuture<'a, Option<Bytes>> {
        Box::pin(async move {
            let url = format!("{}:/content", self.config.item_url(store, path));
            let response = self.send("read", store, || self.client.get(&url)).await?;
            let status = response.status();

            if status == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if !status.is_success() {
                return Err(SyncError::remote_status("read", status.as_u16()));
            }
            let content = response
                .bytes()
                .await
                .map_err(|e| SyncError::transport("read", e))?;
            Ok(Some(content))
        })
    }

    fn write<'a>(&'a self, content: Bytes, dest_path: &'a str, store: StoreKind) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let url = format!("{}:/content", self.config.item_url(store, dest_path));
            let response = self
                .send("write", store, || self.client.put(&url).body(content.clone()))
                .await?;
            let status = response.status();
            if !status.is_success() {
                return Err(SyncError::remote_status("write", status.as_u16()));
            }
            Ok(())
        })
    }

    fn batch_status<'a>(
        &'a self,
        paths: &'a [String],
        first_id: usize,
        store: StoreKind,
    ) -> BoxFuture<'a, Vec<BatchLookupItem>> {
        Box::pin(async move {
            let requests: Vec<serde_json::Value> = paths
                .iter()
                .enumerate()
                .map(|(i, path)| {
                    json!({
                        "id": (first_id + i).to_string(),
                        "method": "GET",
                        "url": self.config.batch_item_url(store, path),
                    })
                })
                .collect();
            let body = json!({ "requests": requests });
            let url = self.config.batch_url();

            let response = self
                .send("batch_status", store, || self.client.post(&url).json(&body))
                .await?;
            let status = response.status();
            if !status.is_success() {
                return Err(SyncError::remote_status("batch_status", status.as_u16()));
            }
            let bytes = response
                .bytes()
                .await
                .map_err(|e| SyncError::transport("batch_status", e))?;
            parse_batch_response(&bytes)
        })
    }

    fn list_children<'a>(&'a self, folder: &'a str, store: StoreKind) -> BoxFuture<'a, Vec<ChildEntry>> {
        Box::pin(async move {
            let mut next = Some(format!("{}:/children", self.config.item_url(store, folder)));
            let mut entries = Vec::new();

            while let Some(url) = next.take() {
                let response = self.send("list_children", store, || self.client.get(&url)).await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(SyncError::remote_status("list_children", status.as_u16()));
                }
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| SyncError::transport("list_children", e))?;
                let page = parse_children_page(&bytes)?;
                debug!(folder, store = %store, count = page.entries.len(), "Listed children page");
                entries.extend(page.entries);
                next = page.next_link;
            }

            Ok(entries)
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Response parsing
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct RawBatchResponse {
    #[serde(default)]
    responses: Vec<RawBatchEntry>,
}

#[derive(Debug, Deserialize)]
struct RawBatchEntry {
    id: String,
    status: u16,
    #[serde(default)]
    body: Option<serde_json::Value>,
}

/// Parse a `$batch` response body.
///
/// Entries are returned in the order the store sent them, which need not
/// match request order.
pub fn parse_batch_response(bytes: &[u8]) -> Result<Vec<BatchLookupItem>> {
    let raw: RawBatchResponse = serde_json::from_slice(bytes)?;
    Ok(raw
        .responses
        .into_iter()
        .map(|entry| BatchLookupItem {
            id: entry.id,
            status: entry.status,
            body: entry.body,
        })
        .collect())
}

/// One page of a children listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildrenPage {
    pub entries: Vec<ChildEntry>,
    pub next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawChildrenPage {
    #[serde(default)]
    value: Vec<RawDriveItem>,
    #[serde(rename = "@odata.nextLink", default)]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDriveItem {
    name: String,
    #[serde(default)]
    folder: Option<serde_json::Value>,
    #[serde(default)]
    file: Option<RawFileFacet>,
    #[serde(rename = "parentReference", default)]
    parent_reference: Option<RawParentReference>,
    #[serde(rename = "@microsoft.graph.downloadUrl", default)]
    download_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFileFacet {
    #[serde(default)]
    mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawParentReference {
    #[serde(default)]
    path: Option<String>,
}

/// Parse one page of a `:/children` listing.
pub fn parse_children_page(bytes: &[u8]) -> Result<ChildrenPage> {
    let raw: RawChildrenPage = serde_json::from_slice(bytes)?;
    let entries = raw
        .value
        .into_iter()
        .map(|item| {
            let kind = if item.folder.is_some() {
                EntryKind::Folder
            } else {
                EntryKind::File {
                    mime_type: item.file.and_then(|f| f.mime_type),
                }
            };
            ChildEntry {
                name: item.name,
                kind,
                parent_path: item
                    .parent_reference
                    .and_then(|p| p.path)
                    .unwrap_or_default(),
                download_url: item.download_url,
            }
        })
        .collect();

    Ok(ChildrenPage {
        entries,
        next_link: raw.next_link,
    })
}
