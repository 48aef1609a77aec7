// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics for observability.
//!
//! Exports Prometheus-compatible metrics through the `metrics` facade for:
//! - Remote store request latency and outcomes
//! - Batch status lookups
//! - Replication outcomes (per variant and copy mode)
//! - Tree crawls
//! - Edge routing and preview fallbacks
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `floodgate_` and follow Prometheus conventions:
//! - Counters end in `_total`
//! - Histograms track distributions (duration, size)
//!
//! No exporter is installed here; the embedding binary chooses one.

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record one remote store request.
pub fn record_store_request(operation: &str, store: &str, status: u16, duration: Duration) {
    counter!(
        "floodgate_store_requests_total",
        "operation" => operation.to_string(),
        "store" => store.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "floodgate_store_request_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a store request that never got a response.
pub fn record_store_transport_error(operation: &str) {
    counter!("floodgate_store_transport_errors_total", "operation" => operation.to_string())
        .increment(1);
}

/// Record the outcome of one reconciliation pass.
pub fn record_reconcile_pass(store: &str, keys: usize, found: usize, failed_batches: usize) {
    counter!("floodgate_status_lookups_total", "store" => store.to_string()).increment(keys as u64);
    counter!("floodgate_status_found_total", "store" => store.to_string()).increment(found as u64);
    if failed_batches > 0 {
        counter!("floodgate_status_batch_failures_total", "store" => store.to_string())
            .increment(failed_batches as u64);
    }
}

/// Record one document replication.
pub fn record_replication(variant: &str, mode: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "floodgate_replications_total",
        "variant" => variant.to_string(),
        "mode" => mode.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Record a finished bulk replication.
pub fn record_bulk_replication(variant: &str, total: usize, failed: usize, duration: Duration) {
    gauge!("floodgate_last_bulk_failures", "variant" => variant.to_string()).set(failed as f64);
    histogram!("floodgate_bulk_replication_size", "variant" => variant.to_string())
        .record(total as f64);
    histogram!("floodgate_bulk_replication_duration_seconds", "variant" => variant.to_string())
        .record(duration.as_secs_f64());
}

/// Record a finished crawl.
pub fn record_crawl(store: &str, folders: usize, documents: usize, failed_folders: usize) {
    counter!("floodgate_crawl_folders_total", "store" => store.to_string())
        .increment(folders as u64);
    counter!("floodgate_crawl_documents_total", "store" => store.to_string())
        .increment(documents as u64);
    if failed_folders > 0 {
        counter!("floodgate_crawl_folder_failures_total", "store" => store.to_string())
            .increment(failed_folders as u64);
    }
}

/// Record one routed edge request.
pub fn record_edge_request(variant: &str, fell_back: bool, status: u16, duration: Duration) {
    counter!(
        "floodgate_edge_requests_total",
        "variant" => variant.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    if fell_back {
        counter!("floodgate_edge_preview_fallbacks_total").increment(1);
    }
    histogram!("floodgate_edge_request_duration_seconds", "variant" => variant.to_string())
        .record(duration.as_secs_f64());
}
