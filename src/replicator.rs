// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Copy-with-fallback replication.
//!
//! The store's copy operation refuses to overwrite, so the mode is chosen per
//! document from the destination's reconciled status:
//!
//! | Destination status | Mode | Calls |
//! |--------------------|------|-------|
//! | 200 | [`CopyMode::Overwrite`] | `read` source (primary) then `write` destination |
//! | anything else, including undetermined | [`CopyMode::Copy`] | one `copy` into the destination folder |
//!
//! A document never gets both.
//!
//! # Bulk runs
//!
//! ```text
//! jobs ──► Bulkhead (max_concurrent in flight)
//!      ──► Throttle (ops_per_window starts per window)
//!      ──► JoinSet ──► results[i] (input order)
//! ```
//!
//! One document's failure never affects another. Errors and task panics become
//! `success = false` entries; the report always has one entry per job.

use crate::config::ReplicationSettings;
use crate::error::SyncError;
use crate::metrics;
use crate::project::{split_path, DocumentReference, RemoteStatus};
use crate::reconcile::ReconciledProject;
use crate::resilience::{Bulkhead, Throttle};
use crate::store::{RemoteStore, StoreKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

/// Replication target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Staged copy under the child folder, in the primary tree.
    Child,
    /// Same path in the preview tree.
    Preview,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Child => "child",
            Self::Preview => "preview",
        }
    }

    /// Tree the replicated copy lands in.
    pub fn target_store(&self) -> StoreKind {
        match self {
            Self::Child => StoreKind::Primary,
            Self::Preview => StoreKind::Preview,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a document reaches its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyMode {
    /// Single store-side copy; destination must not exist.
    Copy,
    /// Read the source and write it over the existing destination.
    Overwrite,
}

impl CopyMode {
    /// `Overwrite` iff the destination is known to exist.
    pub fn for_destination(status: &RemoteStatus) -> Self {
        if status.status_code() == Some(200) {
            Self::Overwrite
        } else {
            Self::Copy
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Overwrite => "overwrite",
        }
    }
}

/// One document to replicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationJob {
    /// Path in the primary tree.
    pub source_path: String,
    pub destination_path: String,
    pub destination_folder: String,
    pub file_name: String,
    pub variant: Variant,
    pub target: StoreKind,
    pub mode: CopyMode,
}

impl ReplicationJob {
    pub fn new(
        source_path: impl Into<String>,
        destination_path: impl Into<String>,
        variant: Variant,
        destination_status: &RemoteStatus,
    ) -> Self {
        let destination_path = destination_path.into();
        let (folder, name) = split_path(&destination_path);
        Self {
            source_path: source_path.into(),
            destination_folder: folder.to_string(),
            file_name: name.to_string(),
            destination_path: destination_path.clone(),
            variant,
            target: variant.target_store(),
            mode: CopyMode::for_destination(destination_status),
        }
    }

    /// Derive the job for a reconciled reference.
    pub fn for_reference(reference: &DocumentReference, variant: Variant) -> Self {
        let (destination, status) = match variant {
            Variant::Child => (&reference.child_doc.file_path, &reference.child_doc.status.primary),
            Variant::Preview => (&reference.doc.file_path, &reference.doc.status.preview),
        };
        Self::new(&reference.doc.file_path, destination, variant, status)
    }

    /// Rename argument for the copy call, if the name changes.
    fn copy_name(&self) -> Option<&str> {
        let (_, source_name) = split_path(&self.source_path);
        (source_name != self.file_name).then_some(self.file_name.as_str())
    }
}

/// Outcome for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicationResult {
    pub success: bool,
    pub source_path: String,
    pub destination_path: String,
    pub mode: CopyMode,
    pub error: Option<String>,
}

impl ReplicationResult {
    fn succeeded(job: &ReplicationJob) -> Self {
        Self {
            success: true,
            source_path: job.source_path.clone(),
            destination_path: job.destination_path.clone(),
            mode: job.mode,
            error: None,
        }
    }

    fn failed(job: &ReplicationJob, error: impl Into<String>) -> Self {
        Self {
            success: false,
            source_path: job.source_path.clone(),
            destination_path: job.destination_path.clone(),
            mode: job.mode,
            error: Some(error.into()),
        }
    }
}

/// Outcome of a bulk run, one result per job in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicationReport {
    pub variant: Variant,
    pub results: Vec<ReplicationResult>,
}

impl ReplicationReport {
    /// True iff every document replicated.
    pub fn is_success(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ReplicationResult> {
        self.results.iter().filter(|r| !r.success)
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    pub fn failed_sources(&self) -> Vec<&str> {
        self.failures().map(|r| r.source_path.as_str()).collect()
    }

    /// `Failed to copy a, b to child folder`, or `None` if nothing failed.
    pub fn failure_message(&self) -> Option<String> {
        let failed = self.failed_sources();
        if failed.is_empty() {
            return None;
        }
        let target = match self.variant {
            Variant::Child => "child folder",
            Variant::Preview => "preview",
        };
        Some(format!("Failed to copy {} to {}", failed.join(", "), target))
    }
}

/// Replicates documents into a variant location.
pub struct Replicator<S: RemoteStore> {
    store: Arc<S>,
    settings: ReplicationSettings,
}

impl<S: RemoteStore> Replicator<S> {
    pub fn new(store: Arc<S>, settings: ReplicationSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &ReplicationSettings {
        &self.settings
    }

    /// Replicate one reference. Never fails; see [`ReplicationResult::success`].
    pub async fn replicate(&self, reference: &DocumentReference, variant: Variant) -> ReplicationResult {
        execute(self.store.as_ref(), &ReplicationJob::for_reference(reference, variant)).await
    }

    /// Replicate every reference of a reconciled project.
    pub async fn replicate_all(&self, project: &ReconciledProject, variant: Variant) -> ReplicationReport {
        if variant == Variant::Preview && !project.has_preview_status() {
            warn!("Preview statuses were not reconciled, every document will be copied");
        }
        let jobs = project
            .project()
            .urls
            .values()
            .map(|reference| ReplicationJob::for_reference(reference, variant))
            .collect();
        self.replicate_jobs(variant, jobs).await
    }

    /// Run jobs with bounded concurrency and throttled starts.
    #[instrument(skip(self, jobs), fields(variant = %variant, jobs = jobs.len()))]
    pub async fn replicate_jobs(&self, variant: Variant, jobs: Vec<ReplicationJob>) -> ReplicationReport {
        let start = Instant::now();
        let bulkhead = Bulkhead::new(self.settings.max_concurrent);
        let throttle = Throttle::new(self.settings.rate_limit_config());
        let mut slots: Vec<Option<ReplicationResult>> = vec![None; jobs.len()];
        let mut join_set: JoinSet<(usize, ReplicationResult)> = JoinSet::new();

        for (i, job) in jobs.iter().enumerate() {
            let permit = match bulkhead.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    slots[i] = Some(ReplicationResult::failed(job, e.to_string()));
                    continue;
                }
            };
            throttle.acquire().await;

            let store = Arc::clone(&self.store);
            let job = job.clone();
            join_set.spawn(async move {
                let _permit = permit;
                let result = execute(store.as_ref(), &job).await;
                (i, result)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((i, result)) => slots[i] = Some(result),
                Err(e) => warn!(error = %e, "Replication task failed"),
            }
        }

        let results: Vec<ReplicationResult> = slots
            .into_iter()
            .zip(jobs.iter())
            .map(|(slot, job)| slot.unwrap_or_else(|| ReplicationResult::failed(job, "replication task aborted")))
            .collect();

        let report = ReplicationReport { variant, results };
        let failed = report.failure_count();
        metrics::record_bulk_replication(variant.as_str(), report.results.len(), failed, start.elapsed());
        info!(
            total = report.results.len(),
            failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Bulk replication complete"
        );
        report
    }
}

/// Run one job against the store.
async fn execute<S: RemoteStore>(store: &S, job: &ReplicationJob) -> ReplicationResult {
    let outcome = match job.mode {
        CopyMode::Copy => {
            store
                .copy(&job.source_path, &job.destination_folder, job.copy_name(), job.target)
                .await
        }
        CopyMode::Overwrite => match store.read(&job.source_path, StoreKind::Primary).await {
            Ok(Some(content)) => store.write(content, &job.destination_path, job.target).await,
            Ok(None) => Err(SyncError::remote_status("read", 404)),
            Err(e) => Err(e),
        },
    };

    metrics::record_replication(job.variant.as_str(), job.mode.as_str(), outcome.is_ok());
    match outcome {
        Ok(()) => {
            debug!(
                source = %job.source_path,
                destination = %job.destination_path,
                mode = job.mode.as_str(),
                "Replicated document"
            );
            ReplicationResult::succeeded(job)
        }
        Err(e) => {
            warn!(
                source = %job.source_path,
                destination = %job.destination_path,
                mode = job.mode.as_str(),
                error = %e,
                "Replication failed"
            );
            ReplicationResult::failed(job, e.to_string())
        }
    }
}
