// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Batched status reconciliation.
//!
//! Looks up every physical path of a [`PathReferenceIndex`] in as few remote
//! calls as possible and writes the answer into every coordinate that refers
//! to the path.
//!
//! # Flow
//!
//! ```text
//! index.keys() ──chunk(batch_size)──► Bulkhead ──► batch_status(chunk, first_id) ─┐  (JoinSet)
//!                                                                                 │
//!   responses ◄──────────────────────────── correlate by declared id ◄────────────┘
//!       │
//!       ▼
//!   for each coordinate of the key: resolve_mut → status.{primary|preview}
//! ```
//!
//! Request ids are global key positions, and responses are matched by the id
//! they declare, never by array position: the store is free to reorder or
//! drop entries. A key nobody answered ends up not-found, as do all keys of
//! a batch whose call failed.
//!
//! # Two phases
//!
//! [`SyncPipeline::reconcile`] runs the primary pass and then the preview pass
//! strictly in order and hands back a [`ReconciledProject`]. Replication only
//! accepts that type, so it can never observe a half-reconciled project.

use crate::config::StoreConfig;
use crate::error::Result;
use crate::index::PathReferenceIndex;
use crate::metrics;
use crate::project::{ProjectDetail, RemoteStatus};
use crate::resilience::Bulkhead;
use crate::store::{BatchLookupItem, RemoteStore, StoreKind};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

/// Counters from one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileStats {
    pub store: StoreKind,
    /// Physical paths looked up.
    pub keys: usize,
    pub batches: usize,
    pub found: usize,
    pub not_found: usize,
    /// Batches whose call failed; their keys count as not found.
    pub failed_batches: usize,
    /// Response entries dropped for an unusable id.
    pub ignored_entries: usize,
}

impl ReconcileStats {
    fn new(store: StoreKind) -> Self {
        Self {
            store,
            keys: 0,
            batches: 0,
            found: 0,
            not_found: 0,
            failed_batches: 0,
            ignored_entries: 0,
        }
    }
}

/// Batch calls in flight when no limit is configured.
pub const DEFAULT_MAX_IN_FLIGHT_BATCHES: usize = 4;

/// Issues batched status lookups and fans the results into a project.
pub struct StatusReconciler<S: RemoteStore> {
    store: Arc<S>,
    batch_size: usize,
    max_in_flight: usize,
}

impl<S: RemoteStore> StatusReconciler<S> {
    /// `batch_size` is clamped to at least 1.
    pub fn new(store: Arc<S>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT_BATCHES,
        }
    }

    pub fn from_config(store: Arc<S>, config: &StoreConfig) -> Self {
        Self::new(store, config.batch_size).with_max_in_flight(config.max_concurrent_batches)
    }

    /// Cap concurrent `batch_status` calls. Clamped to at least 1.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Reconcile every indexed path against one store tree.
    ///
    /// Lookup failures degrade to not-found. A coordinate that does not
    /// resolve aborts the pass with `DataModelMismatch`.
    #[instrument(skip(self, project, index), fields(store = %store, keys = index.len()))]
    pub async fn reconcile(
        &self,
        project: &mut ProjectDetail,
        index: &PathReferenceIndex,
        store: StoreKind,
    ) -> Result<ReconcileStats> {
        let keys: Vec<String> = index.keys().cloned().collect();
        let (statuses, mut stats) = self.lookup_positions(&keys, store).await;

        for (key, status) in keys.iter().zip(statuses) {
            if status.is_found() {
                stats.found += 1;
            } else {
                stats.not_found += 1;
            }
            for coordinate in index.get(key).unwrap_or_default() {
                let location = coordinate.resolve_mut(project)?;
                *location.status.get_mut(store) = status.clone();
            }
        }

        metrics::record_reconcile_pass(store.as_str(), stats.keys, stats.found, stats.failed_batches);
        info!(
            found = stats.found,
            not_found = stats.not_found,
            failed_batches = stats.failed_batches,
            "Reconciliation pass complete"
        );
        Ok(stats)
    }

    /// Look up arbitrary paths, keyed by path.
    pub async fn lookup(&self, paths: &[String], store: StoreKind) -> HashMap<String, RemoteStatus> {
        let (statuses, _) = self.lookup_positions(paths, store).await;
        paths.iter().cloned().zip(statuses).collect()
    }

    /// Status for each path, by position.
    async fn lookup_positions(&self, paths: &[String], store: StoreKind) -> (Vec<RemoteStatus>, ReconcileStats) {
        let mut stats = ReconcileStats::new(store);
        stats.keys = paths.len();
        let mut statuses = vec![RemoteStatus::unanswered(); paths.len()];

        let bulkhead = Bulkhead::new(self.max_in_flight);
        let mut join_set: JoinSet<(usize, usize, Result<Vec<BatchLookupItem>>)> = JoinSet::new();
        for (batch_no, chunk) in paths.chunks(self.batch_size).enumerate() {
            let first_id = batch_no * self.batch_size;
            stats.batches += 1;
            let permit = match bulkhead.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    warn!(first_id, error = %e, "No batch slot, keys degrade to not found");
                    stats.failed_batches += 1;
                    continue;
                }
            };
            let chunk = chunk.to_vec();
            let store_ref = Arc::clone(&self.store);
            join_set.spawn(async move {
                let result = store_ref.batch_status(&chunk, first_id, store).await;
                drop(permit);
                (first_id, chunk.len(), result)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            let (first_id, len, result) = match joined {
                Ok(value) => value,
                Err(e) => {
                    // Keys of a panicked batch stay unanswered.
                    warn!(error = %e, "Status batch task failed");
                    stats.failed_batches += 1;
                    continue;
                }
            };

            let items = match result {
                Ok(items) => items,
                Err(e) => {
                    warn!(first_id, len, error = %e, "Status batch failed, keys degrade to not found");
                    stats.failed_batches += 1;
                    continue;
                }
            };

            for item in items {
                match item.id.trim().parse::<usize>() {
                    Ok(id) if id >= first_id && id < first_id + len => {
                        statuses[id] = RemoteStatus::from_lookup(item.status, item.body);
                    }
                    _ => {
                        warn!(id = %item.id, first_id, len, "Ignoring batch entry with unusable id");
                        stats.ignored_entries += 1;
                    }
                }
            }
        }

        debug!(keys = stats.keys, batches = stats.batches, "Status lookups complete");
        (statuses, stats)
    }
}

/// A project whose statuses are final for this run.
///
/// Only produced by [`SyncPipeline::reconcile`].
#[derive(Debug, Clone)]
pub struct ReconciledProject {
    project: ProjectDetail,
    index: PathReferenceIndex,
    primary: ReconcileStats,
    preview: Option<ReconcileStats>,
}

impl ReconciledProject {
    pub fn project(&self) -> &ProjectDetail {
        &self.project
    }

    pub fn index(&self) -> &PathReferenceIndex {
        &self.index
    }

    pub fn primary_stats(&self) -> &ReconcileStats {
        &self.primary
    }

    pub fn preview_stats(&self) -> Option<&ReconcileStats> {
        self.preview.as_ref()
    }

    /// Whether preview statuses were looked up.
    pub fn has_preview_status(&self) -> bool {
        self.preview.is_some()
    }

    pub fn into_project(self) -> ProjectDetail {
        self.project
    }
}

/// Index, reconcile primary, reconcile preview, in that order.
pub struct SyncPipeline<S: RemoteStore> {
    reconciler: StatusReconciler<S>,
}

impl<S: RemoteStore> SyncPipeline<S> {
    pub fn new(reconciler: StatusReconciler<S>) -> Self {
        Self { reconciler }
    }

    pub fn reconciler(&self) -> &StatusReconciler<S> {
        &self.reconciler
    }

    /// Run both passes. The preview pass is skipped when `include_preview` is false.
    pub async fn reconcile(&self, mut project: ProjectDetail, include_preview: bool) -> Result<ReconciledProject> {
        let index = PathReferenceIndex::build(&project);
        let primary = self
            .reconciler
            .reconcile(&mut project, &index, StoreKind::Primary)
            .await?;
        let preview = if include_preview {
            Some(
                self.reconciler
                    .reconcile(&mut project, &index, StoreKind::Preview)
                    .await?,
            )
        } else {
            None
        };

        Ok(ReconciledProject {
            project,
            index,
            primary,
            preview,
        })
    }
}
