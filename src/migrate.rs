// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Bulk migration of a whole primary tree into a variant location.
//!
//! ```text
//! crawl(primary) ──► relative paths ──► lookup(destinations, target tree)
//!                                             │
//!                      replicate_jobs ◄── jobs (copy | overwrite)
//! ```

use crate::config::SyncConfig;
use crate::crawler::{CrawlSummary, TreeCrawler};
use crate::error::Result;
use crate::project::{child_doc_path, split_path, RemoteStatus};
use crate::reconcile::StatusReconciler;
use crate::replicator::{ReplicationJob, ReplicationReport, Replicator, Variant};
use crate::store::{RemoteStore, StoreKind};
use std::sync::Arc;
use tracing::{info, instrument};

/// Outcome of a migration.
#[derive(Debug, Clone)]
pub struct MigrationReport {
    pub crawl: CrawlSummary,
    pub replication: ReplicationReport,
}

impl MigrationReport {
    pub fn is_success(&self) -> bool {
        self.crawl.failed_folders.is_empty() && self.replication.is_success()
    }
}

/// Replicate every document of the primary tree into `variant`.
///
/// Documents already inside a child folder are skipped for [`Variant::Child`].
#[instrument(skip(store, config), fields(variant = %variant))]
pub async fn migrate_tree<S: RemoteStore>(
    store: Arc<S>,
    config: &SyncConfig,
    variant: Variant,
) -> Result<MigrationReport> {
    let crawler = TreeCrawler::new(Arc::clone(&store), config.store.clone(), config.crawl.clone());
    let frontier = crawler.crawl(StoreKind::Primary).await?;
    let crawl = frontier.summary(StoreKind::Primary);

    let prefix = config.store.parent_reference_prefix(StoreKind::Primary);
    let child_folder = config.replication.child_folder.as_str();
    let sources: Vec<String> = frontier
        .documents
        .iter()
        .map(|doc| doc.relative_path(&prefix))
        .filter(|path| variant != Variant::Child || !in_child_folder(path, child_folder))
        .collect();

    let destinations: Vec<String> = sources
        .iter()
        .map(|path| match variant {
            Variant::Child => child_doc_path(path, child_folder),
            Variant::Preview => path.clone(),
        })
        .collect();

    let reconciler = StatusReconciler::from_config(Arc::clone(&store), &config.store);
    let statuses = reconciler.lookup(&destinations, variant.target_store()).await;

    let jobs: Vec<ReplicationJob> = sources
        .iter()
        .zip(destinations.iter())
        .map(|(source, destination)| {
            let status = statuses.get(destination).unwrap_or(&RemoteStatus::Undetermined);
            ReplicationJob::new(source, destination, variant, status)
        })
        .collect();

    info!(
        documents = crawl.documents,
        jobs = jobs.len(),
        "Starting migration"
    );
    let replicator = Replicator::new(store, config.replication.clone());
    let replication = replicator.replicate_jobs(variant, jobs).await;

    Ok(MigrationReport { crawl, replication })
}

fn in_child_folder(path: &str, child_folder: &str) -> bool {
    let (parent, _) = split_path(path);
    split_path(parent).1 == child_folder
}
