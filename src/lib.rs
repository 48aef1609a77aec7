// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Floodgate Sync
//!
//! Keeps authored documents in a hierarchical cloud document store in step
//! with their variant copies, and routes live traffic to the right variant.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │                              floodgate-sync                               │
//! │                                                                           │
//! │  ┌─────────────┐   ┌────────────────────┐   ┌──────────────────────────┐  │
//! │  │ Project     │──►│ PathReferenceIndex │──►│ StatusReconciler         │  │
//! │  │ (admin API) │   │ (path → coords)    │   │ (batched, two passes)    │  │
//! │  └─────────────┘   └────────────────────┘   └────────────┬─────────────┘  │
//! │                                                          ▼                │
//! │  ┌─────────────┐                            ┌──────────────────────────┐  │
//! │  │ TreeCrawler │───────── migrate ─────────►│ Replicator               │  │
//! │  │ (BFS)       │                            │ (copy | read+write)      │  │
//! │  └─────────────┘                            └────────────┬─────────────┘  │
//! │                                                          ▼                │
//! │                                              RemoteStore (GraphStore)     │
//! │                                                                           │
//! │  EdgeRouter: variant header → preview origin, fallback to default origin  │
//! └───────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Variants
//!
//! | Variant | Destination | Tree |
//! |---------|-------------|------|
//! | `Child` | `<folder>/child/<name>` | primary |
//! | `Preview` | same path | preview |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use floodgate_sync::{
//!     GraphStore, ProjectDetail, Replicator, StatusReconciler, SyncConfig, SyncPipeline, Variant,
//! };
//! use std::sync::Arc;
//!
//! # async fn run(data_file: &[u8]) -> floodgate_sync::Result<()> {
//! let config = SyncConfig::load("floodgate.yaml")?;
//! let store = Arc::new(GraphStore::new(config.store.clone(), "access-token")?);
//!
//! let project = ProjectDetail::from_data_file(
//!     "https://main--site--org.hlx.page/drafts/p.json",
//!     "p.xlsx",
//!     data_file,
//!     &config.replication.child_folder,
//! )?;
//!
//! let pipeline = SyncPipeline::new(StatusReconciler::from_config(Arc::clone(&store), &config.store));
//! let reconciled = pipeline.reconcile(project, true).await?;
//!
//! let replicator = Replicator::new(store, config.replication.clone());
//! let report = replicator.replicate_all(&reconciled, Variant::Child).await;
//! if let Some(message) = report.failure_message() {
//!     eprintln!("{message}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod config;
pub mod crawler;
pub mod edge;
pub mod error;
pub mod index;
pub mod metrics;
pub mod migrate;
pub mod project;
pub mod reconcile;
pub mod replicator;
pub mod resilience;
pub mod store;

// Re-exports for convenience
pub use admin::{AdminClient, FileStatus, Project, UrlInfo};
pub use config::{AdminConfig, CrawlConfig, EdgeConfig, ReplicationSettings, StoreConfig, SyncConfig};
pub use crawler::{CrawlFrontier, CrawlSummary, DocumentDescriptor, TreeCrawler};
pub use edge::{EdgeRouter, HttpUpstream, Upstream};
pub use error::{Result, SyncError};
pub use index::{Field, PathReferenceIndex, ReferencePath, Segment};
pub use migrate::{migrate_tree, MigrationReport};
pub use project::{DocLocation, DocumentReference, ItemMetadata, ProjectDetail, RemoteStatus, StatusSummary, VariantStatus};
pub use reconcile::{ReconcileStats, ReconciledProject, StatusReconciler, SyncPipeline};
pub use replicator::{CopyMode, ReplicationJob, ReplicationReport, ReplicationResult, Replicator, Variant};
pub use resilience::{Bulkhead, RateLimitConfig, RetryConfig, Throttle};
pub use store::{GraphStore, RemoteStore, StoreKind};
