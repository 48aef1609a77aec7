// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Resilience utilities: retry logic, backoff, throttling, bulkheads.
//!
//! This module provides patterns to keep bulk jobs inside the remote store's
//! rate limits:
//!
//! - [`RetryConfig`] + [`retry_with_backoff`]: Exponential backoff for transient failures
//! - [`Throttle`]: Evenly spaced starts, at most N per window
//! - [`Bulkhead`]: Semaphore to limit concurrent operations
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), floodgate_sync::resilience::BulkheadFull> {
//! use floodgate_sync::resilience::{Throttle, Bulkhead, RateLimitConfig};
//! use std::time::Duration;
//!
//! // At most 20 starts every 2 seconds
//! let throttle = Throttle::new(RateLimitConfig { burst_size: 20, window: Duration::from_secs(2) });
//! throttle.acquire().await; // Waits if over limit
//!
//! // At most 10 in flight
//! let bulkhead = Bulkhead::new(10);
//! let _permit = bulkhead.acquire().await?;
//! // permit dropped = slot released
//! # Ok(())
//! # }
//! ```

use crate::error::{Result, SyncError};
use governor::{
    clock::DefaultClock,
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovLimiter,
};
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

/// Configuration for request retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first).
    pub max_attempts: usize,

    /// Initial delay before first retry.
    pub initial_delay: Duration,

    /// Maximum delay between retries (ceiling for exponential backoff).
    pub max_delay: Duration,

    /// Backoff multiplier (e.g., 2.0 = double delay each retry).
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl RetryConfig {
    /// Retry policy for store and admin requests.
    ///
    /// # Backoff Schedule
    ///
    /// ```text
    /// Attempt  Delay before next
    /// -------  -----------------
    /// 1        500ms
    /// 2        1s
    /// 3        2s
    /// 4        (give up)
    /// ```
    pub fn standard() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_factor: 2.0,
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::standard()
        }
    }

    /// Fast-fail retry for tests.
    pub fn testing() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            backoff_factor: 2.0,
        }
    }

    /// Calculate delay for a given attempt number (1-indexed).
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return self.initial_delay;
        }

        let multiplier = self.backoff_factor.powi((attempt - 1) as i32);
        let delay_secs = self.initial_delay.as_secs_f64() * multiplier;
        let delay = Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()));

        std::cmp::min(delay, self.max_delay)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or
/// `max_attempts` is exhausted.
///
/// `op` receives the 1-indexed attempt number. A retryable error may carry its
/// own delay hint via [`RetryHint`]; otherwise the configured backoff applies.
pub async fn retry_with_backoff<T, F, Fut>(
    config: &RetryConfig,
    operation: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = std::result::Result<T, RetryHint>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(hint) => {
                if !hint.error.is_retryable() || attempt >= max_attempts {
                    return Err(hint.error);
                }
                let delay = hint
                    .retry_after
                    .map(|d| d.min(config.max_delay))
                    .unwrap_or_else(|| config.delay_for_attempt(attempt));
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %hint.error,
                    "Retryable failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// An error plus an optional server-provided retry delay (`Retry-After`).
#[derive(Debug)]
pub struct RetryHint {
    pub error: SyncError,
    pub retry_after: Option<Duration>,
}

impl From<SyncError> for RetryHint {
    fn from(error: SyncError) -> Self {
        Self {
            error,
            retry_after: None,
        }
    }
}

// =============================================================================
// Throttle
// =============================================================================

/// Configuration for the replication throttle.
///
/// Starts are spaced `window / burst_size` apart, so any span of length
/// `window` holds at most `burst_size` of them.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum operations per window (burst capacity).
    pub burst_size: u32,

    /// Length of the window.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    /// Default: 20 operations per 2 seconds.
    fn default() -> Self {
        Self {
            burst_size: 20,
            window: Duration::from_secs(2),
        }
    }
}

impl RateLimitConfig {
    /// Time between two starts.
    pub fn spacing(&self) -> Duration {
        self.window / self.burst_size.max(1)
    }

    // A bucket deeper than one token would let a full burst land on top of
    // the refills of the same window.
    fn quota(&self) -> Quota {
        Quota::with_period(self.spacing())
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX))
            .allow_burst(NonZeroU32::MIN)
    }
}

/// GCRA throttle for operation starts.
///
/// Waiting for a token yields to the runtime; it never blocks a worker thread.
pub struct Throttle {
    limiter: GovLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>,
    config: RateLimitConfig,
}

impl Throttle {
    /// Create a throttle with the given configuration.
    pub fn new(config: RateLimitConfig) -> Self {
        let limiter = GovLimiter::direct(config.quota());
        Self { limiter, config }
    }

    /// Wait until an operation may start.
    ///
    /// This method is cancel-safe.
    pub async fn acquire(&self) {
        if self.limiter.check().is_err() {
            debug!(
                burst = self.config.burst_size,
                window_ms = self.config.window.as_millis() as u64,
                "Throttle window exhausted, pausing"
            );
            self.limiter.until_ready().await;
        }
    }

    /// Try to start an operation without waiting.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    /// Get the current configuration.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }
}

// =============================================================================
// Bulkhead
// =============================================================================

/// The bulkhead's semaphore was closed while waiting for a slot.
#[derive(Debug, Clone, thiserror::Error)]
#[error("bulkhead closed (limit {max_concurrent})")]
pub struct BulkheadFull {
    pub max_concurrent: usize,
}

/// Caps how many documents of one bulk job are in flight.
///
/// Owned by the job that created it; permits are released on drop.
#[derive(Debug)]
pub struct Bulkhead {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

impl Bulkhead {
    /// A limit of 0 is raised to 1.
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    /// Wait for a free slot. The permit can be moved into a spawned task.
    pub async fn acquire(&self) -> std::result::Result<OwnedSemaphorePermit, BulkheadFull> {
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| BulkheadFull {
                max_concurrent: self.max_concurrent,
            })
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Slots not currently held.
    pub fn idle_slots(&self) -> usize {
        self.semaphore.available_permits()
    }
}
