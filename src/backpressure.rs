//! Backpressure gating against target-cluster load
//!
//! New batches of write dispatches are only admitted while the cluster's
//! pending task count is at or below a threshold. The gate delays the
//! admission of new work; in-flight work is never interrupted.

use crate::es::SearchIndex;
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum pending cluster tasks before new work is held back.
pub const DEFAULT_TASK_THRESHOLD: usize = 500;

/// Admission gate polling the cluster's pending task count.
#[derive(Debug, Clone)]
pub struct BackpressureGate {
    threshold: usize,
    /// Re-poll delay while the cluster is over the threshold
    busy_delay: Duration,
    /// Delay applied when the status query fails (unknown load)
    unknown_delay: Duration,
}

impl Default for BackpressureGate {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_TASK_THRESHOLD,
            busy_delay: Duration::from_secs(3),
            unknown_delay: Duration::from_secs(2),
        }
    }
}

impl BackpressureGate {
    pub fn new(threshold: usize, busy_delay: Duration, unknown_delay: Duration) -> Self {
        Self {
            threshold,
            busy_delay,
            unknown_delay,
        }
    }

    /// Block until the observed cluster load allows admitting a new batch.
    ///
    /// Over-threshold load re-polls after `busy_delay`. A failed status
    /// query is treated as unknown load: the batch proceeds after the
    /// shorter `unknown_delay`, favoring liveness over strict throttling.
    pub async fn admit(&self, index: &dyn SearchIndex) {
        loop {
            match index.pending_tasks().await {
                Ok(count) if count <= self.threshold => {
                    debug!("Cluster load {count} within threshold {}", self.threshold);
                    return;
                }
                Ok(count) => {
                    debug!(
                        "Cluster load {count} over threshold {}, delaying admission",
                        self.threshold
                    );
                    tokio::time::sleep(self.busy_delay).await;
                }
                Err(e) => {
                    warn!("Cluster task status query failed, treating load as unknown: {e:#}");
                    tokio::time::sleep(self.unknown_delay).await;
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryIndex;

    fn gate() -> BackpressureGate {
        BackpressureGate::new(500, Duration::ZERO, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_admits_immediately_under_threshold() {
        let index = MemoryIndex::new();
        index.push_task_count(120).await;

        gate().admit(&index).await;
        assert_eq!(index.task_polls().await, 1);
    }

    #[tokio::test]
    async fn test_blocks_until_load_drops() {
        let index = MemoryIndex::new();
        index.push_task_count(900).await;
        index.push_task_count(700).await;
        index.push_task_count(300).await;

        gate().admit(&index).await;
        assert_eq!(index.task_polls().await, 3);
    }

    #[tokio::test]
    async fn test_threshold_is_inclusive() {
        let index = MemoryIndex::new();
        index.push_task_count(500).await;

        gate().admit(&index).await;
        assert_eq!(index.task_polls().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_load_proceeds() {
        let index = MemoryIndex::new();
        index.push_task_error("status endpoint down").await;

        gate().admit(&index).await;
        assert_eq!(index.task_polls().await, 1);
    }
}
