//! 过期消息清理

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use supergroup_core::metrics::DistributorMetrics;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::repository::DistributionQueue;
use crate::infrastructure::retry::{BackoffPolicy, sleep_or_cancelled};

/// 单次清理的最大行数
pub const SWEEP_BATCH: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// 删除了整批，可能还有剩余
    Full(u64),
    /// 删除不足一批，积压基本清空
    Drained(u64),
    Failed,
}

pub struct ExpirySweeper {
    shards: Vec<String>,
    queue: Arc<dyn DistributionQueue>,
    expiry: Duration,
    backoff: BackoffPolicy,
    metrics: Arc<DistributorMetrics>,
}

impl ExpirySweeper {
    pub fn new(
        shards: Vec<String>,
        queue: Arc<dyn DistributionQueue>,
        expiry: Duration,
        backoff: BackoffPolicy,
        metrics: Arc<DistributorMetrics>,
    ) -> Self {
        Self {
            shards,
            queue,
            expiry,
            backoff,
            metrics,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        info!(
            shard_count = self.shards.len(),
            expiry_secs = self.expiry.as_secs(),
            "expiry sweeper started"
        );

        loop {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => break,
                outcome = self.sweep_once() => outcome,
            };

            let delay = match outcome {
                SweepOutcome::Full(_) => None,
                SweepOutcome::Drained(_) => Some(self.backoff.sweep_idle_delay),
                SweepOutcome::Failed => Some(self.backoff.error_delay),
            };

            match delay {
                Some(delay) if !sleep_or_cancelled(delay, &cancel).await => break,
                None if cancel.is_cancelled() => break,
                _ => {}
            }
        }

        info!("expiry sweeper stopped");
    }

    /// 删除一批过期且未投递的消息
    pub async fn sweep_once(&self) -> SweepOutcome {
        let expiry = chrono::Duration::from_std(self.expiry).unwrap_or(chrono::Duration::MAX);
        let threshold = Utc::now()
            .checked_sub_signed(expiry)
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);

        match self
            .queue
            .delete_expired(&self.shards, threshold, SWEEP_BATCH)
            .await
        {
            Ok(removed) => {
                if removed > 0 {
                    self.metrics
                        .expired_messages_deleted_total
                        .with_label_values(&["expiry"])
                        .inc_by(removed);
                    debug!(removed, "expired messages removed");
                }
                if removed < SWEEP_BATCH as u64 {
                    SweepOutcome::Drained(removed)
                } else {
                    SweepOutcome::Full(removed)
                }
            }
            Err(err) => {
                self.metrics
                    .queue_failure_total
                    .with_label_values(&["delete_expired"])
                    .inc();
                warn!(error = %err, "failed to delete expired messages");
                SweepOutcome::Failed
            }
        }
    }
}
