//! 分片投递循环
//!
//! 每个分片一个任务：拉取 → 投递 → 确认，任意失败都退避后整体重试。
//! 同一分片内严格串行，保证按创建时间顺序投递。

use std::slice;
use std::sync::Arc;
use std::time::Instant;

use supergroup_core::metrics::DistributorMetrics;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::model::DistributedMessage;
use crate::domain::repository::DistributionQueue;
use crate::domain::service::BatchSender;
use crate::infrastructure::retry::{BackoffPolicy, sleep_or_cancelled};

/// 一次循环的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// 整批投递并确认成功
    Delivered(usize),
    /// 分片内没有待投递消息
    Idle,
    /// 拉取失败
    FetchFailed,
    /// 投递失败，消息保持待投递
    SendFailed,
    /// 平台已接收但状态推进失败，下一轮会重复投递
    AckFailed,
    /// 毒消息隔离：逐条投递后的统计
    Isolated { delivered: usize, dead_lettered: usize },
}

impl CycleOutcome {
    /// 本轮结束后的等待类型
    fn backoff(&self, policy: &BackoffPolicy) -> Option<std::time::Duration> {
        match self {
            CycleOutcome::Delivered(_) | CycleOutcome::Isolated { .. } => None,
            CycleOutcome::Idle => Some(policy.idle_delay),
            CycleOutcome::FetchFailed | CycleOutcome::SendFailed | CycleOutcome::AckFailed => {
                Some(policy.error_delay)
            }
        }
    }
}

/// 同一批次（以队首消息识别）被平台连续拒绝的次数
#[derive(Debug, Default)]
struct RejectionTracker {
    head: Option<String>,
    count: u32,
}

impl RejectionTracker {
    fn record(&mut self, head: &str) -> u32 {
        if self.head.as_deref() == Some(head) {
            self.count += 1;
        } else {
            self.head = Some(head.to_string());
            self.count = 1;
        }
        self.count
    }

    fn count_for(&self, head: &str) -> u32 {
        if self.head.as_deref() == Some(head) {
            self.count
        } else {
            0
        }
    }

    fn reset(&mut self) {
        self.head = None;
        self.count = 0;
    }
}

pub struct PartitionWorker {
    shard: String,
    queue: Arc<dyn DistributionQueue>,
    sender: BatchSender,
    backoff: BackoffPolicy,
    /// 0 表示不隔离
    max_batch_attempts: u32,
    metrics: Arc<DistributorMetrics>,
    rejections: RejectionTracker,
}

impl PartitionWorker {
    pub fn new(
        shard: impl Into<String>,
        queue: Arc<dyn DistributionQueue>,
        sender: BatchSender,
        backoff: BackoffPolicy,
        max_batch_attempts: u32,
        metrics: Arc<DistributorMetrics>,
    ) -> Self {
        Self {
            shard: shard.into(),
            queue,
            sender,
            backoff,
            max_batch_attempts,
            metrics,
            rejections: RejectionTracker::default(),
        }
    }

    pub fn shard(&self) -> &str {
        &self.shard
    }

    /// 循环直到取消
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(shard = %self.shard, "partition worker started");

        loop {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => break,
                outcome = self.run_once() => outcome,
            };

            if let Some(delay) = outcome.backoff(&self.backoff) {
                if !sleep_or_cancelled(delay, &cancel).await {
                    break;
                }
            } else if cancel.is_cancelled() {
                break;
            }
        }

        info!(shard = %self.shard, "partition worker stopped");
    }

    /// 执行一轮 拉取 → 投递 → 确认
    pub async fn run_once(&mut self) -> CycleOutcome {
        let batch = match self
            .queue
            .fetch_pending(&self.shard, self.sender.batch_limit())
            .await
        {
            Ok(batch) => batch,
            Err(err) => {
                self.metrics
                    .queue_failure_total
                    .with_label_values(&["fetch_pending"])
                    .inc();
                warn!(shard = %self.shard, error = %err, "failed to fetch pending messages");
                return CycleOutcome::FetchFailed;
            }
        };

        let Some(head) = batch.first().map(|m| m.message_id.clone()) else {
            self.rejections.reset();
            return CycleOutcome::Idle;
        };
        self.metrics.batch_size.observe(batch.len() as f64);

        if self.max_batch_attempts > 0
            && self.rejections.count_for(&head) >= self.max_batch_attempts
        {
            return self.isolate(&batch).await;
        }

        let started = Instant::now();
        let sent = self.sender.send(&batch).await;
        self.metrics
            .batch_send_duration_seconds
            .with_label_values(&[self.shard.as_str()])
            .observe(started.elapsed().as_secs_f64());

        if let Err(err) = sent {
            self.metrics
                .batches_sent_total
                .with_label_values(&[self.shard.as_str(), err.label()])
                .inc();
            if err.is_platform_rejection() {
                let attempts = self.rejections.record(&head);
                warn!(
                    shard = %self.shard,
                    head = %head,
                    attempts,
                    error = %err,
                    "platform rejected batch"
                );
            } else {
                warn!(shard = %self.shard, batch_size = batch.len(), error = %err, "failed to send batch");
            }
            return CycleOutcome::SendFailed;
        }

        self.rejections.reset();
        self.metrics
            .batches_sent_total
            .with_label_values(&[self.shard.as_str(), "success"])
            .inc();

        let ids: Vec<String> = batch.iter().map(|m| m.message_id.clone()).collect();
        match self.queue.advance_status(&ids).await {
            Ok(updated) => {
                self.metrics
                    .messages_delivered_total
                    .with_label_values(&[self.shard.as_str()])
                    .inc_by(updated);
                debug!(shard = %self.shard, sent = ids.len(), updated, "batch delivered");
                CycleOutcome::Delivered(ids.len())
            }
            Err(err) => {
                self.metrics
                    .queue_failure_total
                    .with_label_values(&["advance_status"])
                    .inc();
                warn!(
                    shard = %self.shard,
                    batch_size = ids.len(),
                    error = %err,
                    "batch accepted but status update failed, batch will be resent"
                );
                CycleOutcome::AckFailed
            }
        }
    }

    /// 逐条投递反复被拒绝的批次，把真正的毒消息移入死信
    async fn isolate(&mut self, batch: &[DistributedMessage]) -> CycleOutcome {
        warn!(
            shard = %self.shard,
            batch_size = batch.len(),
            attempts = self.max_batch_attempts,
            "isolating repeatedly rejected batch"
        );

        let mut delivered = 0;
        let mut dead_lettered = 0;

        for message in batch {
            match self.sender.send(slice::from_ref(message)).await {
                Ok(()) => {
                    if let Err(err) = self
                        .queue
                        .advance_status(slice::from_ref(&message.message_id))
                        .await
                    {
                        self.metrics
                            .queue_failure_total
                            .with_label_values(&["advance_status"])
                            .inc();
                        warn!(shard = %self.shard, message_id = %message.message_id, error = %err, "failed to ack isolated message");
                        return CycleOutcome::AckFailed;
                    }
                    delivered += 1;
                }
                Err(err) if err.is_platform_rejection() => {
                    match self
                        .queue
                        .dead_letter(slice::from_ref(message), &err.to_string())
                        .await
                    {
                        Ok(moved) => {
                            self.metrics
                                .dead_lettered_total
                                .with_label_values(&[self.shard.as_str()])
                                .inc_by(moved);
                            warn!(
                                shard = %self.shard,
                                message_id = %message.message_id,
                                error = %err,
                                "message moved to dead letter"
                            );
                            dead_lettered += 1;
                        }
                        Err(queue_err) => {
                            self.metrics
                                .queue_failure_total
                                .with_label_values(&["dead_letter"])
                                .inc();
                            warn!(shard = %self.shard, message_id = %message.message_id, error = %queue_err, "failed to dead letter message");
                            return CycleOutcome::AckFailed;
                        }
                    }
                }
                Err(err) => {
                    // 临时故障：停在这条消息，后续消息不得越过它投递
                    warn!(
                        shard = %self.shard,
                        message_id = %message.message_id,
                        delivered,
                        dead_lettered,
                        error = %err,
                        "isolated send failed, stopping isolation"
                    );
                    return CycleOutcome::SendFailed;
                }
            }
        }

        self.rejections.reset();
        info!(shard = %self.shard, delivered, dead_lettered, "isolation finished");
        CycleOutcome::Isolated {
            delivered,
            dead_lettered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_counts_consecutive_rejections_of_same_head() {
        let mut tracker = RejectionTracker::default();
        assert_eq!(tracker.record("a"), 1);
        assert_eq!(tracker.record("a"), 2);
        assert_eq!(tracker.count_for("a"), 2);
        assert_eq!(tracker.count_for("b"), 0);

        assert_eq!(tracker.record("b"), 1);
        assert_eq!(tracker.count_for("a"), 0);

        tracker.reset();
        assert_eq!(tracker.count_for("b"), 0);
    }

    #[test]
    fn outcome_backoff_selection() {
        let policy = BackoffPolicy::default();
        assert_eq!(CycleOutcome::Delivered(3).backoff(&policy), None);
        assert_eq!(CycleOutcome::Idle.backoff(&policy), Some(policy.idle_delay));
        assert_eq!(CycleOutcome::SendFailed.backoff(&policy), Some(policy.error_delay));
        assert_eq!(CycleOutcome::AckFailed.backoff(&policy), Some(policy.error_delay));
        assert_eq!(
            CycleOutcome::Isolated { delivered: 1, dead_lettered: 1 }.backoff(&policy),
            None
        );
    }
}
