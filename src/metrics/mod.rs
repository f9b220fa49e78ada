//! # Prometheus 指标收集模块
//!
//! 为各个服务模块提供统一的 Prometheus 指标收集能力。

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

/// 全局指标注册表
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// 消息分发服务指标
pub struct DistributorMetrics {
    /// 批次发送次数（按分片、结果）
    pub batches_sent_total: IntCounterVec,
    /// 成功投递的消息数
    pub messages_delivered_total: IntCounterVec,
    /// 批次发送耗时（秒）
    pub batch_send_duration_seconds: HistogramVec,
    /// 队列操作失败次数（按操作）
    pub queue_failure_total: IntCounterVec,
    /// 过期清理删除的消息数
    pub expired_messages_deleted_total: IntCounterVec,
    /// 进入死信的消息数
    pub dead_lettered_total: IntCounterVec,
    /// 批量大小
    pub batch_size: Histogram,
}

impl DistributorMetrics {
    pub fn new() -> Self {
        let batches_sent_total = IntCounterVec::new(
            Opts::new(
                "distributor_batches_sent_total",
                "Total number of batches sent to the platform",
            ),
            &["shard", "result"],
        )
        .expect("Failed to create distributor_batches_sent_total metric");

        let messages_delivered_total = IntCounterVec::new(
            Opts::new(
                "distributor_messages_delivered_total",
                "Total number of messages marked delivered",
            ),
            &["shard"],
        )
        .expect("Failed to create distributor_messages_delivered_total metric");

        let batch_send_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "distributor_batch_send_duration_seconds",
                "Batch delivery request duration in seconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 3.0, 5.0]),
            &["shard"],
        )
        .expect("Failed to create distributor_batch_send_duration_seconds metric");

        let queue_failure_total = IntCounterVec::new(
            Opts::new(
                "distributor_queue_failure_total",
                "Total number of distribution queue operation failures",
            ),
            &["operation"],
        )
        .expect("Failed to create distributor_queue_failure_total metric");

        let expired_messages_deleted_total = IntCounterVec::new(
            Opts::new(
                "distributor_expired_messages_deleted_total",
                "Total number of expired undelivered messages removed",
            ),
            &["sweeper"],
        )
        .expect("Failed to create distributor_expired_messages_deleted_total metric");

        let dead_lettered_total = IntCounterVec::new(
            Opts::new(
                "distributor_dead_lettered_total",
                "Total number of messages moved to the dead letter store",
            ),
            &["shard"],
        )
        .expect("Failed to create distributor_dead_lettered_total metric");

        let batch_size = Histogram::with_opts(
            HistogramOpts::new("distributor_batch_size", "Fetched batch size")
                .buckets(vec![1.0, 5.0, 10.0, 20.0, 40.0, 80.0, 100.0]),
        )
        .expect("Failed to create distributor_batch_size metric");

        // 注册指标，忽略重复注册错误（测试中会重复创建）
        let _ = REGISTRY.register(Box::new(batches_sent_total.clone()));
        let _ = REGISTRY.register(Box::new(messages_delivered_total.clone()));
        let _ = REGISTRY.register(Box::new(batch_send_duration_seconds.clone()));
        let _ = REGISTRY.register(Box::new(queue_failure_total.clone()));
        let _ = REGISTRY.register(Box::new(expired_messages_deleted_total.clone()));
        let _ = REGISTRY.register(Box::new(dead_lettered_total.clone()));
        let _ = REGISTRY.register(Box::new(batch_size.clone()));

        Self {
            batches_sent_total,
            messages_delivered_total,
            batch_send_duration_seconds,
            queue_failure_total,
            expired_messages_deleted_total,
            dead_lettered_total,
            batch_size,
        }
    }
}

impl Default for DistributorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// 获取 Prometheus 指标导出格式
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
