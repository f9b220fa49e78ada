//! 分发循环的退避策略（固定延迟，无限重试）

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::DistributorConfig;

/// 退避策略配置
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// 任意失败后的延迟
    pub error_delay: Duration,
    /// 分片队列为空时的延迟
    pub idle_delay: Duration,
    /// 过期清理基本完成后的轮询间隔
    pub sweep_idle_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            error_delay: Duration::from_millis(100),
            idle_delay: Duration::from_millis(500),
            sweep_idle_delay: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    /// 从配置创建退避策略
    pub fn from_config(config: &DistributorConfig) -> Self {
        Self {
            error_delay: config.error_backoff,
            idle_delay: config.idle_backoff,
            sweep_idle_delay: config.sweep_idle_backoff,
        }
    }
}

/// 等待 `delay`，期间收到取消信号则提前返回
///
/// 返回 `true` 表示正常等待结束，`false` 表示已取消。
pub async fn sleep_or_cancelled(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
