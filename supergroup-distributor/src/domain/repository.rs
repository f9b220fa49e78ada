//! 仓储接口（Port）

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use supergroup_core::error::Result;

use crate::domain::model::DistributedMessage;
use crate::error::DeliveryError;

/// 待投递消息队列
///
/// 每个方法对应一次独立事务。
#[async_trait]
pub trait DistributionQueue: Send + Sync {
    /// 按创建时间升序取出分片内最多 `limit` 条待投递消息
    async fn fetch_pending(&self, shard: &str, limit: usize) -> Result<Vec<DistributedMessage>>;

    /// 将仍处于待投递状态的消息标记为已投递，返回受影响行数
    ///
    /// 已被删除或已投递的消息静默跳过，不视为错误。
    async fn advance_status(&self, message_ids: &[String]) -> Result<u64>;

    /// 删除 `older_than` 之前创建、仍未投递的消息，单次最多 `max_rows` 条
    async fn delete_expired(
        &self,
        shards: &[String],
        older_than: DateTime<Utc>,
        max_rows: usize,
    ) -> Result<u64>;

    /// 将消息移出队列并写入死信，返回移动的条数
    async fn dead_letter(&self, messages: &[DistributedMessage], reason: &str) -> Result<u64>;
}

/// 平台 HTTP 传输
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    /// 发送已签名的请求，返回响应体；5xx 与网络错误直接返回错误
    async fn post(&self, path: &str, body: Vec<u8>, token: &str)
    -> std::result::Result<Vec<u8>, DeliveryError>;
}

/// 按分片创建独占的传输客户端
pub trait TransportFactory: Send + Sync {
    fn create(&self, shard: &str) -> std::result::Result<Arc<dyn DeliveryTransport>, DeliveryError>;
}

/// 请求签名器
pub trait RequestSigner: Send + Sync {
    /// 对 `method + path + body` 签名，返回 Bearer 令牌
    fn sign(&self, method: &str, path: &str, body: &[u8]) -> std::result::Result<String, DeliveryError>;
}
