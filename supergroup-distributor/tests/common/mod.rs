#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use supergroup_core::error::{ErrorBuilder, ErrorCode, Result};
use supergroup_core::metrics::DistributorMetrics;
use supergroup_distributor::config::DistributorConfig;
use supergroup_distributor::domain::model::{DistributedMessage, MessageCategory, MessageStatus};
use supergroup_distributor::domain::repository::{
    DeliveryTransport, DistributionQueue, RequestSigner, TransportFactory,
};
use supergroup_distributor::error::DeliveryError;
use supergroup_distributor::infrastructure::persistence::InMemoryDistributionQueue;
use supergroup_distributor::infrastructure::retry::BackoffPolicy;

pub const SERVICE_USER: &str = "service-bot";
pub const ACCEPTED: &str = r#"{"data":[]}"#;
pub const REJECTED: &str = r#"{"error":{"status":202,"code":10002,"description":"invalid data"}}"#;

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

pub fn message(id: &str, shard: &str, offset_secs: i64) -> DistributedMessage {
    message_at(id, shard, base_time() + chrono::Duration::seconds(offset_secs))
}

pub fn message_at(id: &str, shard: &str, created_at: DateTime<Utc>) -> DistributedMessage {
    DistributedMessage {
        message_id: id.to_string(),
        conversation_id: "conversation".to_string(),
        recipient_id: String::new(),
        user_id: "member".to_string(),
        quote_message_id: String::new(),
        shard: shard.to_string(),
        category: MessageCategory::PlainText,
        data: "aGVsbG8=".to_string(),
        status: MessageStatus::Pending,
        created_at,
    }
}

pub fn fast_backoff() -> BackoffPolicy {
    BackoffPolicy {
        error_delay: Duration::from_millis(5),
        idle_delay: Duration::from_millis(5),
        sweep_idle_delay: Duration::from_millis(5),
    }
}

pub fn metrics() -> Arc<DistributorMetrics> {
    Arc::new(DistributorMetrics::new())
}

pub fn config(shard_size: u32, modifier: &str) -> DistributorConfig {
    DistributorConfig {
        postgres_profile: "default".to_string(),
        shard_size,
        shard_modifier: modifier.to_string(),
        batch_limit: 80,
        request_timeout: Duration::from_secs(3),
        sweeper_enabled: false,
        message_expiry: Duration::from_secs(3600),
        max_batch_attempts: 20,
        error_backoff: Duration::from_millis(5),
        idle_backoff: Duration::from_millis(5),
        sweep_idle_backoff: Duration::from_millis(5),
        api_base: "http://127.0.0.1:1".to_string(),
        client_id: SERVICE_USER.to_string(),
        session_id: "session".to_string(),
        session_key: "unused".to_string(),
    }
}

pub struct StaticSigner;

impl RequestSigner for StaticSigner {
    fn sign(
        &self,
        method: &str,
        path: &str,
        _body: &[u8],
    ) -> std::result::Result<String, DeliveryError> {
        Ok(format!("{method} {path}"))
    }
}

type Responder =
    dyn Fn(usize, &[serde_json::Value]) -> std::result::Result<Vec<u8>, DeliveryError> + Send + Sync;

/// 记录请求并按脚本应答的传输
pub struct FakeTransport {
    responder: Box<Responder>,
    requests: Mutex<Vec<Vec<serde_json::Value>>>,
}

impl FakeTransport {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(usize, &[serde_json::Value]) -> std::result::Result<Vec<u8>, DeliveryError>
            + Send
            + Sync
            + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn accepting() -> Arc<Self> {
        Self::new(|_, _| Ok(ACCEPTED.as_bytes().to_vec()))
    }

    /// 前 `failures` 次请求返回 `error`，之后全部接受
    pub fn failing_first(failures: usize, error: DeliveryError) -> Arc<Self> {
        Self::new(move |attempt, _| {
            if attempt < failures {
                Err(error.clone())
            } else {
                Ok(ACCEPTED.as_bytes().to_vec())
            }
        })
    }

    /// 请求中包含指定消息时平台拒绝整批
    pub fn rejecting_message(poison: &'static str) -> Arc<Self> {
        Self::new(move |_, body| {
            if body.iter().any(|item| item["message_id"] == poison) {
                Ok(REJECTED.as_bytes().to_vec())
            } else {
                Ok(ACCEPTED.as_bytes().to_vec())
            }
        })
    }

    pub fn requests(&self) -> Vec<Vec<serde_json::Value>> {
        self.requests.lock().unwrap().clone()
    }

    /// 每次请求中的 message_id 列表
    pub fn sent_ids(&self) -> Vec<Vec<String>> {
        self.requests()
            .iter()
            .map(|body| {
                body.iter()
                    .map(|item| item["message_id"].as_str().unwrap_or_default().to_string())
                    .collect()
            })
            .collect()
    }
}

#[async_trait]
impl DeliveryTransport for FakeTransport {
    async fn post(
        &self,
        _path: &str,
        body: Vec<u8>,
        _token: &str,
    ) -> std::result::Result<Vec<u8>, DeliveryError> {
        let parsed: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
        let attempt = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(parsed.clone());
            requests.len() - 1
        };
        (self.responder)(attempt, &parsed)
    }
}

/// 按分片记录各自传输的工厂
#[derive(Default)]
pub struct FakeTransportFactory {
    created: Mutex<HashMap<String, Arc<FakeTransport>>>,
}

impl FakeTransportFactory {
    pub fn transport(&self, shard: &str) -> Option<Arc<FakeTransport>> {
        self.created.lock().unwrap().get(shard).cloned()
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

impl TransportFactory for FakeTransportFactory {
    fn create(
        &self,
        shard: &str,
    ) -> std::result::Result<Arc<dyn DeliveryTransport>, DeliveryError> {
        let transport = FakeTransport::accepting();
        self.created
            .lock()
            .unwrap()
            .insert(shard.to_string(), transport.clone());
        Ok(transport)
    }
}

/// 可注入失败的队列包装
pub struct FlakyQueue {
    pub inner: Arc<InMemoryDistributionQueue>,
    fail_fetch: AtomicUsize,
    fail_advance: AtomicUsize,
    fail_delete: AtomicUsize,
}

impl FlakyQueue {
    pub fn new(inner: Arc<InMemoryDistributionQueue>) -> Self {
        Self {
            inner,
            fail_fetch: AtomicUsize::new(0),
            fail_advance: AtomicUsize::new(0),
            fail_delete: AtomicUsize::new(0),
        }
    }

    pub fn fail_fetch(self, times: usize) -> Self {
        self.fail_fetch.store(times, Ordering::SeqCst);
        self
    }

    pub fn fail_advance(self, times: usize) -> Self {
        self.fail_advance.store(times, Ordering::SeqCst);
        self
    }

    pub fn fail_delete(self, times: usize) -> Self {
        self.fail_delete.store(times, Ordering::SeqCst);
        self
    }

    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn injected(operation: &str) -> supergroup_core::SupergroupError {
        ErrorBuilder::new(ErrorCode::DatabaseError, "injected failure")
            .details(operation)
            .build_error()
    }
}

#[async_trait]
impl DistributionQueue for FlakyQueue {
    async fn fetch_pending(&self, shard: &str, limit: usize) -> Result<Vec<DistributedMessage>> {
        if Self::take(&self.fail_fetch) {
            return Err(Self::injected("fetch_pending"));
        }
        self.inner.fetch_pending(shard, limit).await
    }

    async fn advance_status(&self, message_ids: &[String]) -> Result<u64> {
        if Self::take(&self.fail_advance) {
            return Err(Self::injected("advance_status"));
        }
        self.inner.advance_status(message_ids).await
    }

    async fn delete_expired(
        &self,
        shards: &[String],
        older_than: DateTime<Utc>,
        max_rows: usize,
    ) -> Result<u64> {
        if Self::take(&self.fail_delete) {
            return Err(Self::injected("delete_expired"));
        }
        self.inner.delete_expired(shards, older_than, max_rows).await
    }

    async fn dead_letter(&self, messages: &[DistributedMessage], reason: &str) -> Result<u64> {
        self.inner.dead_letter(messages, reason).await
    }
}

/// 轮询直到条件成立或超时
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
