//! 内存分发队列
//!
//! 用于本地调试与测试，语义与 PostgreSQL 实现保持一致。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use supergroup_core::error::Result;
use tokio::sync::Mutex;

use crate::domain::model::{DistributedMessage, MessageStatus};
use crate::domain::repository::DistributionQueue;

/// 死信记录
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub message: DistributedMessage,
    pub reason: String,
}

#[derive(Default)]
struct QueueState {
    messages: Vec<DistributedMessage>,
    dead_letters: Vec<DeadLetter>,
}

#[derive(Default)]
pub struct InMemoryDistributionQueue {
    state: Mutex<QueueState>,
}

impl InMemoryDistributionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 入队；相同 message_id 的记录会被覆盖
    pub async fn enqueue(&self, message: DistributedMessage) {
        let mut state = self.state.lock().await;
        state.messages.retain(|m| m.message_id != message.message_id);
        state.messages.push(message);
    }

    pub async fn enqueue_all(&self, messages: impl IntoIterator<Item = DistributedMessage>) {
        for message in messages {
            self.enqueue(message).await;
        }
    }

    /// 当前队列内容（含已投递）
    pub async fn snapshot(&self) -> Vec<DistributedMessage> {
        self.state.lock().await.messages.clone()
    }

    pub async fn pending_count(&self) -> usize {
        self.state
            .lock()
            .await
            .messages
            .iter()
            .filter(|m| m.status == MessageStatus::Pending)
            .count()
    }

    pub async fn status_of(&self, message_id: &str) -> Option<MessageStatus> {
        self.state
            .lock()
            .await
            .messages
            .iter()
            .find(|m| m.message_id == message_id)
            .map(|m| m.status)
    }

    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.state.lock().await.dead_letters.clone()
    }
}

#[async_trait]
impl DistributionQueue for InMemoryDistributionQueue {
    async fn fetch_pending(&self, shard: &str, limit: usize) -> Result<Vec<DistributedMessage>> {
        let state = self.state.lock().await;
        let mut pending: Vec<DistributedMessage> = state
            .messages
            .iter()
            .filter(|m| m.shard == shard && m.status == MessageStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.message_id.cmp(&b.message_id))
        });
        pending.truncate(limit);
        Ok(pending)
    }

    async fn advance_status(&self, message_ids: &[String]) -> Result<u64> {
        let mut state = self.state.lock().await;
        let mut updated = 0;
        for message in state.messages.iter_mut() {
            if message.status == MessageStatus::Pending && message_ids.contains(&message.message_id)
            {
                message.status = MessageStatus::Delivered;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn delete_expired(
        &self,
        shards: &[String],
        older_than: DateTime<Utc>,
        max_rows: usize,
    ) -> Result<u64> {
        let mut state = self.state.lock().await;
        let mut removed = 0usize;
        state.messages.retain(|m| {
            let expired = removed < max_rows
                && m.status == MessageStatus::Pending
                && m.created_at < older_than
                && shards.contains(&m.shard);
            if expired {
                removed += 1;
            }
            !expired
        });
        Ok(removed as u64)
    }

    async fn dead_letter(&self, messages: &[DistributedMessage], reason: &str) -> Result<u64> {
        let mut state = self.state.lock().await;
        let mut moved = Vec::new();
        state.messages.retain(|m| {
            let hit = m.status == MessageStatus::Pending
                && messages.iter().any(|d| d.message_id == m.message_id);
            if hit {
                moved.push(m.clone());
            }
            !hit
        });

        let count = moved.len() as u64;
        state
            .dead_letters
            .extend(moved.into_iter().map(|message| DeadLetter {
                message,
                reason: reason.to_string(),
            }));
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::MessageCategory;
    use chrono::Duration;

    fn message(id: &str, shard: &str, age_secs: i64) -> DistributedMessage {
        DistributedMessage {
            message_id: id.into(),
            conversation_id: "c-1".into(),
            recipient_id: String::new(),
            user_id: "member".into(),
            quote_message_id: String::new(),
            shard: shard.into(),
            category: MessageCategory::PlainText,
            data: "ZGF0YQ==".into(),
            status: MessageStatus::Pending,
            created_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[tokio::test]
    async fn fetch_orders_by_creation_and_respects_limit() {
        let queue = InMemoryDistributionQueue::new();
        queue
            .enqueue_all([
                message("newest", "s", 1),
                message("oldest", "s", 30),
                message("middle", "s", 10),
                message("other", "t", 100),
            ])
            .await;

        let batch = queue.fetch_pending("s", 2).await.unwrap();
        let ids: Vec<_> = batch.iter().map(|m| m.message_id.as_str()).collect();
        assert_eq!(ids, ["oldest", "middle"]);
    }

    #[tokio::test]
    async fn advance_skips_missing_and_delivered() {
        let queue = InMemoryDistributionQueue::new();
        queue.enqueue(message("a", "s", 1)).await;

        let ids = vec!["a".to_string(), "gone".to_string()];
        assert_eq!(queue.advance_status(&ids).await.unwrap(), 1);
        assert_eq!(queue.advance_status(&ids).await.unwrap(), 0);
        assert_eq!(queue.status_of("a").await, Some(MessageStatus::Delivered));
    }

    #[tokio::test]
    async fn delete_expired_only_touches_old_pending_rows() {
        let queue = InMemoryDistributionQueue::new();
        queue
            .enqueue_all([
                message("old-1", "s", 7200),
                message("old-2", "s", 7200),
                message("old-3", "s", 7200),
                message("fresh", "s", 5),
                message("old-foreign", "x", 7200),
            ])
            .await;
        queue.advance_status(&["old-3".to_string()]).await.unwrap();

        let threshold = Utc::now() - Duration::hours(1);
        let shards = vec!["s".to_string()];
        assert_eq!(queue.delete_expired(&shards, threshold, 1).await.unwrap(), 1);
        assert_eq!(queue.delete_expired(&shards, threshold, 10).await.unwrap(), 1);
        assert_eq!(queue.delete_expired(&shards, threshold, 10).await.unwrap(), 0);

        let remaining: Vec<_> = queue
            .snapshot()
            .await
            .into_iter()
            .map(|m| m.message_id)
            .collect();
        assert!(remaining.contains(&"fresh".to_string()));
        assert!(remaining.contains(&"old-3".to_string()));
        assert!(remaining.contains(&"old-foreign".to_string()));
    }

    #[tokio::test]
    async fn dead_letter_moves_pending_rows() {
        let queue = InMemoryDistributionQueue::new();
        let poison = message("poison", "s", 1);
        queue.enqueue(poison.clone()).await;

        assert_eq!(queue.dead_letter(&[poison], "code=10002").await.unwrap(), 1);
        assert!(queue.snapshot().await.is_empty());
        let letters = queue.dead_letters().await;
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].reason, "code=10002");
    }
}
