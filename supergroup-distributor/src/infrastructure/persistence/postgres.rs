//! PostgreSQL 分发队列实现

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use supergroup_core::error::{ErrorBuilder, ErrorCode, InfraResultExt, Result, map_infra_error};
use tracing::{debug, instrument};

use crate::domain::model::{DistributedMessage, MessageCategory, MessageStatus};
use crate::domain::repository::DistributionQueue;

const MESSAGE_COLUMNS: &str = "message_id, conversation_id, recipient_id, user_id, \
    quote_message_id, shard, category, data, status, created_at";

pub struct PostgresDistributionQueue {
    pool: Pool<Postgres>,
}

impl PostgresDistributionQueue {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// 初始化表结构（如果不存在）
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS distributed_messages (
                message_id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL,
                recipient_id TEXT NOT NULL DEFAULT '',
                user_id TEXT NOT NULL DEFAULT '',
                quote_message_id TEXT NOT NULL DEFAULT '',
                shard TEXT NOT NULL,
                category TEXT NOT NULL,
                data TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .into_supergroup(ErrorCode::DatabaseError, "failed to create distributed_messages")?;

        // 分片拉取与过期清理都按 (shard, status, created_at) 扫描
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_distributed_messages_shard_status_created
            ON distributed_messages(shard, status, created_at)
            "#,
        )
        .execute(&self.pool)
        .await
        .into_supergroup(ErrorCode::DatabaseError, "failed to create distributed_messages index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS distributed_messages_dead_letter (
                message_id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL,
                recipient_id TEXT NOT NULL DEFAULT '',
                user_id TEXT NOT NULL DEFAULT '',
                quote_message_id TEXT NOT NULL DEFAULT '',
                shard TEXT NOT NULL,
                category TEXT NOT NULL,
                data TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL,
                reason TEXT NOT NULL,
                dead_lettered_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .into_supergroup(ErrorCode::DatabaseError, "failed to create dead letter table")?;

        Ok(())
    }
}

fn row_to_message(row: &PgRow) -> Result<DistributedMessage> {
    let status: String = row.try_get("status").map_err(decode_error)?;
    let status = MessageStatus::parse(&status).ok_or_else(|| {
        ErrorBuilder::new(ErrorCode::DeserializationError, "unknown message status")
            .details(status.clone())
            .build_error()
    })?;
    let category: String = row.try_get("category").map_err(decode_error)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(decode_error)?;

    Ok(DistributedMessage {
        message_id: row.try_get("message_id").map_err(decode_error)?,
        conversation_id: row.try_get("conversation_id").map_err(decode_error)?,
        recipient_id: row.try_get("recipient_id").map_err(decode_error)?,
        user_id: row.try_get("user_id").map_err(decode_error)?,
        quote_message_id: row.try_get("quote_message_id").map_err(decode_error)?,
        shard: row.try_get("shard").map_err(decode_error)?,
        category: MessageCategory::from(category),
        data: row.try_get("data").map_err(decode_error)?,
        status,
        created_at,
    })
}

fn decode_error(err: sqlx::Error) -> supergroup_core::error::SupergroupError {
    map_infra_error(err, ErrorCode::DeserializationError, "failed to decode distributed message row")
}

#[async_trait]
impl DistributionQueue for PostgresDistributionQueue {
    #[instrument(skip(self), fields(shard = %shard, limit = limit))]
    async fn fetch_pending(&self, shard: &str, limit: usize) -> Result<Vec<DistributedMessage>> {
        let query = format!(
            "SELECT {MESSAGE_COLUMNS} FROM distributed_messages \
             WHERE shard = $1 AND status = $2 \
             ORDER BY created_at, message_id LIMIT $3"
        );
        let rows = sqlx::query(&query)
            .bind(shard)
            .bind(MessageStatus::Pending.as_str())
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .into_supergroup(ErrorCode::DatabaseError, "failed to fetch pending messages")?;

        rows.iter().map(row_to_message).collect()
    }

    #[instrument(skip(self, message_ids), fields(message_count = message_ids.len()))]
    async fn advance_status(&self, message_ids: &[String]) -> Result<u64> {
        if message_ids.is_empty() {
            return Ok(0);
        }

        // 条件更新：已被清理或已投递的消息不受影响，也不报错
        let result = sqlx::query(
            r#"
            UPDATE distributed_messages SET status = $1
            WHERE message_id = ANY($2) AND status = $3
            "#,
        )
        .bind(MessageStatus::Delivered.as_str())
        .bind(message_ids)
        .bind(MessageStatus::Pending.as_str())
        .execute(&self.pool)
        .await
        .into_supergroup(ErrorCode::DatabaseError, "failed to update message status")?;

        debug!(
            requested = message_ids.len(),
            updated = result.rows_affected(),
            "Advanced distributed messages to delivered"
        );

        Ok(result.rows_affected())
    }

    #[instrument(skip(self, shards), fields(shard_count = shards.len(), max_rows = max_rows))]
    async fn delete_expired(
        &self,
        shards: &[String],
        older_than: DateTime<Utc>,
        max_rows: usize,
    ) -> Result<u64> {
        if shards.is_empty() || max_rows == 0 {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            DELETE FROM distributed_messages WHERE message_id IN (
                SELECT message_id FROM distributed_messages
                WHERE shard = ANY($1) AND status = $2 AND created_at < $3
                LIMIT $4
            )
            "#,
        )
        .bind(shards)
        .bind(MessageStatus::Pending.as_str())
        .bind(older_than)
        .bind(max_rows as i64)
        .execute(&self.pool)
        .await
        .into_supergroup(ErrorCode::DatabaseError, "failed to delete expired messages")?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self, messages, reason), fields(message_count = messages.len()))]
    async fn dead_letter(&self, messages: &[DistributedMessage], reason: &str) -> Result<u64> {
        if messages.is_empty() {
            return Ok(0);
        }
        let ids: Vec<String> = messages.iter().map(|m| m.message_id.clone()).collect();

        let mut tx = self
            .pool
            .begin()
            .await
            .into_supergroup(ErrorCode::DatabaseError, "failed to begin transaction")?;

        let insert = format!(
            "INSERT INTO distributed_messages_dead_letter ({MESSAGE_COLUMNS}, reason) \
             SELECT {MESSAGE_COLUMNS}, $3 FROM distributed_messages \
             WHERE message_id = ANY($1) AND status = $2 \
             ON CONFLICT (message_id) DO NOTHING"
        );
        sqlx::query(&insert)
            .bind(&ids)
            .bind(MessageStatus::Pending.as_str())
            .bind(reason)
            .execute(&mut *tx)
            .await
            .into_supergroup(ErrorCode::DatabaseError, "failed to write dead letters")?;

        let deleted = sqlx::query(
            "DELETE FROM distributed_messages WHERE message_id = ANY($1) AND status = $2",
        )
        .bind(&ids)
        .bind(MessageStatus::Pending.as_str())
        .execute(&mut *tx)
        .await
        .into_supergroup(ErrorCode::DatabaseError, "failed to remove dead letters")?;

        tx.commit()
            .await
            .into_supergroup(ErrorCode::DatabaseError, "failed to commit dead letters")?;

        Ok(deleted.rows_affected())
    }
}
