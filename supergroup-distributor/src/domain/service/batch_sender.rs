//! 批量投递领域服务

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::domain::model::{DeliveryPayload, DeliveryResponse, DistributedMessage};
use crate::domain::repository::{DeliveryTransport, RequestSigner};
use crate::error::DeliveryError;

/// 平台消息投递路径
pub const MESSAGES_PATH: &str = "/messages";

/// 批量投递服务
///
/// 只负责把一批消息变成一次签名后的 HTTP 请求并解释结果，
/// 不修改任何消息状态。
pub struct BatchSender {
    transport: Arc<dyn DeliveryTransport>,
    signer: Arc<dyn RequestSigner>,
    service_user_id: String,
    batch_limit: usize,
}

impl BatchSender {
    pub fn new(
        transport: Arc<dyn DeliveryTransport>,
        signer: Arc<dyn RequestSigner>,
        service_user_id: impl Into<String>,
        batch_limit: usize,
    ) -> Self {
        Self {
            transport,
            signer,
            service_user_id: service_user_id.into(),
            batch_limit,
        }
    }

    pub fn batch_limit(&self) -> usize {
        self.batch_limit
    }

    /// 构建请求体
    pub fn encode_batch(&self, messages: &[DistributedMessage]) -> Result<Vec<u8>, DeliveryError> {
        let body: Vec<DeliveryPayload<'_>> = messages
            .iter()
            .map(|message| DeliveryPayload::from_message(message, &self.service_user_id))
            .collect();
        Ok(serde_json::to_vec(&body)?)
    }

    /// 投递一批消息
    #[instrument(skip(self, messages), fields(batch_size = messages.len()))]
    pub async fn send(&self, messages: &[DistributedMessage]) -> Result<(), DeliveryError> {
        if messages.is_empty() {
            return Ok(());
        }
        if messages.len() > self.batch_limit {
            return Err(DeliveryError::BatchTooLarge {
                size: messages.len(),
                limit: self.batch_limit,
            });
        }

        let body = self.encode_batch(messages)?;
        let token = self.signer.sign("POST", MESSAGES_PATH, &body)?;
        let data = self.transport.post(MESSAGES_PATH, body, &token).await?;

        let response: DeliveryResponse = serde_json::from_slice(&data)?;
        match response.error {
            Some(err) if err.code != 0 => Err(DeliveryError::Platform {
                code: err.code,
                description: err.description,
            }),
            _ => {
                debug!(batch_size = messages.len(), "batch accepted by platform");
                Ok(())
            }
        }
    }
}
