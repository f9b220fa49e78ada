//! 平台 HTTP 客户端
//!
//! 每个分片独占一个客户端（独立连接池），分片之间互不影响。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tracing::warn;

use crate::domain::repository::{DeliveryTransport, TransportFactory};
use crate::error::DeliveryError;

pub struct PlatformHttpClient {
    client: Client,
    api_base: String,
    shard: String,
}

impl PlatformHttpClient {
    pub fn new(
        api_base: impl Into<String>,
        timeout: Duration,
        shard: impl Into<String>,
    ) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|err| DeliveryError::Transport(format!("failed to build http client: {err}")))?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            shard: shard.into(),
        })
    }

    pub fn shard(&self) -> &str {
        &self.shard
    }
}

#[async_trait]
impl DeliveryTransport for PlatformHttpClient {
    async fn post(&self, path: &str, body: Vec<u8>, token: &str) -> Result<Vec<u8>, DeliveryError> {
        let url = format!("{}{}", self.api_base, path);
        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() {
            warn!(shard = %self.shard, status = status.as_u16(), "platform server error");
            return Err(DeliveryError::ServerStatus(status.as_u16()));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// 为每个分片创建独立客户端
#[derive(Debug, Clone)]
pub struct PlatformHttpClientFactory {
    api_base: String,
    timeout: Duration,
}

impl PlatformHttpClientFactory {
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_base: api_base.into(),
            timeout,
        }
    }
}

impl TransportFactory for PlatformHttpClientFactory {
    fn create(&self, shard: &str) -> Result<Arc<dyn DeliveryTransport>, DeliveryError> {
        let client = PlatformHttpClient::new(self.api_base.clone(), self.timeout, shard)?;
        Ok(Arc::new(client))
    }
}
