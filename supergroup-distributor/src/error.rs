//! 投递错误分类

use thiserror::Error;

/// 一次批量投递的失败原因
///
/// 所有变体在分发循环中都按可重试处理，区别只在于
/// 平台拒绝会被计入毒消息隔离的计数。
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// 网络错误、超时、连接失败
    #[error("delivery request failed: {0}")]
    Transport(String),
    /// 平台返回 5xx
    #[error("platform server error: HTTP {0}")]
    ServerStatus(u16),
    /// 平台在响应体中返回了非零业务错误码
    #[error("platform rejected batch: code={code} description={description}")]
    Platform { code: i64, description: String },
    /// 请求签名失败
    #[error("failed to sign delivery request: {0}")]
    Signing(String),
    /// 请求体编码或响应体解码失败
    #[error("failed to encode or decode payload: {0}")]
    Codec(String),
    /// 批次超过上限，未发送
    #[error("batch of {size} messages exceeds limit {limit}")]
    BatchTooLarge { size: usize, limit: usize },
}

impl DeliveryError {
    /// 是否为临时性故障（网络、5xx），重试大概率会成功
    pub fn is_transient(&self) -> bool {
        matches!(self, DeliveryError::Transport(_) | DeliveryError::ServerStatus(_))
    }

    /// 是否为平台对批次内容的明确拒绝
    pub fn is_platform_rejection(&self) -> bool {
        matches!(self, DeliveryError::Platform { .. })
    }

    /// 指标标签
    pub fn label(&self) -> &'static str {
        match self {
            DeliveryError::Transport(_) => "transport",
            DeliveryError::ServerStatus(_) => "server_error",
            DeliveryError::Platform { .. } => "rejected",
            DeliveryError::Signing(_) => "signing",
            DeliveryError::Codec(_) => "codec",
            DeliveryError::BatchTooLarge { .. } => "oversized",
        }
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        DeliveryError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for DeliveryError {
    fn from(err: serde_json::Error) -> Self {
        DeliveryError::Codec(err.to_string())
    }
}
