//! 分发领域模型

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 消息类型
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageCategory {
    PlainText,
    PlainImage,
    PlainVideo,
    PlainData,
    PlainSticker,
    PlainContact,
    PlainAudio,
    AppButtonGroup,
    MessageRecall,
    /// 平台新增、本服务不识别的类型，原样透传
    Other(String),
}

impl MessageCategory {
    pub fn as_str(&self) -> &str {
        match self {
            MessageCategory::PlainText => "PLAIN_TEXT",
            MessageCategory::PlainImage => "PLAIN_IMAGE",
            MessageCategory::PlainVideo => "PLAIN_VIDEO",
            MessageCategory::PlainData => "PLAIN_DATA",
            MessageCategory::PlainSticker => "PLAIN_STICKER",
            MessageCategory::PlainContact => "PLAIN_CONTACT",
            MessageCategory::PlainAudio => "PLAIN_AUDIO",
            MessageCategory::AppButtonGroup => "APP_BUTTON_GROUP",
            MessageCategory::MessageRecall => "MESSAGE_RECALL",
            MessageCategory::Other(raw) => raw.as_str(),
        }
    }

    pub fn is_recall(&self) -> bool {
        matches!(self, MessageCategory::MessageRecall)
    }
}

impl From<String> for MessageCategory {
    fn from(value: String) -> Self {
        match value.as_str() {
            "PLAIN_TEXT" => MessageCategory::PlainText,
            "PLAIN_IMAGE" => MessageCategory::PlainImage,
            "PLAIN_VIDEO" => MessageCategory::PlainVideo,
            "PLAIN_DATA" => MessageCategory::PlainData,
            "PLAIN_STICKER" => MessageCategory::PlainSticker,
            "PLAIN_CONTACT" => MessageCategory::PlainContact,
            "PLAIN_AUDIO" => MessageCategory::PlainAudio,
            "APP_BUTTON_GROUP" => MessageCategory::AppButtonGroup,
            "MESSAGE_RECALL" => MessageCategory::MessageRecall,
            _ => MessageCategory::Other(value),
        }
    }
}

impl From<&str> for MessageCategory {
    fn from(value: &str) -> Self {
        MessageCategory::from(value.to_string())
    }
}

impl From<MessageCategory> for String {
    fn from(value: MessageCategory) -> Self {
        match value {
            MessageCategory::Other(raw) => raw,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for MessageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 投递状态，只会从 Pending 前进到 Delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Delivered,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Delivered => "delivered",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(MessageStatus::Pending),
            "delivered" => Some(MessageStatus::Delivered),
            _ => None,
        }
    }
}

/// 一条待投递记录：一条消息对一个接收者的投递义务
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributedMessage {
    pub message_id: String,
    pub conversation_id: String,
    /// 为空表示发往整个会话
    #[serde(default)]
    pub recipient_id: String,
    /// 原始发送者
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub quote_message_id: String,
    /// 入队时确定的分片标识
    pub shard: String,
    pub category: MessageCategory,
    /// 已编码的平台消息体
    pub data: String,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
}

/// 平台 `POST /messages` 请求体中的单条消息
#[derive(Debug, Serialize)]
pub struct DeliveryPayload<'a> {
    pub conversation_id: &'a str,
    pub recipient_id: &'a str,
    pub message_id: &'a str,
    pub quote_message_id: &'a str,
    pub category: &'a str,
    pub data: &'a str,
    pub representative_id: &'a str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'a> DeliveryPayload<'a> {
    /// 构建请求体条目
    ///
    /// 本服务自己发出的消息与撤回消息不声明代发者。
    pub fn from_message(message: &'a DistributedMessage, service_user_id: &str) -> Self {
        let representative_id =
            if message.user_id == service_user_id || message.category.is_recall() {
                ""
            } else {
                message.user_id.as_str()
            };

        Self {
            conversation_id: &message.conversation_id,
            recipient_id: &message.recipient_id,
            message_id: &message.message_id,
            quote_message_id: &message.quote_message_id,
            category: message.category.as_str(),
            data: &message.data,
            representative_id,
            created_at: message.created_at,
            updated_at: message.created_at,
        }
    }
}

/// 平台响应中的业务错误
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlatformError {
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub description: String,
}

/// 平台响应
#[derive(Debug, Default, Deserialize)]
pub struct DeliveryResponse {
    #[serde(default)]
    pub error: Option<PlatformError>,
}
