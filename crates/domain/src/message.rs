use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{ChatId, MessageId, Timestamp, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
}

/// 一条不可变的聊天消息。
///
/// 消息创建后不再修改；id 为 UUIDv7，排序即时间顺序。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub sender_id: UserId,
    pub message_type: MessageType,
    pub text: Option<String>,
    pub image_urls: Vec<String>,
    pub created_at: Timestamp,
}

impl Message {
    /// 创建一条新消息，id 与时间戳由服务端分配。
    ///
    /// 文本会被 trim；trim 后为空且无媒体附件时拒绝创建。
    pub fn new(
        chat_id: ChatId,
        sender_id: UserId,
        message_type: MessageType,
        text: Option<String>,
        image_urls: Vec<String>,
        created_at: Timestamp,
    ) -> Result<Self, DomainError> {
        let text = text
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        if text.is_none() && image_urls.is_empty() {
            return Err(DomainError::invalid_argument(
                "content",
                "text and image list are both empty",
            ));
        }

        Ok(Self {
            id: MessageId::generate(),
            chat_id,
            sender_id,
            message_type,
            text,
            image_urls,
            created_at,
        })
    }

    /// 计算会话摘要用的预览文本。
    ///
    /// 非空文本 > 媒体数量描述 > 空字符串。
    pub fn preview_text(&self) -> String {
        if let Some(text) = &self.text {
            return text.clone();
        }
        match self.image_urls.len() {
            0 => String::new(),
            1 => "1 image".to_owned(),
            n => format!("{} images", n),
        }
    }
}
