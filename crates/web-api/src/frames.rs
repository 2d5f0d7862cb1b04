//! WebSocket 线格式：客户端帧与服务端帧均为带 `event` 标签的 JSON 对象。

use application::MessageBroadcast;
use chrono::{DateTime, Utc};
use domain::{ChatId, MessageId, MessageType, UserId};
use serde::{Deserialize, Serialize};

/// 客户端 -> 服务端。
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event")]
pub enum ClientFrame {
    #[serde(rename = "chat:join")]
    ChatJoin {
        #[serde(rename = "chatId")]
        chat_id: ChatId,
    },
    #[serde(rename = "chat:leave")]
    ChatLeave {
        #[serde(rename = "chatId")]
        chat_id: ChatId,
    },
    #[serde(rename = "message:send")]
    MessageSend {
        #[serde(rename = "chatId")]
        chat_id: ChatId,
        #[serde(default)]
        text: Option<String>,
        #[serde(rename = "imageUrls", default)]
        image_urls: Vec<String>,
        #[serde(rename = "type", default)]
        message_type: Option<MessageType>,
    },
}

/// 服务端 -> 客户端。
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum ServerFrame {
    #[serde(rename = "message:new")]
    MessageNew(MessageNewPayload),
    #[serde(rename = "chat:joined")]
    ChatJoined {
        #[serde(rename = "chatId")]
        chat_id: ChatId,
    },
    #[serde(rename = "chat:left")]
    ChatLeft {
        #[serde(rename = "chatId")]
        chat_id: ChatId,
    },
    #[serde(rename = "error")]
    Error { code: String, message: String },
}

/// `message:new` 的消息体，字段命名沿用客户端既有协议。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageNewPayload {
    #[serde(rename = "_id")]
    pub id: MessageId,
    pub chat_id: ChatId,
    pub sender_id: UserId,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub text: Option<String>,
    pub image_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub sender_profile_image: Option<String>,
    pub sender_gender: Option<String>,
}

impl From<MessageBroadcast> for MessageNewPayload {
    fn from(broadcast: MessageBroadcast) -> Self {
        let message = broadcast.message;
        Self {
            id: message.id,
            chat_id: message.chat_id,
            sender_id: message.sender_id,
            message_type: message.message_type,
            text: message.text,
            image_urls: message.image_urls,
            created_at: message.created_at,
            sender_profile_image: broadcast.sender_profile_image,
            sender_gender: broadcast.sender_gender,
        }
    }
}
