//! 外部适配器端口。
//!
//! 应用层只依赖这些 trait；Postgres / Redis / WebSocket 网关在
//! infrastructure 与 web-api 中提供实现，测试用内存假件替换。

use async_trait::async_trait;
use domain::{Chat, ChatId, ChatSummary, Message, MessageId, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::{CacheError, RepositoryError};

#[async_trait]
pub trait ChatRepository: Send + Sync {
    async fn create(&self, chat: Chat) -> Result<Chat, RepositoryError>;

    async fn find_by_id(&self, id: ChatId) -> Result<Option<Chat>, RepositoryError>;

    /// 原子地自增 `message_count` 并写入摘要字段，返回更新后的会话。
    ///
    /// 单条 UPDATE 完成，避免读-改-写竞态窗口。
    async fn apply_message(
        &self,
        id: ChatId,
        preview: &str,
        at: Timestamp,
    ) -> Result<Chat, RepositoryError>;

    /// 按 `updated_at` 倒序返回用户所属的最近会话。
    async fn list_recent_for_member(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<ChatSummary>, RepositoryError>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn insert(&self, message: Message) -> Result<(), RepositoryError>;

    /// 取一页消息：`(chat_id, id desc)`，`before` 为排他上界游标。
    /// 返回结果按 id 倒序，调用方负责页内翻转。
    async fn list_page(
        &self,
        chat_id: ChatId,
        limit: u32,
        before: Option<MessageId>,
    ) -> Result<Vec<Message>, RepositoryError>;
}

/// 幂等标记存储。仅异步摄入路径使用，标记 60 秒后过期。
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// 标记是否已存在（请求已处理过）。
    async fn seen(&self, request_id: &str) -> Result<bool, CacheError>;

    /// 原子 set-if-absent 写入标记，返回本次调用是否抢到标记。
    async fn mark(&self, request_id: &str) -> Result<bool, CacheError>;
}

/// 每用户最近会话的读穿缓存。
#[async_trait]
pub trait RecentChatsCache: Send + Sync {
    async fn get(&self, user_id: UserId) -> Result<Option<Vec<ChatSummary>>, CacheError>;

    async fn put(&self, user_id: UserId, chats: &[ChatSummary]) -> Result<(), CacheError>;

    /// 删除（而非刷新）这些用户的缓存条目，下次列表读取惰性重建。
    async fn invalidate(&self, user_ids: &[UserId]) -> Result<(), CacheError>;
}

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("broadcast failed: {0}")]
    Failed(String),
}

impl BroadcastError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// 发往会话房间的 `message:new` 负载。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageBroadcast {
    pub chat_id: ChatId,
    pub message: Message,
    pub sender_profile_image: Option<String>,
    pub sender_gender: Option<String>,
}

/// 房间级实时广播端口，由网关实现。
///
/// 房间内没有连接时是静默空操作：不排队、不重放，客户端重连后
/// 通过历史拉取补齐。
#[async_trait]
pub trait ChatBroadcaster: Send + Sync {
    async fn broadcast(&self, payload: MessageBroadcast) -> Result<(), BroadcastError>;
}

/// 发送者展示资料快照，仅用于装饰广播负载。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderProfile {
    pub profile_image: Option<String>,
    pub gender: Option<String>,
}

/// 资料查询端口。任何失败都降级为 `None`，绝不阻塞消息链路。
#[async_trait]
pub trait ProfileLookup: Send + Sync {
    async fn snapshot(&self, user_id: UserId) -> Option<SenderProfile>;
}
