//! 会话用例服务。
//!
//! 会话创建、最近会话列表（读穿缓存）、历史消息分页。摄入链路之外的
//! 读路径都在这里。

use std::sync::Arc;

use domain::{Chat, ChatId, ChatKind, ChatSummary, Message, MessageId, UserId};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::errors::{ApplicationError, ApplicationResult};
use crate::ports::{ChatRepository, MessageRepository, RecentChatsCache};

/// 历史消息默认页大小
pub const DEFAULT_PAGE_SIZE: u32 = 30;
/// 历史消息页大小上限
pub const MAX_PAGE_SIZE: u32 = 100;
/// 最近会话列表长度
pub const RECENT_CHATS_LIMIT: u32 = 30;

pub struct ChatServiceDependencies {
    pub chats: Arc<dyn ChatRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub recent_chats: Arc<dyn RecentChatsCache>,
    pub clock: Arc<dyn Clock>,
}

pub struct ChatService {
    chats: Arc<dyn ChatRepository>,
    messages: Arc<dyn MessageRepository>,
    recent_chats: Arc<dyn RecentChatsCache>,
    clock: Arc<dyn Clock>,
}

impl ChatService {
    pub fn new(deps: ChatServiceDependencies) -> Self {
        Self {
            chats: deps.chats,
            messages: deps.messages,
            recent_chats: deps.recent_chats,
            clock: deps.clock,
        }
    }

    /// 创建会话。创建者强制并入成员集合。
    pub async fn create_chat(
        &self,
        creator: UserId,
        kind: ChatKind,
        title: Option<String>,
        members: Vec<UserId>,
    ) -> ApplicationResult<Chat> {
        let chat = Chat::new(kind, title, creator, members, self.clock.now())?;
        let chat = self.chats.create(chat).await?;
        debug!(chat_id = %chat.id, members = chat.members.len(), "会话已创建");
        Ok(chat)
    }

    /// 最近会话列表，读穿缓存。
    ///
    /// 缓存命中直接返回；未命中从存储按 `updated_at` 倒序取前
    /// `RECENT_CHATS_LIMIT` 条并回填。缓存读写故障降级为直读存储。
    pub async fn recent_chats(&self, user_id: UserId) -> ApplicationResult<Vec<ChatSummary>> {
        match self.recent_chats.get(user_id).await {
            Ok(Some(cached)) => return Ok(cached),
            Ok(None) => {}
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "最近会话缓存读取失败，回退存储");
            }
        }

        let chats = self
            .chats
            .list_recent_for_member(user_id, RECENT_CHATS_LIMIT)
            .await?;

        if let Err(err) = self.recent_chats.put(user_id, &chats).await {
            warn!(user_id = %user_id, error = %err, "最近会话缓存回填失败");
        }

        Ok(chats)
    }

    /// 历史消息分页。仅会话成员可读。
    ///
    /// `limit` 默认 30、上限 100；`before` 为排他上界消息 id。返回页内
    /// 按 id 升序，最旧的一条 id 作为下一页游标。
    pub async fn message_history(
        &self,
        chat_id: ChatId,
        requester: UserId,
        limit: Option<u32>,
        before: Option<MessageId>,
    ) -> ApplicationResult<Vec<Message>> {
        let chat = self
            .chats
            .find_by_id(chat_id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(format!("chat {}", chat_id)))?;

        if !chat.is_member(requester) {
            return Err(ApplicationError::Forbidden(
                "requester is not a chat member".to_owned(),
            ));
        }

        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let mut page = self.messages.list_page(chat_id, limit, before).await?;
        // 存储按 id 倒序取页，页内翻转为升序返回。
        page.reverse();
        Ok(page)
    }
}
