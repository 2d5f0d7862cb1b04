use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{ChatId, Timestamp, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Direct,
    Group,
}

/// 聊天会话聚合。
///
/// `last_message_text` / `last_message_at` / `message_count` 是冗余的
/// 摘要字段，随每次消息写入更新，列表读取无需再查消息表。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub kind: ChatKind,
    pub title: Option<String>,
    pub members: Vec<UserId>,
    pub last_message_text: String,
    pub last_message_at: Option<Timestamp>,
    pub message_count: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Chat {
    /// 创建会话。创建者始终并入成员集合；成员集合不允许为空。
    pub fn new(
        kind: ChatKind,
        title: Option<String>,
        creator: UserId,
        members: Vec<UserId>,
        created_at: Timestamp,
    ) -> Result<Self, DomainError> {
        let mut members = members;
        if !members.contains(&creator) {
            members.push(creator);
        }
        members.sort_by_key(|member| member.0);
        members.dedup();

        match kind {
            ChatKind::Direct if members.len() != 2 => {
                return Err(DomainError::rule_violation(
                    "direct chat requires exactly two members",
                ));
            }
            ChatKind::Group if members.len() < 2 => {
                return Err(DomainError::rule_violation(
                    "group chat requires at least two members",
                ));
            }
            _ => {}
        }

        Ok(Self {
            id: ChatId::generate(),
            kind,
            title,
            members,
            last_message_text: String::new(),
            last_message_at: None,
            message_count: 0,
            created_at,
            updated_at: created_at,
        })
    }

    pub fn is_member(&self, user_id: UserId) -> bool {
        self.members.contains(&user_id)
    }
}

/// 会话列表条目，最近会话缓存中存放的就是它。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub id: ChatId,
    pub kind: ChatKind,
    pub title: Option<String>,
    pub members: Vec<UserId>,
    pub last_message_text: String,
    pub last_message_at: Option<Timestamp>,
    pub message_count: i64,
    pub updated_at: Timestamp,
}

impl From<Chat> for ChatSummary {
    fn from(chat: Chat) -> Self {
        Self {
            id: chat.id,
            kind: chat.kind,
            title: chat.title,
            members: chat.members,
            last_message_text: chat.last_message_text,
            last_message_at: chat.last_message_at,
            message_count: chat.message_count,
            updated_at: chat.updated_at,
        }
    }
}
