//! 成员资格鉴权。
//!
//! 任何写入之前都必须经过这里——包括事件日志路径：日志记录里携带的
//! senderId 只是声明，处理时刻仍要对照当前成员集合校验，成员关系可能
//! 在投递与处理之间发生变化。

use std::sync::Arc;

use domain::{ChatId, UserId};

use crate::errors::RepositoryError;
use crate::ports::ChatRepository;

/// 会话成员鉴权器。纯查询，无副作用。
#[derive(Clone)]
pub struct MembershipAuthorizer {
    chats: Arc<dyn ChatRepository>,
}

impl MembershipAuthorizer {
    pub fn new(chats: Arc<dyn ChatRepository>) -> Self {
        Self { chats }
    }

    /// 点查会话成员集合。会话不存在按未授权处理（fail closed）。
    pub async fn is_member(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<bool, RepositoryError> {
        match self.chats.find_by_id(chat_id).await? {
            Some(chat) => Ok(chat.is_member(user_id)),
            None => Ok(false),
        }
    }
}
