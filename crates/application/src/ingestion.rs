//! 消息摄入引擎。
//!
//! 唯一入口 `ingest`，由两个不含业务逻辑的适配器调用：WebSocket 网关
//! （同步路径）和事件日志消费者（异步路径）。两条路径在这里收敛到同一套
//! 鉴权、幂等、持久化、摘要更新、缓存失效与实时广播。

use std::sync::Arc;

use domain::{Chat, Message, MessageType, UserId};
use tracing::{debug, error, warn};

use crate::authorizer::MembershipAuthorizer;
use crate::clock::Clock;
use crate::errors::ApplicationResult;
use crate::ports::{
    ChatBroadcaster, ChatRepository, IdempotencyStore, MessageBroadcast, MessageRepository,
    ProfileLookup, RecentChatsCache, SenderProfile,
};

/// 一次发送意图。两条路径共用同一结构。
///
/// `request_id` 仅异步路径携带：事件日志是 at-least-once 投递，需要
/// 靠它去重；同步路径上一条活连接本身就是去重边界，重复提交由客户端
/// 自行负责。
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub chat_id: domain::ChatId,
    pub sender_id: UserId,
    pub message_type: MessageType,
    pub text: Option<String>,
    pub image_urls: Vec<String>,
    pub request_id: Option<String>,
}

/// 静默丢弃的原因。这些都是多路径 at-least-once 系统的稳态结果，
/// 不作为错误向事件源传播。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// 幂等标记命中，请求已处理过
    Duplicate,
    /// trim 后文本与媒体列表均为空
    EmptyContent,
    /// 发送者不是会话成员（含会话不存在）
    NotMember,
}

/// `ingest` 的产出。
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    Stored { message: Message, chat: Chat },
    Dropped(DropReason),
}

impl IngestOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Stored { .. })
    }
}

pub struct IngestionDependencies {
    pub chats: Arc<dyn ChatRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub idempotency: Arc<dyn IdempotencyStore>,
    pub recent_chats: Arc<dyn RecentChatsCache>,
    pub broadcaster: Arc<dyn ChatBroadcaster>,
    pub profiles: Arc<dyn ProfileLookup>,
    pub clock: Arc<dyn Clock>,
}

pub struct IngestionEngine {
    chats: Arc<dyn ChatRepository>,
    messages: Arc<dyn MessageRepository>,
    idempotency: Arc<dyn IdempotencyStore>,
    recent_chats: Arc<dyn RecentChatsCache>,
    broadcaster: Arc<dyn ChatBroadcaster>,
    profiles: Arc<dyn ProfileLookup>,
    clock: Arc<dyn Clock>,
    authorizer: MembershipAuthorizer,
}

impl IngestionEngine {
    pub fn new(deps: IngestionDependencies) -> Self {
        let authorizer = MembershipAuthorizer::new(deps.chats.clone());
        Self {
            chats: deps.chats,
            messages: deps.messages,
            idempotency: deps.idempotency,
            recent_chats: deps.recent_chats,
            broadcaster: deps.broadcaster,
            profiles: deps.profiles,
            clock: deps.clock,
            authorizer,
        }
    }

    pub fn authorizer(&self) -> &MembershipAuthorizer {
        &self.authorizer
    }

    /// 摄入一条发送意图。
    ///
    /// 步骤顺序固定：幂等预检 → 内容校验 → 成员鉴权 → 消息落库 →
    /// 会话摘要原子更新 → 最近会话缓存失效 → 幂等标记写入（成功后写，
    /// 崩溃宁可重复投递也不丢消息）→ 房间广播。
    ///
    /// 落库 / 摘要 / 缓存失效阶段的存储故障以错误返回，广播不会发生；
    /// 丢弃（重复、空内容、非成员）是正常结果，不是错误。
    pub async fn ingest(&self, request: IngestRequest) -> ApplicationResult<IngestOutcome> {
        // 1. 幂等预检：标记存在说明已处理过，静默丢弃。
        if let Some(request_id) = &request.request_id {
            if self.idempotency.seen(request_id).await? {
                debug!(request_id, chat_id = %request.chat_id, "重复投递，丢弃");
                return Ok(IngestOutcome::Dropped(DropReason::Duplicate));
            }
        }

        // 2. 内容校验：trim 后文本与媒体均为空则丢弃。
        let text = request
            .text
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned);
        if text.is_none() && request.image_urls.is_empty() {
            debug!(chat_id = %request.chat_id, sender_id = %request.sender_id, "空内容，丢弃");
            return Ok(IngestOutcome::Dropped(DropReason::EmptyContent));
        }

        // 3. 成员鉴权：被移出成员的滞留请求不是错误，只是空操作。
        if !self
            .authorizer
            .is_member(request.chat_id, request.sender_id)
            .await?
        {
            debug!(
                chat_id = %request.chat_id,
                sender_id = %request.sender_id,
                "发送者不是会话成员，丢弃"
            );
            return Ok(IngestOutcome::Dropped(DropReason::NotMember));
        }

        // 4. 落库，id 与时间戳由服务端分配。
        let message = Message::new(
            request.chat_id,
            request.sender_id,
            request.message_type,
            text,
            request.image_urls,
            self.clock.now(),
        )?;
        self.messages.insert(message.clone()).await?;

        // 5. 摘要原子更新。与消息插入无需事务，插入成功而摘要失败时
        //    消息仍然存在，摘要随下一条消息最终一致。
        let chat = self
            .chats
            .apply_message(request.chat_id, &message.preview_text(), message.created_at)
            .await?;

        // 6. 对全部成员失效最近会话缓存，下一次列表读取从存储重建。
        self.recent_chats.invalidate(&chat.members).await?;

        // 7. 成功之后才写幂等标记。标记写入失败只会导致一次可容忍的
        //    重复投递，降级告警即可。
        if let Some(request_id) = &request.request_id {
            match self.idempotency.mark(request_id).await {
                Ok(true) => {}
                Ok(false) => {
                    // 两次投递同时越过了步骤 1 的窄窗口，另一方已抢到
                    // 标记。按可接受的罕见重复处理。
                    debug!(request_id, "幂等标记已被并发投递方写入");
                }
                Err(err) => {
                    warn!(request_id, error = %err, "幂等标记写入失败");
                }
            }
        }

        // 8. 房间广播，附带发送者展示资料；资料查询失败降级为空字段。
        let profile = self
            .profiles
            .snapshot(request.sender_id)
            .await
            .unwrap_or_else(SenderProfile::default);
        let broadcast = MessageBroadcast {
            chat_id: chat.id,
            message: message.clone(),
            sender_profile_image: profile.profile_image,
            sender_gender: profile.gender,
        };
        if let Err(err) = self.broadcaster.broadcast(broadcast).await {
            // 消息已持久化，广播失败不回滚；客户端靠历史拉取补齐。
            error!(chat_id = %chat.id, error = %err, "房间广播失败");
        }

        Ok(IngestOutcome::Stored { message, chat })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{member_chat, TestHarness};
    use domain::MessageType;

    fn text_request(harness: &TestHarness, text: &str) -> IngestRequest {
        IngestRequest {
            chat_id: harness.chat_id,
            sender_id: harness.member,
            message_type: MessageType::Text,
            text: Some(text.to_owned()),
            image_urls: vec![],
            request_id: None,
        }
    }

    #[tokio::test]
    async fn stores_message_and_bumps_summary() {
        let harness = member_chat().await;
        let before = harness.chat().await;

        let outcome = harness
            .engine
            .ingest(text_request(&harness, "hello"))
            .await
            .unwrap();

        let IngestOutcome::Stored { message, chat } = outcome else {
            panic!("expected stored outcome");
        };
        assert_eq!(chat.message_count, before.message_count + 1);
        assert_eq!(chat.last_message_text, "hello");
        assert_eq!(chat.last_message_at, Some(message.created_at));
        assert_eq!(harness.stored_messages().await.len(), 1);
    }

    #[tokio::test]
    async fn non_member_send_is_dropped_without_broadcast() {
        let harness = member_chat().await;
        let request = IngestRequest {
            sender_id: harness.outsider,
            ..text_request(&harness, "intruder")
        };

        let outcome = harness.engine.ingest(request).await.unwrap();

        assert!(matches!(
            outcome,
            IngestOutcome::Dropped(DropReason::NotMember)
        ));
        assert!(harness.stored_messages().await.is_empty());
        assert!(harness.broadcasts().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_chat_fails_closed() {
        let harness = member_chat().await;
        let request = IngestRequest {
            chat_id: domain::ChatId::generate(),
            ..text_request(&harness, "ghost chat")
        };

        let outcome = harness.engine.ingest(request).await.unwrap();
        assert!(matches!(
            outcome,
            IngestOutcome::Dropped(DropReason::NotMember)
        ));
    }

    #[tokio::test]
    async fn whitespace_only_text_is_dropped_before_any_write() {
        let harness = member_chat().await;
        let before = harness.chat().await;

        let outcome = harness
            .engine
            .ingest(text_request(&harness, "  "))
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            IngestOutcome::Dropped(DropReason::EmptyContent)
        ));
        assert!(harness.stored_messages().await.is_empty());
        assert_eq!(harness.chat().await, before);
    }

    #[tokio::test]
    async fn duplicate_request_id_persists_exactly_once() {
        let harness = member_chat().await;
        let request = IngestRequest {
            request_id: Some("r1".to_owned()),
            ..text_request(&harness, "queued send")
        };

        let first = harness.engine.ingest(request.clone()).await.unwrap();
        let second = harness.engine.ingest(request).await.unwrap();

        assert!(first.is_stored());
        assert!(matches!(
            second,
            IngestOutcome::Dropped(DropReason::Duplicate)
        ));
        assert_eq!(harness.stored_messages().await.len(), 1);
        assert_eq!(harness.broadcasts().await.len(), 1);
    }

    #[tokio::test]
    async fn image_only_message_uses_pluralized_preview() {
        let harness = member_chat().await;
        let request = IngestRequest {
            chat_id: harness.chat_id,
            sender_id: harness.member,
            message_type: MessageType::Image,
            text: None,
            image_urls: vec!["a.png".to_owned(), "b.png".to_owned(), "c.png".to_owned()],
            request_id: None,
        };

        let outcome = harness.engine.ingest(request).await.unwrap();
        let IngestOutcome::Stored { chat, .. } = outcome else {
            panic!("expected stored outcome");
        };
        assert_eq!(chat.last_message_text, "3 images");
    }

    #[tokio::test]
    async fn invalidates_recent_cache_for_every_member() {
        let harness = member_chat().await;
        harness.prime_recent_cache().await;

        harness
            .engine
            .ingest(text_request(&harness, "invalidate me"))
            .await
            .unwrap();

        for member in harness.chat().await.members {
            assert!(harness.recent_cache_entry(member).await.is_none());
        }
    }

    #[tokio::test]
    async fn broadcast_carries_profile_snapshot() {
        let harness = member_chat().await;
        harness
            .set_profile(
                harness.member,
                SenderProfile {
                    profile_image: Some("avatar.png".to_owned()),
                    gender: Some("female".to_owned()),
                },
            )
            .await;

        harness
            .engine
            .ingest(text_request(&harness, "with profile"))
            .await
            .unwrap();

        let broadcasts = harness.broadcasts().await;
        assert_eq!(broadcasts.len(), 1);
        assert_eq!(
            broadcasts[0].sender_profile_image.as_deref(),
            Some("avatar.png")
        );
        assert_eq!(broadcasts[0].sender_gender.as_deref(), Some("female"));
    }

    #[tokio::test]
    async fn profile_lookup_failure_yields_null_fields() {
        let harness = member_chat().await;

        harness
            .engine
            .ingest(text_request(&harness, "no profile"))
            .await
            .unwrap();

        let broadcasts = harness.broadcasts().await;
        assert_eq!(broadcasts[0].sender_profile_image, None);
        assert_eq!(broadcasts[0].sender_gender, None);
    }

    #[tokio::test]
    async fn storage_failure_surfaces_as_error_without_broadcast() {
        let harness = member_chat().await;
        harness.fail_message_inserts().await;

        let result = harness.engine.ingest(text_request(&harness, "boom")).await;

        assert!(result.is_err());
        assert!(harness.broadcasts().await.is_empty());
    }

    #[tokio::test]
    async fn marker_is_not_written_when_persistence_fails() {
        let harness = member_chat().await;
        harness.fail_message_inserts().await;

        let request = IngestRequest {
            request_id: Some("r-crash".to_owned()),
            ..text_request(&harness, "will fail")
        };
        let _ = harness.engine.ingest(request.clone()).await;

        // 落库失败后标记不得存在，重投必须被重新处理而不是丢弃。
        harness.restore_message_inserts().await;
        let retry = harness.engine.ingest(request).await.unwrap();
        assert!(retry.is_stored());
        assert_eq!(harness.stored_messages().await.len(), 1);
    }
}
