//! 测试用内存假件。
//!
//! 为全部端口提供内存实现，摄入引擎与会话服务的行为测试都跑在这套
//! 假件上，无需外部存储。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use domain::{Chat, ChatId, ChatKind, ChatSummary, Message, MessageId, Timestamp, UserId};
use tokio::sync::RwLock;

use crate::clock::SystemClock;
use crate::errors::{CacheError, RepositoryError};
use crate::ingestion::{IngestionDependencies, IngestionEngine};
use crate::ports::{
    BroadcastError, ChatBroadcaster, ChatRepository, IdempotencyStore, MessageBroadcast,
    MessageRepository, ProfileLookup, RecentChatsCache, SenderProfile,
};
use crate::services::{ChatService, ChatServiceDependencies};

#[derive(Default)]
pub struct InMemoryChatRepository {
    chats: RwLock<HashMap<ChatId, Chat>>,
}

#[async_trait]
impl ChatRepository for InMemoryChatRepository {
    async fn create(&self, chat: Chat) -> Result<Chat, RepositoryError> {
        self.chats.write().await.insert(chat.id, chat.clone());
        Ok(chat)
    }

    async fn find_by_id(&self, id: ChatId) -> Result<Option<Chat>, RepositoryError> {
        Ok(self.chats.read().await.get(&id).cloned())
    }

    async fn apply_message(
        &self,
        id: ChatId,
        preview: &str,
        at: Timestamp,
    ) -> Result<Chat, RepositoryError> {
        let mut chats = self.chats.write().await;
        let chat = chats.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        chat.message_count += 1;
        chat.last_message_text = preview.to_owned();
        chat.last_message_at = Some(at);
        chat.updated_at = at;
        Ok(chat.clone())
    }

    async fn list_recent_for_member(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<ChatSummary>, RepositoryError> {
        let mut chats: Vec<Chat> = self
            .chats
            .read()
            .await
            .values()
            .filter(|chat| chat.is_member(user_id))
            .cloned()
            .collect();
        chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        chats.truncate(limit as usize);
        Ok(chats.into_iter().map(ChatSummary::from).collect())
    }
}

#[derive(Default)]
pub struct InMemoryMessageRepository {
    messages: RwLock<Vec<Message>>,
    fail_inserts: RwLock<bool>,
    last_page_limit: RwLock<Option<u32>>,
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn insert(&self, message: Message) -> Result<(), RepositoryError> {
        if *self.fail_inserts.read().await {
            return Err(RepositoryError::storage("simulated insert failure"));
        }
        self.messages.write().await.push(message);
        Ok(())
    }

    async fn list_page(
        &self,
        chat_id: ChatId,
        limit: u32,
        before: Option<MessageId>,
    ) -> Result<Vec<Message>, RepositoryError> {
        *self.last_page_limit.write().await = Some(limit);
        let mut page: Vec<Message> = self
            .messages
            .read()
            .await
            .iter()
            .filter(|message| message.chat_id == chat_id)
            .filter(|message| before.map_or(true, |cursor| message.id < cursor))
            .cloned()
            .collect();
        page.sort_by(|a, b| b.id.cmp(&a.id));
        page.truncate(limit as usize);
        Ok(page)
    }
}

#[derive(Default)]
pub struct InMemoryIdempotencyStore {
    markers: RwLock<HashSet<String>>,
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn seen(&self, request_id: &str) -> Result<bool, CacheError> {
        Ok(self.markers.read().await.contains(request_id))
    }

    async fn mark(&self, request_id: &str) -> Result<bool, CacheError> {
        Ok(self.markers.write().await.insert(request_id.to_owned()))
    }
}

#[derive(Default)]
pub struct InMemoryRecentChatsCache {
    entries: RwLock<HashMap<UserId, Vec<ChatSummary>>>,
}

#[async_trait]
impl RecentChatsCache for InMemoryRecentChatsCache {
    async fn get(&self, user_id: UserId) -> Result<Option<Vec<ChatSummary>>, CacheError> {
        Ok(self.entries.read().await.get(&user_id).cloned())
    }

    async fn put(&self, user_id: UserId, chats: &[ChatSummary]) -> Result<(), CacheError> {
        self.entries.write().await.insert(user_id, chats.to_vec());
        Ok(())
    }

    async fn invalidate(&self, user_ids: &[UserId]) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        for user_id in user_ids {
            entries.remove(user_id);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingBroadcaster {
    sent: RwLock<Vec<MessageBroadcast>>,
}

#[async_trait]
impl ChatBroadcaster for RecordingBroadcaster {
    async fn broadcast(&self, payload: MessageBroadcast) -> Result<(), BroadcastError> {
        self.sent.write().await.push(payload);
        Ok(())
    }
}

#[derive(Default)]
pub struct StaticProfileLookup {
    profiles: RwLock<HashMap<UserId, SenderProfile>>,
}

#[async_trait]
impl ProfileLookup for StaticProfileLookup {
    async fn snapshot(&self, user_id: UserId) -> Option<SenderProfile> {
        self.profiles.read().await.get(&user_id).cloned()
    }
}

/// 预置好一个双人会话和全套假件的测试环境。
pub struct TestHarness {
    pub engine: IngestionEngine,
    pub service: ChatService,
    pub chat_id: ChatId,
    pub member: UserId,
    pub second_member: UserId,
    pub outsider: UserId,
    chats: Arc<InMemoryChatRepository>,
    messages: Arc<InMemoryMessageRepository>,
    recent_chats: Arc<InMemoryRecentChatsCache>,
    broadcaster: Arc<RecordingBroadcaster>,
    profiles: Arc<StaticProfileLookup>,
}

/// 创建一个 member + second_member 的群聊环境，outsider 不在成员中。
pub async fn member_chat() -> TestHarness {
    let chats = Arc::new(InMemoryChatRepository::default());
    let messages = Arc::new(InMemoryMessageRepository::default());
    let idempotency = Arc::new(InMemoryIdempotencyStore::default());
    let recent_chats = Arc::new(InMemoryRecentChatsCache::default());
    let broadcaster = Arc::new(RecordingBroadcaster::default());
    let profiles = Arc::new(StaticProfileLookup::default());
    let clock = Arc::new(SystemClock);

    let member = UserId::new(uuid::Uuid::new_v4());
    let second_member = UserId::new(uuid::Uuid::new_v4());
    let outsider = UserId::new(uuid::Uuid::new_v4());

    let chat = Chat::new(
        ChatKind::Group,
        Some("test chat".to_owned()),
        member,
        vec![second_member],
        chrono::Utc::now(),
    )
    .unwrap();
    let chat = chats.create(chat).await.unwrap();

    let engine = IngestionEngine::new(IngestionDependencies {
        chats: chats.clone(),
        messages: messages.clone(),
        idempotency,
        recent_chats: recent_chats.clone(),
        broadcaster: broadcaster.clone(),
        profiles: profiles.clone(),
        clock: clock.clone(),
    });

    let service = ChatService::new(ChatServiceDependencies {
        chats: chats.clone(),
        messages: messages.clone(),
        recent_chats: recent_chats.clone(),
        clock,
    });

    TestHarness {
        engine,
        service,
        chat_id: chat.id,
        member,
        second_member,
        outsider,
        chats,
        messages,
        recent_chats,
        broadcaster,
        profiles,
    }
}

impl TestHarness {
    pub async fn chat(&self) -> Chat {
        self.chats.find_by_id(self.chat_id).await.unwrap().unwrap()
    }

    pub async fn stored_messages(&self) -> Vec<Message> {
        self.messages.messages.read().await.clone()
    }

    pub async fn broadcasts(&self) -> Vec<MessageBroadcast> {
        self.broadcaster.sent.read().await.clone()
    }

    pub async fn last_page_limit(&self) -> Option<u32> {
        *self.messages.last_page_limit.read().await
    }

    /// 给全部成员灌一份缓存条目，返回灌入的内容。
    pub async fn prime_recent_cache(&self) -> Vec<ChatSummary> {
        let summary = ChatSummary::from(self.chat().await);
        let entry = vec![summary];
        for member in self.chat().await.members {
            self.recent_chats.put(member, &entry).await.unwrap();
        }
        entry
    }

    pub async fn recent_cache_entry(&self, user_id: UserId) -> Option<Vec<ChatSummary>> {
        self.recent_chats.get(user_id).await.unwrap()
    }

    pub async fn set_profile(&self, user_id: UserId, profile: SenderProfile) {
        self.profiles.profiles.write().await.insert(user_id, profile);
    }

    pub async fn fail_message_inserts(&self) {
        *self.messages.fail_inserts.write().await = true;
    }

    pub async fn restore_message_inserts(&self) {
        *self.messages.fail_inserts.write().await = false;
    }
}
