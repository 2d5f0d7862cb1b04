//! 幂等标记与最近会话缓存的 Redis 实现。
//!
//! 键格式：
//! - `dedup:chat.req:{requestId}`，哨兵值，60 秒过期
//! - `u:{userId}:recent_chats`，会话摘要 JSON 数组，120 秒过期

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::warn;

use application::{CacheError, IdempotencyStore, RecentChatsCache};
use domain::{ChatSummary, UserId};

/// 幂等标记过期时间（秒）。过期后的重投会被当作新请求重新处理，
/// 这是用可容忍的重复换取标记存储不无限增长。
const DEDUP_TTL_SECS: u64 = 60;
/// 最近会话缓存过期时间（秒）
const RECENT_CHATS_TTL_SECS: u64 = 120;

fn dedup_key(request_id: &str) -> String {
    format!("dedup:chat.req:{}", request_id)
}

fn recent_chats_key(user_id: UserId) -> String {
    format!("u:{}:recent_chats", user_id)
}

fn map_redis_err(err: redis::RedisError) -> CacheError {
    CacheError::backend(err.to_string())
}

/// Redis 缓存适配器，同时实现幂等标记与最近会话两个端口。
#[derive(Clone)]
pub struct RedisChatCache {
    conn: ConnectionManager,
}

impl RedisChatCache {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(map_redis_err)?;
        let conn = ConnectionManager::new(client).await.map_err(map_redis_err)?;
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl IdempotencyStore for RedisChatCache {
    async fn seen(&self, request_id: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        conn.exists(dedup_key(request_id))
            .await
            .map_err(map_redis_err)
    }

    async fn mark(&self, request_id: &str) -> Result<bool, CacheError> {
        // SET NX EX：set-if-absent 是唯一的去重并发原语。
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(dedup_key(request_id))
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(DEDUP_TTL_SECS)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_err)?;
        Ok(reply.is_some())
    }
}

#[async_trait]
impl RecentChatsCache for RedisChatCache {
    async fn get(&self, user_id: UserId) -> Result<Option<Vec<ChatSummary>>, CacheError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(recent_chats_key(user_id))
            .await
            .map_err(map_redis_err)?;

        match raw {
            Some(json) => match serde_json::from_str(&json) {
                Ok(chats) => Ok(Some(chats)),
                Err(err) => {
                    // 损坏条目按未命中处理，下一次写入覆盖。
                    warn!(user_id = %user_id, error = %err, "最近会话缓存条目解析失败");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn put(&self, user_id: UserId, chats: &[ChatSummary]) -> Result<(), CacheError> {
        let json =
            serde_json::to_string(chats).map_err(|err| CacheError::backend(err.to_string()))?;
        let mut conn = self.conn.clone();
        conn.set_ex(recent_chats_key(user_id), json, RECENT_CHATS_TTL_SECS)
            .await
            .map_err(map_redis_err)
    }

    async fn invalidate(&self, user_ids: &[UserId]) -> Result<(), CacheError> {
        if user_ids.is_empty() {
            return Ok(());
        }
        let keys: Vec<String> = user_ids
            .iter()
            .map(|user_id| recent_chats_key(*user_id))
            .collect();
        let mut conn = self.conn.clone();
        conn.del(keys).await.map_err(map_redis_err)
    }
}
