//! 基础设施层实现。
//!
//! 提供应用层端口的具体适配器：Postgres 仓储、Redis 缓存
//! （幂等标记 + 最近会话）、Kafka 事件日志消费者、资料查询。

pub mod db;
pub mod kafka;
pub mod redis;

pub use db::{create_pg_pool, PgChatRepository, PgMessageRepository, PgProfileLookup};
pub use kafka::{EventLogConsumer, KafkaError, KafkaResult};
pub use redis::RedisChatCache;
