//! 应用层实现。
//!
//! 消息摄入引擎是这里的核心：同步（WebSocket）与异步（事件日志）两条
//! 入口都收敛到同一个 `ingest` 操作，鉴权 / 幂等 / 持久化 / 缓存失效 /
//! 实时广播的契约只实现一次。对外部适配器（存储、缓存、广播、资料查询）
//! 统一通过 trait 端口抽象。

pub mod authorizer;
pub mod clock;
pub mod errors;
pub mod ingestion;
pub mod ports;
pub mod services;

#[cfg(test)]
pub(crate) mod test_support;

pub use authorizer::MembershipAuthorizer;
pub use clock::{Clock, SystemClock};
pub use errors::{ApplicationError, ApplicationResult, CacheError, RepositoryError};
pub use ingestion::{
    DropReason, IngestOutcome, IngestRequest, IngestionDependencies, IngestionEngine,
};
pub use ports::{
    BroadcastError, ChatBroadcaster, ChatRepository, IdempotencyStore, MessageBroadcast,
    MessageRepository, ProfileLookup, RecentChatsCache, SenderProfile,
};
pub use services::{ChatService, ChatServiceDependencies, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
