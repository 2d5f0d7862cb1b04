//! Postgres 仓储实现。

mod chats;
mod messages;
mod profiles;

pub use chats::PgChatRepository;
pub use messages::PgMessageRepository;
pub use profiles::PgProfileLookup;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// 创建 Postgres 连接池。
pub async fn create_pg_pool(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
}

pub(crate) fn map_sqlx_err(err: sqlx::Error) -> application::RepositoryError {
    application::RepositoryError::storage(err.to_string())
}
