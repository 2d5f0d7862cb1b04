use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use tracing::warn;

use application::{ProfileLookup, SenderProfile};
use domain::UserId;

#[derive(Debug, FromRow)]
struct ProfileRecord {
    profile_image: Option<String>,
    gender: Option<String>,
}

/// 发送者展示资料点查。
///
/// 只用于装饰广播负载；查询失败或用户不存在都降级为 `None`，
/// 不影响消息链路。
pub struct PgProfileLookup {
    pool: PgPool,
}

impl PgProfileLookup {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileLookup for PgProfileLookup {
    async fn snapshot(&self, user_id: UserId) -> Option<SenderProfile> {
        let result = sqlx::query_as::<_, ProfileRecord>(
            "SELECT profile_image, gender FROM users WHERE id = $1",
        )
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(record) => record.map(|record| SenderProfile {
                profile_image: record.profile_image,
                gender: record.gender,
            }),
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "资料查询失败，广播使用空字段");
                None
            }
        }
    }
}
