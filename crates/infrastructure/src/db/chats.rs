use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use application::{ChatRepository, RepositoryError};
use domain::{Chat, ChatId, ChatKind, ChatSummary, Timestamp, UserId};

use super::map_sqlx_err;

#[derive(Debug, FromRow)]
struct ChatRecord {
    id: Uuid,
    kind: String,
    title: Option<String>,
    members: Vec<Uuid>,
    last_message_text: String,
    last_message_at: Option<DateTime<Utc>>,
    message_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn kind_to_str(kind: ChatKind) -> &'static str {
    match kind {
        ChatKind::Direct => "direct",
        ChatKind::Group => "group",
    }
}

fn kind_from_str(value: &str) -> Result<ChatKind, RepositoryError> {
    match value {
        "direct" => Ok(ChatKind::Direct),
        "group" => Ok(ChatKind::Group),
        other => Err(RepositoryError::storage(format!(
            "unknown chat kind: {}",
            other
        ))),
    }
}

impl TryFrom<ChatRecord> for Chat {
    type Error = RepositoryError;

    fn try_from(value: ChatRecord) -> Result<Self, Self::Error> {
        Ok(Chat {
            id: ChatId::from(value.id),
            kind: kind_from_str(&value.kind)?,
            title: value.title,
            members: value.members.into_iter().map(UserId::from).collect(),
            last_message_text: value.last_message_text,
            last_message_at: value.last_message_at,
            message_count: value.message_count,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

const CHAT_COLUMNS: &str = "id, kind, title, members, last_message_text, last_message_at, \
                            message_count, created_at, updated_at";

pub struct PgChatRepository {
    pool: PgPool,
}

impl PgChatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatRepository for PgChatRepository {
    async fn create(&self, chat: Chat) -> Result<Chat, RepositoryError> {
        let members: Vec<Uuid> = chat.members.iter().map(|member| member.0).collect();
        let record = sqlx::query_as::<_, ChatRecord>(
            "INSERT INTO chats (id, kind, title, members, last_message_text, last_message_at, \
             message_count, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING id, kind, title, members, last_message_text, last_message_at, \
             message_count, created_at, updated_at",
        )
        .bind(chat.id.0)
        .bind(kind_to_str(chat.kind))
        .bind(&chat.title)
        .bind(&members)
        .bind(&chat.last_message_text)
        .bind(chat.last_message_at)
        .bind(chat.message_count)
        .bind(chat.created_at)
        .bind(chat.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Chat::try_from(record)
    }

    async fn find_by_id(&self, id: ChatId) -> Result<Option<Chat>, RepositoryError> {
        let record = sqlx::query_as::<_, ChatRecord>(&format!(
            "SELECT {} FROM chats WHERE id = $1",
            CHAT_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Chat::try_from).transpose()
    }

    async fn apply_message(
        &self,
        id: ChatId,
        preview: &str,
        at: Timestamp,
    ) -> Result<Chat, RepositoryError> {
        // 单条 UPDATE 自增加写摘要，无读-改-写窗口。
        let record = sqlx::query_as::<_, ChatRecord>(
            "UPDATE chats SET message_count = message_count + 1, last_message_text = $2, \
             last_message_at = $3, updated_at = $3 \
             WHERE id = $1 \
             RETURNING id, kind, title, members, last_message_text, last_message_at, \
             message_count, created_at, updated_at",
        )
        .bind(id.0)
        .bind(preview)
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record
            .ok_or(RepositoryError::NotFound)
            .and_then(Chat::try_from)
    }

    async fn list_recent_for_member(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<ChatSummary>, RepositoryError> {
        let records = sqlx::query_as::<_, ChatRecord>(&format!(
            "SELECT {} FROM chats WHERE $1 = ANY(members) ORDER BY updated_at DESC LIMIT $2",
            CHAT_COLUMNS
        ))
        .bind(user_id.0)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records
            .into_iter()
            .map(|record| Chat::try_from(record).map(ChatSummary::from))
            .collect()
    }
}
