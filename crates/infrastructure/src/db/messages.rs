use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use application::{MessageRepository, RepositoryError};
use domain::{ChatId, Message, MessageId, MessageType, UserId};

use super::map_sqlx_err;

#[derive(Debug, FromRow)]
struct MessageRecord {
    id: Uuid,
    chat_id: Uuid,
    sender_id: Uuid,
    message_type: String,
    text: Option<String>,
    image_urls: Vec<String>,
    created_at: DateTime<Utc>,
}

fn type_to_str(message_type: MessageType) -> &'static str {
    match message_type {
        MessageType::Text => "text",
        MessageType::Image => "image",
    }
}

fn type_from_str(value: &str) -> Result<MessageType, RepositoryError> {
    match value {
        "text" => Ok(MessageType::Text),
        "image" => Ok(MessageType::Image),
        other => Err(RepositoryError::storage(format!(
            "unknown message type: {}",
            other
        ))),
    }
}

impl TryFrom<MessageRecord> for Message {
    type Error = RepositoryError;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        Ok(Message {
            id: MessageId::from(value.id),
            chat_id: ChatId::from(value.chat_id),
            sender_id: UserId::from(value.sender_id),
            message_type: type_from_str(&value.message_type)?,
            text: value.text,
            image_urls: value.image_urls,
            created_at: value.created_at,
        })
    }
}

pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn insert(&self, message: Message) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO messages (id, chat_id, sender_id, message_type, text, image_urls, \
             created_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(message.id.0)
        .bind(message.chat_id.0)
        .bind(message.sender_id.0)
        .bind(type_to_str(message.message_type))
        .bind(&message.text)
        .bind(&message.image_urls)
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(())
    }

    async fn list_page(
        &self,
        chat_id: ChatId,
        limit: u32,
        before: Option<MessageId>,
    ) -> Result<Vec<Message>, RepositoryError> {
        // (chat_id, id desc) 索引扫描；UUIDv7 的 id 序即时间序。
        let records = sqlx::query_as::<_, MessageRecord>(
            "SELECT id, chat_id, sender_id, message_type, text, image_urls, created_at \
             FROM messages \
             WHERE chat_id = $1 AND ($2::uuid IS NULL OR id < $2) \
             ORDER BY id DESC LIMIT $3",
        )
        .bind(chat_id.0)
        .bind(before.map(|cursor| cursor.0))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(Message::try_from).collect()
    }
}
