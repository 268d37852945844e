use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query, query_as, FromRow, Sqlite, SqlitePool, Type};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::SourceDocument;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(rename_all = "lowercase")] // SQL value name
#[serde(rename_all = "lowercase")] // JSON value name
pub enum Origin {
    User,
    Llm,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub content: String,
    pub origin: Origin,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    #[serde(default)]
    pub sources: Vec<SourceDocument>,
}

impl Default for ChatMessage {
    fn default() -> Self {
        ChatMessage {
            id: Uuid::new_v4(),
            chat_id: Uuid::nil(),
            content: String::new(),
            origin: Origin::User,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            sources: Vec::new(),
        }
    }
}

impl ChatMessage {
    /// Saves a message; the caller is responsible for the chat existing.
    pub async fn insert<'e, E>(executor: E, chat_id: Uuid, content: &str, origin: Origin) -> Result<Self>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        if content.trim().is_empty() {
            return Err(AppError::Invalid("message content must not be empty".into()));
        }

        let message = ChatMessage {
            chat_id,
            content: content.to_string(),
            origin,
            ..Default::default()
        };

        query(
            r#"
            INSERT INTO chat_messages (id, chat_id, content, origin, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(message.id)
        .bind(message.chat_id)
        .bind(&message.content)
        .bind(message.origin)
        .bind(message.created_at)
        .bind(message.updated_at)
        .execute(executor)
        .await?;

        Ok(message)
    }

    /// The chat's transcript, oldest first, with source excerpts attached.
    pub async fn list_for_chat(pool: &SqlitePool, chat_id: Uuid) -> Result<Vec<Self>> {
        let mut messages = query_as::<_, ChatMessage>(
            r#"
            SELECT id, chat_id, content, origin, created_at, updated_at
            FROM chat_messages
            WHERE chat_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(chat_id)
        .fetch_all(pool)
        .await?;

        let mut by_message: HashMap<Uuid, Vec<SourceDocument>> = HashMap::new();
        for source in SourceDocument::list_for_chat(pool, chat_id).await? {
            by_message.entry(source.message_id).or_default().push(source);
        }
        for message in &mut messages {
            if let Some(sources) = by_message.remove(&message.id) {
                message.sources = sources;
            }
        }

        Ok(messages)
    }

    pub async fn count_for_chat(pool: &SqlitePool, chat_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_messages WHERE chat_id = ?")
            .bind(chat_id)
            .fetch_one(pool)
            .await?;
        Ok(count)
    }
}
