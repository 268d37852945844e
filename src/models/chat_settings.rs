use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query_as, FromRow, SqlitePool, Type};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Fr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Type, ToSchema)]
pub enum LlmModel {
    #[sqlx(rename = "gpt-3.5-turbo")]
    #[serde(rename = "gpt-3.5-turbo")]
    Gpt35Turbo,
    #[sqlx(rename = "gpt-4")]
    #[serde(rename = "gpt-4")]
    Gpt4,
    #[sqlx(rename = "gpt-4o")]
    #[serde(rename = "gpt-4o")]
    Gpt4o,
}

impl LlmModel {
    /// Model id as the provider expects it.
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmModel::Gpt35Turbo => "gpt-3.5-turbo",
            LlmModel::Gpt4 => "gpt-4",
            LlmModel::Gpt4o => "gpt-4o",
        }
    }

    /// Tokens of past conversation that may be replayed into a prompt for this model.
    pub fn history_token_budget(&self) -> usize {
        match self {
            LlmModel::Gpt35Turbo => 2_000,
            LlmModel::Gpt4 => 4_000,
            LlmModel::Gpt4o => 16_000,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Conversation,
    Qa,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatSettings {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub language: Language,
    pub model: LlmModel,
    #[serde(rename = "type")]
    pub chat_type: ChatType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSettings {
    pub async fn for_chat(pool: &SqlitePool, chat_id: Uuid) -> Result<Self> {
        query_as::<_, ChatSettings>(
            r#"
            SELECT id, chat_id, language, model, chat_type, created_at, updated_at
            FROM chat_settings
            WHERE chat_id = ?
            "#,
        )
        .bind(chat_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("chat settings", chat_id))
    }
}
