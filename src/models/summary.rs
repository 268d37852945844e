use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query, query_as, FromRow, SqlitePool};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::Result;

/// Model-written condensation of an original document, kept as chat context.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub document_id: Uuid,
    pub document_path: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Summary {
    pub async fn insert(
        pool: &SqlitePool,
        chat_id: Uuid,
        document_id: Uuid,
        content: &str,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        query(
            r#"
            INSERT INTO summaries (id, chat_id, document_id, content, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(chat_id)
        .bind(document_id)
        .bind(content)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;
        Ok(id)
    }

    pub async fn list_for_chat(pool: &SqlitePool, chat_id: Uuid) -> Result<Vec<Self>> {
        let summaries = query_as::<_, Summary>(
            r#"
            SELECT s.id, s.chat_id, s.document_id, d.path AS document_path, s.content,
                   s.created_at, s.updated_at
            FROM summaries s
            JOIN original_documents d ON d.id = s.document_id
            WHERE s.chat_id = ?
            ORDER BY s.created_at ASC, s.rowid ASC
            "#,
        )
        .bind(chat_id)
        .fetch_all(pool)
        .await?;
        Ok(summaries)
    }
}
