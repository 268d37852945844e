use std::path::{Component, Path};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query, query_as, FromRow, Sqlite, SqlitePool};
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::Project;
use crate::types::RetrievedDocument;

/// A source file registered on a project, referenced by path.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OriginalDocument {
    pub id: Uuid,
    pub project_id: Uuid,
    pub path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OriginalDocument {
    pub async fn create(pool: &SqlitePool, project_id: Uuid, path: &str) -> Result<Self> {
        let path = path.trim();
        if path.is_empty() {
            return Err(AppError::Invalid("document path must not be empty".into()));
        }
        if !is_below_root(path) {
            return Err(AppError::Invalid(format!(
                "document path {path} must be relative to the documents root, without '..'"
            )));
        }
        Project::get(pool, project_id).await?;

        let now = Utc::now();
        let document = OriginalDocument {
            id: Uuid::new_v4(),
            project_id,
            path: path.to_string(),
            created_at: now,
            updated_at: now,
        };

        query(
            r#"
            INSERT INTO original_documents (id, project_id, path, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(document.id)
        .bind(document.project_id)
        .bind(&document.path)
        .bind(document.created_at)
        .bind(document.updated_at)
        .execute(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Invalid(format!("document {path} is already registered on this project"))
            }
            other => AppError::Database(other),
        })?;

        debug!("Original document registered: {:?}", document);
        Ok(document)
    }

    pub async fn get(pool: &SqlitePool, document_id: Uuid) -> Result<Self> {
        query_as::<_, OriginalDocument>(
            "SELECT id, project_id, path, created_at, updated_at FROM original_documents WHERE id = ?",
        )
        .bind(document_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("original document", document_id))
    }

    pub async fn list_by_project(pool: &SqlitePool, project_id: Uuid) -> Result<Vec<Self>> {
        let documents = query_as::<_, OriginalDocument>(
            r#"
            SELECT id, project_id, path, created_at, updated_at
            FROM original_documents
            WHERE project_id = ?
            ORDER BY path ASC
            "#,
        )
        .bind(project_id)
        .fetch_all(pool)
        .await?;
        Ok(documents)
    }

    /// Documents of the project that are not in the full-text index yet.
    pub async fn list_unindexed(pool: &SqlitePool, project_id: Uuid) -> Result<Vec<Self>> {
        let documents = query_as::<_, OriginalDocument>(
            r#"
            SELECT id, project_id, path, created_at, updated_at
            FROM original_documents
            WHERE project_id = ? AND indexed_at IS NULL
            ORDER BY path ASC
            "#,
        )
        .bind(project_id)
        .fetch_all(pool)
        .await?;
        Ok(documents)
    }

    /// Looks a document up by its path inside one project. Usable inside a transaction.
    pub async fn find_by_path<'e, E>(executor: E, project_id: Uuid, path: &str) -> Result<Option<Self>>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let document = query_as::<_, OriginalDocument>(
            r#"
            SELECT id, project_id, path, created_at, updated_at
            FROM original_documents
            WHERE project_id = ? AND path = ?
            "#,
        )
        .bind(project_id)
        .bind(path)
        .fetch_optional(executor)
        .await?;
        Ok(document)
    }
}

/// True for relative paths made only of plain components.
pub fn is_below_root(path: &str) -> bool {
    Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Excerpt of an original document cited by an LLM message.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SourceDocument {
    pub id: Uuid,
    pub message_id: Uuid,
    pub original_document_id: Uuid,
    pub source: String,
    pub page_content: String,
    pub line_from: i64,
    pub line_to: i64,
    pub created_at: DateTime<Utc>,
}

impl SourceDocument {
    pub async fn insert<'e, E>(
        executor: E,
        message_id: Uuid,
        original_document_id: Uuid,
        retrieved: &RetrievedDocument,
    ) -> Result<Self>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let lines = retrieved.lines();
        let source_document = SourceDocument {
            id: Uuid::new_v4(),
            message_id,
            original_document_id,
            source: retrieved.source().to_string(),
            page_content: retrieved.page_content.clone(),
            line_from: i64::from(lines.from),
            line_to: i64::from(lines.to),
            created_at: Utc::now(),
        };

        query(
            r#"
            INSERT INTO source_documents
                (id, message_id, original_document_id, source, page_content, line_from, line_to, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(source_document.id)
        .bind(source_document.message_id)
        .bind(source_document.original_document_id)
        .bind(&source_document.source)
        .bind(&source_document.page_content)
        .bind(source_document.line_from)
        .bind(source_document.line_to)
        .bind(source_document.created_at)
        .execute(executor)
        .await?;

        Ok(source_document)
    }

    /// Every excerpt attached to any message of the chat, in insertion order.
    pub async fn list_for_chat(pool: &SqlitePool, chat_id: Uuid) -> Result<Vec<Self>> {
        let sources = query_as::<_, SourceDocument>(
            r#"
            SELECT sd.id, sd.message_id, sd.original_document_id, sd.source, sd.page_content,
                   sd.line_from, sd.line_to, sd.created_at
            FROM source_documents sd
            JOIN chat_messages m ON m.id = sd.message_id
            WHERE m.chat_id = ?
            ORDER BY sd.rowid ASC
            "#,
        )
        .bind(chat_id)
        .fetch_all(pool)
        .await?;
        Ok(sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;

    #[test]
    fn only_plain_relative_paths_stay_below_the_root() {
        assert!(is_below_root("guide.md"));
        assert!(is_below_root("./docs/guide.md"));
        assert!(!is_below_root("/etc/passwd"));
        assert!(!is_below_root("../secret.txt"));
        assert!(!is_below_root("docs/../../secret.txt"));
    }

    #[tokio::test]
    async fn paths_leaving_the_documents_root_are_refused() {
        let pool = connect_in_memory().await.unwrap();
        let project = Project::create(&pool, "p").await.unwrap();

        for path in ["/etc/passwd", "../secret.txt", "docs/../../secret.txt"] {
            let err = OriginalDocument::create(&pool, project.id, path).await.unwrap_err();
            assert!(matches!(err, AppError::Invalid(_)), "{path} was accepted");
        }
        assert!(OriginalDocument::list_by_project(&pool, project.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn same_path_twice_is_invalid() {
        let pool = connect_in_memory().await.unwrap();
        let project = Project::create(&pool, "p").await.unwrap();
        OriginalDocument::create(&pool, project.id, "docs/guide.md").await.unwrap();
        let err = OriginalDocument::create(&pool, project.id, " docs/guide.md ").await.unwrap_err();
        assert!(matches!(err, AppError::Invalid(_)));
    }

    #[tokio::test]
    async fn only_unindexed_documents_are_listed_for_indexing() {
        let pool = connect_in_memory().await.unwrap();
        let project = Project::create(&pool, "p").await.unwrap();
        let a = OriginalDocument::create(&pool, project.id, "a.md").await.unwrap();
        OriginalDocument::create(&pool, project.id, "b.md").await.unwrap();

        crate::models::DocumentChunk::index(&pool, &a, "alpha", 5).await.unwrap();

        let pending = OriginalDocument::list_unindexed(&pool, project.id).await.unwrap();
        assert_eq!(pending.iter().map(|d| d.path.as_str()).collect::<Vec<_>>(), vec!["b.md"]);
    }
}
