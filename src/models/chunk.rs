use chrono::Utc;
use sqlx::{query, query_as, FromRow, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::models::OriginalDocument;
use crate::types::RetrievedDocument;

/// A window of consecutive lines of an original document, as stored in the full-text index.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DocumentChunk {
    pub source: String,
    pub content: String,
    /// 1-based, inclusive
    pub line_from: i64,
    pub line_to: i64,
}

impl DocumentChunk {
    /// Splits `text` into windows of `chunk_lines` lines. Blank windows are dropped.
    pub fn split(source: &str, text: &str, chunk_lines: usize) -> Vec<Self> {
        let chunk_lines = chunk_lines.max(1);
        let lines: Vec<&str> = text.lines().collect();
        lines
            .chunks(chunk_lines)
            .enumerate()
            .filter(|(_, window)| window.iter().any(|l| !l.trim().is_empty()))
            .map(|(i, window)| {
                let from = (i * chunk_lines + 1) as i64;
                DocumentChunk {
                    source: source.to_string(),
                    content: window.join("\n"),
                    line_from: from,
                    line_to: from + window.len() as i64 - 1,
                }
            })
            .collect()
    }

    /// Indexes a document once. Returns `false` when it was already indexed.
    pub async fn index(pool: &SqlitePool, document: &OriginalDocument, text: &str, chunk_lines: usize) -> Result<bool> {
        let mut tx = pool.begin().await?;

        // claim first so a concurrent indexer of the same document backs off
        let claimed = query("UPDATE original_documents SET indexed_at = ? WHERE id = ? AND indexed_at IS NULL")
            .bind(Utc::now())
            .bind(document.id)
            .execute(&mut *tx)
            .await?;
        if claimed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        let chunks = Self::split(&document.path, text, chunk_lines);
        for chunk in &chunks {
            query(
                r#"
                INSERT INTO document_chunks (content, document_id, project_id, source, line_from, line_to)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.content)
            .bind(document.id.to_string())
            .bind(document.project_id.to_string())
            .bind(&chunk.source)
            .bind(chunk.line_from)
            .bind(chunk.line_to)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        debug!("Indexed {} chunk(s) of {}", chunks.len(), document.path);
        Ok(true)
    }

    /// Best `limit` chunks of the project for an FTS5 match expression, ranked by bm25.
    pub async fn search(pool: &SqlitePool, project_id: Uuid, fts_query: &str, limit: usize) -> Result<Vec<Self>> {
        let chunks = query_as::<_, DocumentChunk>(
            r#"
            SELECT source, content, line_from, line_to
            FROM document_chunks
            WHERE document_chunks MATCH ? AND project_id = ?
            ORDER BY bm25(document_chunks), source, line_from
            LIMIT ?
            "#,
        )
        .bind(fts_query)
        .bind(project_id.to_string())
        .bind(limit as i64)
        .fetch_all(pool)
        .await?;
        Ok(chunks)
    }

    pub async fn count_for_document(pool: &SqlitePool, document_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM document_chunks WHERE document_id = ?")
            .bind(document_id.to_string())
            .fetch_one(pool)
            .await?;
        Ok(count)
    }
}

impl From<DocumentChunk> for RetrievedDocument {
    fn from(chunk: DocumentChunk) -> Self {
        RetrievedDocument::new(chunk.source, chunk.content, chunk.line_from as u32, chunk.line_to as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use crate::models::Project;

    #[test]
    fn windows_are_numbered_from_one_and_inclusive() {
        let text = (1..=5).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let chunks = DocumentChunk::split("a.txt", &text, 2);
        let ranges: Vec<_> = chunks.iter().map(|c| (c.line_from, c.line_to)).collect();
        assert_eq!(ranges, vec![(1, 2), (3, 4), (5, 5)]);
        assert_eq!(chunks[1].content, "line 3\nline 4");
    }

    #[test]
    fn blank_windows_are_skipped() {
        let chunks = DocumentChunk::split("a.txt", "title\n\n\n\nend", 2);
        let ranges: Vec<_> = chunks.iter().map(|c| (c.line_from, c.line_to)).collect();
        assert_eq!(ranges, vec![(1, 2), (5, 5)]);
    }

    #[tokio::test]
    async fn a_document_is_indexed_once() {
        let pool = connect_in_memory().await.unwrap();
        let project = Project::create(&pool, "p").await.unwrap();
        let document = OriginalDocument::create(&pool, project.id, "a.md").await.unwrap();

        assert!(DocumentChunk::index(&pool, &document, "one\ntwo\nthree", 2).await.unwrap());
        assert!(!DocumentChunk::index(&pool, &document, "one\ntwo\nthree", 2).await.unwrap());
        assert_eq!(DocumentChunk::count_for_document(&pool, document.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn search_ranks_by_bm25_within_the_project() {
        let pool = connect_in_memory().await.unwrap();
        let project = Project::create(&pool, "p").await.unwrap();
        let other = Project::create(&pool, "other").await.unwrap();
        let guide = OriginalDocument::create(&pool, project.id, "guide.md").await.unwrap();
        let foreign = OriginalDocument::create(&pool, other.id, "guide.md").await.unwrap();

        DocumentChunk::index(&pool, &guide, "cargo build\nnothing\ncargo install cargo", 1)
            .await
            .unwrap();
        DocumentChunk::index(&pool, &foreign, "cargo cargo cargo", 1).await.unwrap();

        let found = DocumentChunk::search(&pool, project.id, "\"cargo\" OR \"install\"", 5)
            .await
            .unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!((found[0].line_from, found[0].content.as_str()), (3, "cargo install cargo"));
        assert_eq!(found[1].line_from, 1);
    }
}
