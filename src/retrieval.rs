//! Excerpt retrieval over a project's original documents.
//!
//! Documents are split into fixed windows of lines and indexed into an SQLite FTS5 table the
//! first time their project is queried. Windows are ranked with bm25.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::document::is_below_root;
use crate::models::{DocumentChunk, OriginalDocument};
use crate::types::RetrievedDocument;

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Most relevant excerpts for `query` among the documents of a project, best first.
    async fn retrieve(&self, project_id: Uuid, query: &str) -> Result<Vec<RetrievedDocument>>;
}

/// Reads original documents from below a root directory. Nothing outside the root is readable.
#[derive(Debug, Clone)]
pub struct DocumentReader {
    root: PathBuf,
}

impl DocumentReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Joins a relative document path onto the root; `None` for absolute or `..` paths.
    pub fn resolve(&self, path: &str) -> Option<PathBuf> {
        is_below_root(path).then(|| self.root.join(Path::new(path)))
    }

    pub async fn read(&self, path: &str) -> Result<String> {
        let outside = || AppError::NotFound {
            entity: "document file",
            key: path.to_string(),
        };

        let joined = self.resolve(path).ok_or_else(outside)?;
        let root = tokio::fs::canonicalize(&self.root).await.map_err(|_| outside())?;
        // symlinks inside the root may still point elsewhere
        let resolved = match tokio::fs::canonicalize(&joined).await {
            Ok(resolved) => resolved,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(outside()),
            Err(e) => return Err(AppError::Io(e)),
        };
        if !resolved.starts_with(&root) {
            warn!("Refusing to read {} outside of {}", resolved.display(), root.display());
            return Err(outside());
        }

        Ok(tokio::fs::read_to_string(&resolved).await?)
    }
}

pub struct ProjectDocumentRetriever {
    pool: SqlitePool,
    documents: DocumentReader,
    chunk_lines: usize,
    top_k: usize,
}

impl ProjectDocumentRetriever {
    pub fn new(pool: SqlitePool, documents: DocumentReader, chunk_lines: usize, top_k: usize) -> Self {
        Self {
            pool,
            documents,
            chunk_lines: chunk_lines.max(1),
            top_k,
        }
    }

    /// Indexes the project's documents that are not indexed yet. Unreadable files are skipped
    /// and retried on the next query.
    async fn index_pending(&self, project_id: Uuid) -> Result<()> {
        for document in OriginalDocument::list_unindexed(&self.pool, project_id).await? {
            let text = match self.documents.read(&document.path).await {
                Ok(text) => text,
                Err(e) if e.is_not_found() => {
                    warn!("Skipping document {} of project {}: {}", document.path, project_id, e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            if DocumentChunk::index(&self.pool, &document, &text, self.chunk_lines).await? {
                info!("Indexed document {} of project {}", document.path, project_id);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Retriever for ProjectDocumentRetriever {
    async fn retrieve(&self, project_id: Uuid, query: &str) -> Result<Vec<RetrievedDocument>> {
        let Some(fts_query) = fts_query(query) else {
            return Ok(Vec::new());
        };
        if self.top_k == 0 {
            return Ok(Vec::new());
        }

        self.index_pending(project_id).await?;

        let chunks = DocumentChunk::search(&self.pool, project_id, &fts_query, self.top_k).await?;
        debug!("{} excerpt(s) matched {}", chunks.len(), fts_query);
        Ok(chunks.into_iter().map(RetrievedDocument::from).collect())
    }
}

/// FTS5 expression matching any word of the query; only lowercased alphanumeric words of at
/// least three characters are kept, each quoted.
fn fts_query(text: &str) -> Option<String> {
    let terms: BTreeSet<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(str::to_lowercase)
        .collect();
    if terms.is_empty() {
        return None;
    }
    Some(
        terms
            .iter()
            .map(|t| format!("\"{t}\""))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}
