use std::sync::Arc;

use sqlx::SqlitePool;

pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod prompts;
pub mod retrieval;
pub mod routes;
pub mod types;

pub use config::AppConfig;

use crate::error::Result;
use crate::llm::{ChatModel, TokenCounter};
use crate::orchestrator::ConversationOrchestrator;
use crate::retrieval::{DocumentReader, ProjectDocumentRetriever};

/// Shared by every handler as `web::Data<Arc<AppState>>`.
pub struct AppState {
    pub config: AppConfig,
    pub pool: SqlitePool,
    pub orchestrator: ConversationOrchestrator,
}

impl AppState {
    /// Wires the orchestrator over `pool` with the given model backend.
    pub fn build(config: AppConfig, pool: SqlitePool, llm: Arc<dyn ChatModel>) -> Result<Self> {
        let documents = DocumentReader::new(config.documents_root.clone());
        let retriever = Arc::new(ProjectDocumentRetriever::new(
            pool.clone(),
            documents.clone(),
            config.retrieval_chunk_lines,
            config.retrieval_top_k,
        ));

        let orchestrator = ConversationOrchestrator::new(
            pool.clone(),
            llm,
            retriever,
            documents,
            TokenCounter::new()?,
            config.llm_timeout,
        );

        Ok(AppState {
            config,
            pool,
            orchestrator,
        })
    }
}
