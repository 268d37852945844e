use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::SqlitePool;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::llm::{summarize, ChatModel, ConversationChain, ConversationMemory, RetrievalQaChain, TokenCounter};
use crate::models::{Chat, ChatDetail, ChatType, OriginalDocument, Origin};
use crate::retrieval::{DocumentReader, Retriever};
use crate::types::ChainInput;

/// Turns a user query into a persisted exchange: stores the question, asks the model (with
/// retrieval for Q&A chats), stores the answer and hands back the transcript.
///
/// Work on one chat is serialized so the stored order always matches what the model was shown.
/// Different chats run concurrently.
pub struct ConversationOrchestrator {
    pool: SqlitePool,
    llm: Arc<dyn ChatModel>,
    retriever: Arc<dyn Retriever>,
    documents: DocumentReader,
    tokens: TokenCounter,
    llm_timeout: Duration,
    chat_locks: Cache<Uuid, Arc<Mutex<()>>>,
}

impl ConversationOrchestrator {
    pub fn new(
        pool: SqlitePool,
        llm: Arc<dyn ChatModel>,
        retriever: Arc<dyn Retriever>,
        documents: DocumentReader,
        tokens: TokenCounter,
        llm_timeout: Duration,
    ) -> Self {
        // unbounded: a size-based eviction could hand two callers different locks for one chat
        let chat_locks = Cache::builder().time_to_idle(Duration::from_secs(15 * 60)).build();

        Self {
            pool,
            llm,
            retriever,
            documents,
            tokens,
            llm_timeout,
            chat_locks,
        }
    }

    async fn lock_chat(&self, chat_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = self
            .chat_locks
            .get_with(chat_id, async { Arc::new(Mutex::new(())) })
            .await;
        lock.lock_owned().await
    }

    /// Runs a model call under the configured timeout.
    async fn bounded<T>(&self, chat_id: Uuid, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.llm_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                error!("Model call for chat {} timed out after {:?}", chat_id, self.llm_timeout);
                Err(AppError::Llm(format!(
                    "the model did not answer within {} seconds",
                    self.llm_timeout.as_secs_f32()
                )))
            }
        }
    }

    /// An empty completion is a model failure, not something to store.
    fn non_empty(chat_id: Uuid, answer: String) -> Result<String> {
        if answer.trim().is_empty() {
            error!("Model returned an empty answer for chat {}", chat_id);
            return Err(AppError::Llm("the model returned an empty answer".into()));
        }
        Ok(answer)
    }

    pub async fn query(&self, chat_id: Uuid, query: &str) -> Result<ChatDetail> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Invalid("query must not be empty".into()));
        }

        let _guard = self.lock_chat(chat_id).await;

        let detail = Chat::add_message(&self.pool, chat_id, query, Origin::User).await?;
        let asked = detail.messages().last().map(|m| m.id);
        let settings = detail.settings.clone();
        info!(
            "Query on chat {} ({:?}, {}, {:?})",
            chat_id,
            settings.chat_type,
            settings.model.as_str(),
            settings.language
        );

        let memory = ConversationMemory::from_transcript(
            &detail,
            asked,
            &self.tokens,
            settings.model.history_token_budget(),
        );
        let input = ChainInput {
            input: query.to_string(),
        };

        match settings.chat_type {
            ChatType::Conversation => {
                let chain = ConversationChain::new(self.llm.as_ref(), settings.model, settings.language, memory);
                let output = self.bounded(chat_id, chain.call(input)).await?;
                let response = Self::non_empty(chat_id, output.response)?;
                Chat::add_message(&self.pool, chat_id, &response, Origin::Llm).await
            }
            ChatType::Qa => {
                let chain = RetrievalQaChain::new(
                    self.llm.as_ref(),
                    self.retriever.as_ref(),
                    settings.model,
                    settings.language,
                    memory,
                );
                let mut output = self.bounded(chat_id, chain.call(detail.chat.project_id, input)).await?;
                output.text = Self::non_empty(chat_id, output.text)?;
                Chat::add_message_with_sources(&self.pool, chat_id, &output).await
            }
        }
    }

    /// Summarizes one of the project's documents in the chat's language and stores it on the chat.
    pub async fn summarize_document(&self, chat_id: Uuid, document_id: Uuid) -> Result<ChatDetail> {
        let _guard = self.lock_chat(chat_id).await;

        let chat = Chat::detail(&self.pool, chat_id).await?;
        let document = OriginalDocument::get(&self.pool, document_id).await?;
        if document.project_id != chat.chat.project_id {
            return Err(AppError::NotFound {
                entity: "original document",
                key: format!("{} in project {}", document_id, chat.chat.project_id),
            });
        }

        let text = self.documents.read(&document.path).await?;
        info!("Summarizing {} for chat {}", document.path, chat_id);

        let settings = &chat.settings;
        let summary = self
            .bounded(
                chat_id,
                summarize(self.llm.as_ref(), &self.tokens, settings.model, settings.language, &text),
            )
            .await?;
        let summary = Self::non_empty(chat_id, summary)?;

        Chat::add_summary(&self.pool, chat_id, document.id, &summary).await
    }
}
