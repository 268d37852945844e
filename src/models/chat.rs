use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query, query_as, FromRow, SqlitePool};
use tracing::{debug, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    ChatMessage, ChatSettings, LlmModel, OriginalDocument, Origin, Project, SourceDocument, Summary,
};
use crate::types::{CreateChatRequest, QaOutput, UpdateChatRequest};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A chat with its settings and, when loaded, its transcript and summaries.
/// This is what the client receives.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatDetail {
    #[serde(flatten)]
    pub chat: Chat,
    pub settings: ChatSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<ChatMessage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summaries: Option<Vec<Summary>>,
}

impl ChatDetail {
    pub fn messages(&self) -> &[ChatMessage] {
        self.messages.as_deref().unwrap_or_default()
    }

    pub fn summaries(&self) -> &[Summary] {
        self.summaries.as_deref().unwrap_or_default()
    }
}

impl Default for Chat {
    fn default() -> Self {
        Chat {
            id: Uuid::new_v4(),
            project_id: Uuid::nil(),
            name: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

impl Chat {
    pub async fn get(pool: &SqlitePool, chat_id: Uuid) -> Result<Self> {
        query_as::<_, Chat>("SELECT id, project_id, name, created_at, updated_at FROM chats WHERE id = ?")
            .bind(chat_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::not_found("chat", chat_id))
    }

    /// The full transcript: settings, ordered messages with sources, summaries.
    pub async fn detail(pool: &SqlitePool, chat_id: Uuid) -> Result<ChatDetail> {
        let chat = Chat::get(pool, chat_id).await?;
        chat.load(pool, true, true).await
    }

    async fn load(self, pool: &SqlitePool, with_messages: bool, with_summaries: bool) -> Result<ChatDetail> {
        let settings = ChatSettings::for_chat(pool, self.id).await?;
        let messages = if with_messages {
            Some(ChatMessage::list_for_chat(pool, self.id).await?)
        } else {
            None
        };
        let summaries = if with_summaries {
            Some(Summary::list_for_chat(pool, self.id).await?)
        } else {
            None
        };
        Ok(ChatDetail {
            chat: self,
            settings,
            messages,
            summaries,
        })
    }

    pub async fn list_by_project(
        pool: &SqlitePool,
        project_id: Uuid,
        with_messages: bool,
        with_summaries: bool,
    ) -> Result<Vec<ChatDetail>> {
        Project::get(pool, project_id).await?;

        let chats = query_as::<_, Chat>(
            r#"
            SELECT id, project_id, name, created_at, updated_at
            FROM chats
            WHERE project_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(project_id)
        .fetch_all(pool)
        .await?;

        let mut details = Vec::with_capacity(chats.len());
        for chat in chats {
            details.push(chat.load(pool, with_messages, with_summaries).await?);
        }
        Ok(details)
    }

    /// Creates the chat and its settings in one transaction.
    pub async fn create(pool: &SqlitePool, project_id: Uuid, request: &CreateChatRequest) -> Result<ChatDetail> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AppError::Invalid("chat name must not be empty".into()));
        }
        Project::get(pool, project_id).await?;

        let chat = Chat {
            project_id,
            name: name.to_string(),
            ..Default::default()
        };
        let settings = ChatSettings {
            id: Uuid::new_v4(),
            chat_id: chat.id,
            language: request.settings.language,
            model: request.settings.model,
            chat_type: request.settings.chat_type,
            created_at: chat.created_at,
            updated_at: chat.updated_at,
        };

        let mut tx = pool.begin().await?;
        query(
            r#"
            INSERT INTO chats (id, project_id, name, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(chat.id)
        .bind(chat.project_id)
        .bind(&chat.name)
        .bind(chat.created_at)
        .bind(chat.updated_at)
        .execute(&mut *tx)
        .await?;

        query(
            r#"
            INSERT INTO chat_settings (id, chat_id, language, model, chat_type, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(settings.id)
        .bind(settings.chat_id)
        .bind(settings.language)
        .bind(settings.model)
        .bind(settings.chat_type)
        .bind(settings.created_at)
        .bind(settings.updated_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        info!("Chat {} created in project {}", chat.id, project_id);
        Ok(ChatDetail {
            chat,
            settings,
            messages: Some(Vec::new()),
            summaries: Some(Vec::new()),
        })
    }

    /// Renames the chat and/or patches its settings. Absent fields are left untouched.
    pub async fn update(pool: &SqlitePool, chat_id: Uuid, request: &UpdateChatRequest) -> Result<ChatDetail> {
        let chat = Chat::get(pool, chat_id).await?;
        let now = Utc::now();

        let name = match request.name.as_deref().map(str::trim) {
            Some("") => return Err(AppError::Invalid("chat name must not be empty".into())),
            other => other,
        };

        let mut tx = pool.begin().await?;
        if let Some(name) = name {
            query("UPDATE chats SET name = ?, updated_at = ? WHERE id = ?")
                .bind(name)
                .bind(now)
                .bind(chat.id)
                .execute(&mut *tx)
                .await?;
        }

        if let Some(patch) = &request.settings {
            query(
                r#"
                UPDATE chat_settings
                SET language = COALESCE(?, language),
                    model = COALESCE(?, model),
                    chat_type = COALESCE(?, chat_type),
                    updated_at = ?
                WHERE chat_id = ?
                "#,
            )
            .bind(patch.language)
            .bind(patch.model)
            .bind(patch.chat_type)
            .bind(now)
            .bind(chat.id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        debug!("Chat updated: {}", chat.id);
        chat_with_fresh_row(pool, chat_id).await
    }

    pub async fn model(pool: &SqlitePool, chat_id: Uuid) -> Result<LlmModel> {
        Chat::get(pool, chat_id).await?;
        Ok(ChatSettings::for_chat(pool, chat_id).await?.model)
    }

    /// Hard delete; settings, messages, their sources and summaries go with it.
    pub async fn delete(pool: &SqlitePool, chat_id: Uuid) -> Result<()> {
        let result = query("DELETE FROM chats WHERE id = ?")
            .bind(chat_id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("chat", chat_id));
        }

        info!("Chat deleted with id: {}", chat_id);
        Ok(())
    }

    /// Appends one message and returns the updated transcript.
    pub async fn add_message(pool: &SqlitePool, chat_id: Uuid, content: &str, origin: Origin) -> Result<ChatDetail> {
        let chat = Chat::get(pool, chat_id).await?;
        let message = ChatMessage::insert(pool, chat.id, content, origin).await?;
        touch(pool, chat.id, message.created_at).await?;

        debug!("Message {} ({:?}) appended to chat {}", message.id, origin, chat.id);
        chat.load(pool, true, true).await
    }

    /// Appends an LLM answer and attaches its source excerpts. Every excerpt must resolve to an
    /// original document of the chat's own project, otherwise nothing is written.
    pub async fn add_message_with_sources(pool: &SqlitePool, chat_id: Uuid, answer: &QaOutput) -> Result<ChatDetail> {
        let chat = Chat::get(pool, chat_id).await?;

        let mut tx = pool.begin().await?;
        let message = ChatMessage::insert(&mut *tx, chat.id, &answer.text, Origin::Llm).await?;

        let mut resolved: HashMap<&str, Uuid> = HashMap::new();
        for retrieved in &answer.source_documents {
            let document_id = match resolved.get(retrieved.source()) {
                Some(id) => *id,
                None => {
                    let document = OriginalDocument::find_by_path(&mut *tx, chat.project_id, retrieved.source())
                        .await?
                        .ok_or_else(|| AppError::NotFound {
                            entity: "original document",
                            key: format!("{} in project {}", retrieved.source(), chat.project_id),
                        })?;
                    resolved.insert(retrieved.source(), document.id);
                    document.id
                }
            };
            SourceDocument::insert(&mut *tx, message.id, document_id, retrieved).await?;
        }

        query("UPDATE chats SET updated_at = ? WHERE id = ?")
            .bind(message.created_at)
            .bind(chat.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!(
            "Message {} appended to chat {} with {} source(s)",
            message.id,
            chat.id,
            answer.source_documents.len()
        );
        chat.load(pool, true, true).await
    }

    /// Stores a summary of one of the project's documents on the chat.
    pub async fn add_summary(pool: &SqlitePool, chat_id: Uuid, document_id: Uuid, content: &str) -> Result<ChatDetail> {
        let chat = Chat::get(pool, chat_id).await?;
        let document = OriginalDocument::get(pool, document_id).await?;
        if document.project_id != chat.project_id {
            return Err(AppError::NotFound {
                entity: "original document",
                key: format!("{} in project {}", document_id, chat.project_id),
            });
        }
        if content.trim().is_empty() {
            return Err(AppError::Invalid("summary must not be empty".into()));
        }

        let summary_id = Summary::insert(pool, chat.id, document.id, content).await?;
        touch(pool, chat.id, Utc::now()).await?;

        debug!("Summary {} of {} added to chat {}", summary_id, document.path, chat.id);
        chat.load(pool, true, true).await
    }
}

async fn touch(pool: &SqlitePool, chat_id: Uuid, at: DateTime<Utc>) -> Result<()> {
    query("UPDATE chats SET updated_at = ? WHERE id = ?")
        .bind(at)
        .bind(chat_id)
        .execute(pool)
        .await?;
    Ok(())
}

async fn chat_with_fresh_row(pool: &SqlitePool, chat_id: Uuid) -> Result<ChatDetail> {
    Chat::get(pool, chat_id).await?.load(pool, false, false).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use crate::models::{ChatType, Language};
    use crate::types::{ChatSettingsPatch, NewChatSettings, RetrievedDocument};

    fn c1_request() -> CreateChatRequest {
        CreateChatRequest {
            name: "c1".into(),
            settings: NewChatSettings {
                language: Language::Fr,
                model: LlmModel::Gpt35Turbo,
                chat_type: ChatType::Qa,
            },
        }
    }

    async fn seeded() -> (SqlitePool, Project, ChatDetail) {
        let pool = connect_in_memory().await.unwrap();
        let project = Project::create(&pool, "handbook").await.unwrap();
        let chat = Chat::create(&pool, project.id, &c1_request()).await.unwrap();
        (pool, project, chat)
    }

    #[tokio::test]
    async fn created_chat_is_listed_with_settings_and_no_messages() {
        let (pool, project, created) = seeded().await;

        let chats = Chat::list_by_project(&pool, project.id, true, false).await.unwrap();
        assert_eq!(chats.len(), 1);
        let chat = &chats[0];
        assert_eq!(chat.chat.id, created.chat.id);
        assert_eq!(chat.chat.name, "c1");
        assert_eq!(chat.settings.chat_id, chat.chat.id);
        assert_eq!(chat.settings.language, Language::Fr);
        assert_eq!(chat.settings.model, LlmModel::Gpt35Turbo);
        assert_eq!(chat.settings.chat_type, ChatType::Qa);
        assert_eq!(chat.messages().len(), 0);
        assert!(chat.summaries.is_none());

        let settings_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_settings WHERE chat_id = ?")
            .bind(chat.chat.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(settings_rows, 1);
    }

    #[tokio::test]
    async fn listing_skips_relations_unless_asked() {
        let (pool, project, created) = seeded().await;
        Chat::add_message(&pool, created.chat.id, "hello", Origin::User).await.unwrap();

        let bare = Chat::list_by_project(&pool, project.id, false, false).await.unwrap();
        assert!(bare[0].messages.is_none());
        assert!(bare[0].summaries.is_none());

        let full = Chat::list_by_project(&pool, project.id, true, true).await.unwrap();
        assert_eq!(full[0].messages().len(), 1);
        assert!(full[0].summaries.is_some());
    }

    #[tokio::test]
    async fn listing_an_unknown_project_is_not_found() {
        let pool = connect_in_memory().await.unwrap();
        let err = Chat::list_by_project(&pool, Uuid::new_v4(), false, false).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn create_in_unknown_project_is_not_found() {
        let pool = connect_in_memory().await.unwrap();
        let err = Chat::create(&pool, Uuid::new_v4(), &c1_request()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn add_message_grows_transcript_by_one_in_order() {
        let (pool, _, chat) = seeded().await;
        let chat_id = chat.chat.id;

        let mut expected = Vec::new();
        for (i, origin) in [Origin::User, Origin::Llm, Origin::User, Origin::Llm].into_iter().enumerate() {
            let before = ChatMessage::count_for_chat(&pool, chat_id).await.unwrap();
            let content = format!("message {i}");
            let detail = Chat::add_message(&pool, chat_id, &content, origin).await.unwrap();
            expected.push(content);

            assert_eq!(detail.messages().len() as i64, before + 1);
            let contents: Vec<&str> = detail.messages().iter().map(|m| m.content.as_str()).collect();
            assert_eq!(contents, expected);
            assert!(detail
                .messages()
                .windows(2)
                .all(|w| w[0].created_at <= w[1].created_at));
        }
    }

    #[tokio::test]
    async fn add_message_to_unknown_chat_is_not_found() {
        let pool = connect_in_memory().await.unwrap();
        let err = Chat::add_message(&pool, Uuid::new_v4(), "hi", Origin::User).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn deleting_a_chat_cascades_to_its_messages() {
        let (pool, project, chat) = seeded().await;
        let chat_id = chat.chat.id;
        let doc = OriginalDocument::create(&pool, project.id, "guide.md").await.unwrap();
        Chat::add_message(&pool, chat_id, "question", Origin::User).await.unwrap();
        Chat::add_message_with_sources(
            &pool,
            chat_id,
            &QaOutput {
                text: "answer".into(),
                source_documents: vec![RetrievedDocument::new("guide.md", "excerpt", 1, 3)],
            },
        )
        .await
        .unwrap();
        Chat::add_summary(&pool, chat_id, doc.id, "short").await.unwrap();

        Chat::delete(&pool, chat_id).await.unwrap();

        for table in ["chat_messages", "chat_settings", "summaries"] {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE chat_id = ?"))
                .bind(chat_id)
                .fetch_one(&pool)
                .await
                .unwrap();
            assert_eq!(count, 0, "{table} should be empty");
        }
        let sources: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM source_documents")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(sources, 0);
        assert!(Chat::get(&pool, chat_id).await.unwrap_err().is_not_found());
        // the document itself belongs to the project and survives
        assert!(OriginalDocument::get(&pool, doc.id).await.is_ok());
    }

    #[tokio::test]
    async fn deleting_twice_is_not_found() {
        let (pool, _, chat) = seeded().await;
        Chat::delete(&pool, chat.chat.id).await.unwrap();
        assert!(Chat::delete(&pool, chat.chat.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn sources_are_attached_to_the_llm_message() {
        let (pool, project, chat) = seeded().await;
        let doc = OriginalDocument::create(&pool, project.id, "guide.md").await.unwrap();

        let detail = Chat::add_message_with_sources(
            &pool,
            chat.chat.id,
            &QaOutput {
                text: "It is in the guide".into(),
                source_documents: vec![
                    RetrievedDocument::new("guide.md", "first", 1, 10),
                    RetrievedDocument::new("guide.md", "second", 11, 20),
                ],
            },
        )
        .await
        .unwrap();

        let message = &detail.messages()[0];
        assert_eq!(message.origin, Origin::Llm);
        assert_eq!(message.sources.len(), 2);
        assert!(message.sources.iter().all(|s| s.original_document_id == doc.id));
        assert_eq!((message.sources[1].line_from, message.sources[1].line_to), (11, 20));
        assert_eq!(message.sources[0].page_content, "first");
    }

    #[tokio::test]
    async fn sources_from_another_project_are_refused_atomically() {
        let (pool, _, chat) = seeded().await;
        let other = Project::create(&pool, "other").await.unwrap();
        OriginalDocument::create(&pool, other.id, "secret.md").await.unwrap();

        let err = Chat::add_message_with_sources(
            &pool,
            chat.chat.id,
            &QaOutput {
                text: "leaky".into(),
                source_documents: vec![RetrievedDocument::new("secret.md", "x", 1, 1)],
            },
        )
        .await
        .unwrap_err();
        assert!(err.is_not_found());

        assert_eq!(ChatMessage::count_for_chat(&pool, chat.chat.id).await.unwrap(), 0);
        let sources: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM source_documents")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(sources, 0);
    }

    #[tokio::test]
    async fn settings_patch_only_touches_given_fields() {
        let (pool, _, chat) = seeded().await;

        let updated = Chat::update(
            &pool,
            chat.chat.id,
            &UpdateChatRequest {
                name: None,
                settings: Some(ChatSettingsPatch {
                    model: Some(LlmModel::Gpt4),
                    ..Default::default()
                }),
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.chat.name, "c1");
        assert_eq!(updated.settings.model, LlmModel::Gpt4);
        assert_eq!(updated.settings.language, Language::Fr);
        assert_eq!(updated.settings.chat_type, ChatType::Qa);
        assert_eq!(updated.settings.id, chat.settings.id);

        let renamed = Chat::update(
            &pool,
            chat.chat.id,
            &UpdateChatRequest {
                name: Some("renamed".into()),
                settings: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(renamed.chat.name, "renamed");
        assert_eq!(renamed.settings.model, LlmModel::Gpt4);
        assert_eq!(Chat::model(&pool, chat.chat.id).await.unwrap(), LlmModel::Gpt4);
    }

    #[tokio::test]
    async fn empty_rename_is_invalid() {
        let (pool, _, chat) = seeded().await;
        let err = Chat::update(
            &pool,
            chat.chat.id,
            &UpdateChatRequest {
                name: Some("  ".into()),
                settings: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Invalid(_)));
        assert_eq!(Chat::get(&pool, chat.chat.id).await.unwrap().name, "c1");
    }

    #[tokio::test]
    async fn summaries_must_come_from_the_chat_project() {
        let (pool, project, chat) = seeded().await;
        let own = OriginalDocument::create(&pool, project.id, "guide.md").await.unwrap();
        let other_project = Project::create(&pool, "other").await.unwrap();
        let foreign = OriginalDocument::create(&pool, other_project.id, "guide.md").await.unwrap();

        let detail = Chat::add_summary(&pool, chat.chat.id, own.id, "A guide.").await.unwrap();
        assert_eq!(detail.summaries().len(), 1);
        assert_eq!(detail.summaries()[0].document_path, "guide.md");

        let err = Chat::add_summary(&pool, chat.chat.id, foreign.id, "Nope").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
