use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::ChatDetail;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationQuery {
    pub chat_id: Uuid,
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizationQuery {
    pub chat_id: Uuid,
    pub document_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationFailure {
    pub chat_id: Option<Uuid>,
    pub message: String,
}

/// Frames sent by the browser client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "conversation-query")]
    ConversationQuery(ConversationQuery),
    #[serde(rename = "summarization-query")]
    SummarizationQuery(SummarizationQuery),
}

/// Frames pushed to the browser client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "conversation-response")]
    ConversationResponse(ChatDetail),
    #[serde(rename = "conversation-error")]
    ConversationError(ConversationFailure),
}

impl ClientEvent {
    pub fn chat_id(&self) -> Uuid {
        match self {
            ClientEvent::ConversationQuery(q) => q.chat_id,
            ClientEvent::SummarizationQuery(q) => q.chat_id,
        }
    }
}
