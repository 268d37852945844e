use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::models::{ChatType, Language, LlmModel, Origin};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewChatSettings {
    pub language: Language,
    pub model: LlmModel,
    #[serde(rename = "type")]
    pub chat_type: ChatType,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateChatRequest {
    pub name: String,
    pub settings: NewChatSettings,
}

/// Only the fields that are present are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ChatSettingsPatch {
    #[serde(default)]
    pub language: Option<Language>,
    #[serde(default)]
    pub model: Option<LlmModel>,
    #[serde(default, rename = "type")]
    pub chat_type: Option<ChatType>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateChatRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub settings: Option<ChatSettingsPatch>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AddMessageRequest {
    pub content: String,
    pub origin: Origin,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListChatsQuery {
    /// Eager-load the ordered messages of each chat
    #[serde(default)]
    pub messages: bool,
    /// Eager-load the summaries of each chat
    #[serde(default)]
    pub summaries: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChatModelResponse {
    pub model: LlmModel,
}
