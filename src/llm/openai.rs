use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use tracing::{debug, info};

use super::{ChatModel, PromptMessage, PromptRole};
use crate::error::{AppError, Result};
use crate::models::LlmModel;

/// [`ChatModel`] backed by an OpenAI-compatible chat completions endpoint.
#[derive(Clone)]
pub struct OpenAiChatModel {
    client: Client<OpenAIConfig>,
}

impl OpenAiChatModel {
    pub fn new(api_key: &str, api_base: Option<&str>) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(api_base) = api_base {
            config = config.with_api_base(api_base);
        }
        Self {
            client: Client::with_config(config),
        }
    }
}

fn to_request_message(message: PromptMessage) -> Result<ChatCompletionRequestMessage, OpenAIError> {
    match message.role {
        PromptRole::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(message.content)
            .build()
            .map(Into::into),
        PromptRole::User => ChatCompletionRequestUserMessageArgs::default()
            .content(message.content)
            .build()
            .map(Into::into),
        PromptRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(message.content)
            .build()
            .map(Into::into),
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, model: LlmModel, messages: Vec<PromptMessage>) -> Result<String> {
        info!("Calling {} with {} prompt message(s)", model.as_str(), messages.len());

        let messages = messages
            .into_iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>, OpenAIError>>()?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(model.as_str())
            .messages(messages)
            .build()?;

        let response = self.client.chat().create(request).await?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| AppError::Llm("No response from OpenAI".to_string()))?;

        if let Some(reason) = &choice.finish_reason {
            debug!("Chat completion finished with reason: {:?}", reason);
        }

        choice
            .message
            .content
            .clone()
            .ok_or_else(|| AppError::Llm("No content in response from OpenAI".to_string()))
    }
}
