use std::sync::Arc;

use tiktoken_rs::{cl100k_base, CoreBPE};
use tracing::debug;
use uuid::Uuid;

use super::PromptMessage;
use crate::error::{AppError, Result};
use crate::models::{ChatDetail, Language, Origin};
use crate::prompts::Prompts;

/// Counts tokens the way the OpenAI chat models do.
#[derive(Clone)]
pub struct TokenCounter {
    bpe: Arc<CoreBPE>,
}

impl TokenCounter {
    pub fn new() -> Result<Self> {
        let bpe = cl100k_base().map_err(|e| AppError::Llm(format!("failed to load tokenizer: {e}")))?;
        Ok(Self { bpe: Arc::new(bpe) })
    }

    pub fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// What the model gets to remember of a chat: the most recent turns of the stored transcript
/// that fit the token budget, plus the chat's document summaries.
#[derive(Debug, Clone, Default)]
pub struct ConversationMemory {
    chat_id: Uuid,
    history: Vec<PromptMessage>,
    summaries: Vec<(String, String)>,
    dropped: usize,
}

impl ConversationMemory {
    /// Builds the memory from a transcript. `exclude` is the message currently being answered,
    /// which the chain sends as its input rather than as history.
    pub fn from_transcript(
        transcript: &ChatDetail,
        exclude: Option<Uuid>,
        tokens: &TokenCounter,
        budget: usize,
    ) -> Self {
        let mut used = 0;
        let mut kept = Vec::new();
        let mut dropped = 0;

        let candidates: Vec<_> = transcript
            .messages()
            .iter()
            .filter(|m| Some(m.id) != exclude)
            .collect();

        for message in candidates.iter().rev() {
            let cost = tokens.count(&message.content);
            if used + cost > budget {
                dropped = candidates.len() - kept.len();
                break;
            }
            used += cost;
            kept.push(match message.origin {
                Origin::User => PromptMessage::user(message.content.clone()),
                Origin::Llm => PromptMessage::assistant(message.content.clone()),
            });
        }
        kept.reverse();

        if dropped > 0 {
            debug!(
                "Chat {}: {} oldest message(s) left out of memory ({} tokens kept)",
                transcript.chat.id, dropped, used
            );
        }

        let summaries = transcript
            .summaries()
            .iter()
            .map(|s| (s.document_path.clone(), s.content.clone()))
            .collect();

        ConversationMemory {
            chat_id: transcript.chat.id,
            history: kept,
            summaries,
            dropped,
        }
    }

    pub fn chat_id(&self) -> Uuid {
        self.chat_id
    }

    pub fn history(&self) -> &[PromptMessage] {
        &self.history
    }

    /// Number of stored messages that did not fit the budget.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// The summaries rendered as a context block, if there are any.
    pub fn summaries_context(&self, language: Language) -> Option<String> {
        if self.summaries.is_empty() {
            return None;
        }
        let mut block = String::from(Prompts::summaries_header(language));
        for (path, content) in &self.summaries {
            block.push_str(&format!("\n- {path}: {content}"));
        }
        Some(block)
    }
}
