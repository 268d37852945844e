use tracing::{debug, info};
use uuid::Uuid;

use super::{ChatModel, ConversationMemory, PromptMessage, TokenCounter};
use crate::error::Result;
use crate::models::{Language, LlmModel};
use crate::prompts::Prompts;
use crate::retrieval::Retriever;
use crate::types::{ChainInput, ChainOutput, QaOutput, RetrievedDocument};

/// Memory + prompt + model. One call answers one input.
pub struct ConversationChain<'a> {
    llm: &'a dyn ChatModel,
    model: LlmModel,
    language: Language,
    memory: ConversationMemory,
}

impl<'a> ConversationChain<'a> {
    pub fn new(llm: &'a dyn ChatModel, model: LlmModel, language: Language, memory: ConversationMemory) -> Self {
        Self {
            llm,
            model,
            language,
            memory,
        }
    }

    /// The exact prompt sent for `input`: system prompt, remembered turns, then the input.
    pub fn messages(&self, input: &str) -> Vec<PromptMessage> {
        let mut system = Prompts::conversation(self.language).to_string();
        if let Some(context) = self.memory.summaries_context(self.language) {
            system.push_str("\n\n");
            system.push_str(&context);
        }

        let mut messages = Vec::with_capacity(self.memory.history().len() + 2);
        messages.push(PromptMessage::system(system));
        messages.extend(self.memory.history().iter().cloned());
        messages.push(PromptMessage::user(input));
        messages
    }

    pub async fn call(&self, input: ChainInput) -> Result<ChainOutput> {
        let messages = self.messages(&input.input);
        debug!(
            "Conversation chain for chat {}: {} remembered turn(s)",
            self.memory.chat_id(),
            self.memory.history().len()
        );
        let response = self.llm.complete(self.model, messages).await?;
        Ok(ChainOutput { response })
    }
}

/// Retrieves excerpts from the project's documents and answers from them.
pub struct RetrievalQaChain<'a> {
    llm: &'a dyn ChatModel,
    retriever: &'a dyn Retriever,
    model: LlmModel,
    language: Language,
    memory: ConversationMemory,
}

impl<'a> RetrievalQaChain<'a> {
    pub fn new(
        llm: &'a dyn ChatModel,
        retriever: &'a dyn Retriever,
        model: LlmModel,
        language: Language,
        memory: ConversationMemory,
    ) -> Self {
        Self {
            llm,
            retriever,
            model,
            language,
            memory,
        }
    }

    pub fn messages(&self, input: &str, documents: &[RetrievedDocument]) -> Vec<PromptMessage> {
        let mut messages = Vec::with_capacity(self.memory.history().len() + 2);
        messages.push(PromptMessage::system(Prompts::qa(self.language, &format_context(documents))));
        messages.extend(self.memory.history().iter().cloned());
        messages.push(PromptMessage::user(input));
        messages
    }

    pub async fn call(&self, project_id: Uuid, input: ChainInput) -> Result<QaOutput> {
        let documents = self.retriever.retrieve(project_id, &input.input).await?;
        info!(
            "Retrieved {} excerpt(s) from project {} for chat {}",
            documents.len(),
            project_id,
            self.memory.chat_id()
        );

        let messages = self.messages(&input.input, &documents);
        let text = self.llm.complete(self.model, messages).await?;
        Ok(QaOutput {
            text,
            source_documents: documents,
        })
    }
}

fn format_context(documents: &[RetrievedDocument]) -> String {
    documents
        .iter()
        .map(|d| {
            let lines = d.lines();
            format!("[{} L{}-{}]\n{}", d.source(), lines.from, lines.to, d.page_content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Summarizes a document. Text that does not fit the model's budget is summarized part by part,
/// then the partial summaries are summarized together.
pub async fn summarize(
    llm: &dyn ChatModel,
    tokens: &TokenCounter,
    model: LlmModel,
    language: Language,
    text: &str,
) -> Result<String> {
    let parts = split_by_tokens(text, tokens, model.history_token_budget());
    if parts.len() <= 1 {
        let prompt = Prompts::summary(language, text);
        return llm.complete(model, vec![PromptMessage::user(prompt)]).await;
    }

    info!("Summarizing document in {} parts with {}", parts.len(), model.as_str());
    let mut partials = Vec::with_capacity(parts.len());
    for part in &parts {
        let prompt = Prompts::summary(language, part);
        partials.push(llm.complete(model, vec![PromptMessage::user(prompt)]).await?);
    }

    let prompt = Prompts::summary(language, &partials.join("\n\n"));
    llm.complete(model, vec![PromptMessage::user(prompt)]).await
}

/// Groups whole lines into parts of at most `budget` tokens (a single oversized line is its own part).
fn split_by_tokens(text: &str, tokens: &TokenCounter, budget: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut used = 0;

    for line in text.lines() {
        let cost = tokens.count(line) + 1;
        if used + cost > budget && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
            used = 0;
        }
        current.push_str(line);
        current.push('\n');
        used += cost;
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}
