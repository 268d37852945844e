pub mod chat;
pub mod chat_settings;
pub mod chunk;
pub mod document;
pub mod message;
pub mod project;
pub mod summary;

pub use chat::{Chat, ChatDetail};
pub use chat_settings::{ChatSettings, ChatType, Language, LlmModel};
pub use chunk::DocumentChunk;
pub use document::{OriginalDocument, SourceDocument};
pub use message::{ChatMessage, Origin};
pub use project::Project;
pub use summary::Summary;
