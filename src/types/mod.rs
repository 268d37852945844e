mod chat;
mod llm;
mod project;
mod socket;

pub use chat::*;
pub use llm::*;
pub use project::*;
pub use socket::*;
