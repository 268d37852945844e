use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// What a chain is invoked with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainInput {
    pub input: String,
}

/// What a conversation chain returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainOutput {
    pub response: String,
}

/// Answer of a retrieval chain together with the excerpts it was grounded on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QaOutput {
    pub text: String,
    pub source_documents: Vec<RetrievedDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedDocument {
    pub page_content: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DocumentMetadata {
    /// Path of the original document, as registered on the project
    pub source: String,
    pub loc: DocumentLoc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DocumentLoc {
    pub lines: LineRange,
}

/// 1-based, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LineRange {
    pub from: u32,
    pub to: u32,
}

impl RetrievedDocument {
    pub fn new(source: impl Into<String>, page_content: impl Into<String>, from: u32, to: u32) -> Self {
        RetrievedDocument {
            page_content: page_content.into(),
            metadata: DocumentMetadata {
                source: source.into(),
                loc: DocumentLoc {
                    lines: LineRange { from, to },
                },
            },
        }
    }

    pub fn source(&self) -> &str {
        &self.metadata.source
    }

    pub fn lines(&self) -> LineRange {
        self.metadata.loc.lines
    }
}
