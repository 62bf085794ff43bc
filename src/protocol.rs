//! Wire format of `POST /api/semantic-search`.
//!
//! Requests are an envelope `{ "type": …, "payload": { … } }`. The type tag
//! is parsed into the closed [`Request`] enum; anything else is
//! [`ProtocolError::Unsupported`]. Field presence is checked here, before
//! any pipeline runs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use session_index_core::SearchResult;

pub const INDEX_VIRTUAL_FILE: &str = "INDEX_VIRTUAL_FILE";
pub const SEARCH: &str = "SEARCH";

#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    IndexVirtualFile {
        chat_id: String,
        file_path: String,
        content: String,
    },
    Search {
        chat_id: String,
        query: String,
    },
}

impl Request {
    pub fn chat_id(&self) -> &str {
        match self {
            Request::IndexVirtualFile { chat_id, .. } | Request::Search { chat_id, .. } => chat_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    Unsupported(String),
    Missing(&'static str),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Unsupported(kind) => write!(f, "unsupported operation: {}", kind),
            ProtocolError::Missing(field) => write!(f, "{} is required", field),
        }
    }
}

impl std::error::Error for ProtocolError {}

fn string_field(payload: &Value, key: &str) -> Option<String> {
    payload.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

fn non_empty(payload: &Value, key: &'static str) -> Result<String, ProtocolError> {
    string_field(payload, key)
        .filter(|s| !s.is_empty())
        .ok_or(ProtocolError::Missing(key))
}

impl TryFrom<Envelope> for Request {
    type Error = ProtocolError;

    fn try_from(envelope: Envelope) -> Result<Self, Self::Error> {
        let kind = envelope.kind.unwrap_or_default();
        let payload = envelope.payload;

        match kind.as_str() {
            INDEX_VIRTUAL_FILE => {
                let chat_id = non_empty(&payload, "chatId")?;
                let file_path = non_empty(&payload, "filePath")?;
                // Empty content is a valid (empty) file.
                let content =
                    string_field(&payload, "content").ok_or(ProtocolError::Missing("content"))?;
                Ok(Request::IndexVirtualFile {
                    chat_id,
                    file_path,
                    content,
                })
            }
            SEARCH => {
                let chat_id = non_empty(&payload, "chatId")?;
                let query = non_empty(&payload, "query")?;
                Ok(Request::Search { chat_id, query })
            }
            _ => Err(ProtocolError::Unsupported(kind)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct IndexResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IndexResponse {
    pub fn indexed(chunks: usize) -> Self {
        Self {
            success: true,
            chunks: Some(chunks),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            chunks: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}
