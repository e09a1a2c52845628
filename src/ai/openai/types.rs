//! OpenAI-compatible chat payloads, as served by the chat provider.

use crate::models::Message;
use serde::{Deserialize, Serialize};

/// Request body for streamed chat completions.
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub stream: bool,
}

/// One streamed completion chunk.
///
/// Every level is optional on the wire: keep-alive and usage-only chunks
/// carry no choices, and the first chunk often carries a role but no text.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StreamError>,
}

impl ChatChunk {
    /// Chunk carrying a single text delta.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            choices: vec![ChunkChoice {
                delta: Some(ChunkDelta {
                    content: Some(content.into()),
                }),
                finish_reason: None,
            }],
            error: None,
        }
    }

    /// Text contributed by this chunk; empty when it carries none.
    pub fn fragment(&self) -> &str {
        self.choices
            .first()
            .and_then(|choice| choice.delta.as_ref())
            .and_then(|delta| delta.content.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: Option<ChunkDelta>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}

/// Error object some providers emit mid-stream instead of a chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamError {
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
}
