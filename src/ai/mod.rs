//! AI service integration for prompt refinement and image generation
//!
//! Provides interfaces to an OpenAI-compatible streaming chat completions
//! API and to Together's image generation API.

pub mod mime;
pub mod mock;
pub mod openai;
pub mod sse;
pub mod together;

pub use mock::{MockChatClient, MockImageGenerationClient};
pub use openai::types::ChatChunk;
pub use openai::OpenAiChatClient;
pub use together::TogetherImageClient;

use crate::models::Message;
use crate::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Ordered, finite sequence of streamed completion chunks.
pub type ChatStream = BoxStream<'static, Result<ChatChunk>>;

/// Provider-neutral chat request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
}

#[async_trait]
pub trait ChatService: Send + Sync {
    /// Open a streamed completion for `request`.
    async fn stream_chat(&self, request: ChatRequest) -> Result<ChatStream>;
}

#[async_trait]
pub trait ImageGenerationService: Send + Sync {
    /// Render `prompt` to image bytes.
    ///
    /// `Ok(None)` means the provider answered without any image.
    async fn generate_image(&self, prompt: &str) -> Result<Option<Vec<u8>>>;
}
