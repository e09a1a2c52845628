//! Topic submission and streamed prompt refinement.

use crate::ai::{ChatRequest, ChatService};
use crate::models::{Conversation, Message};
use crate::render::Renderer;
use crate::session::SessionState;
use crate::{Error, Result};
use futures::StreamExt;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Longest accepted topic, in characters.
pub const MAX_TOPIC_CHARS: usize = 4000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicError {
    #[error("Please enter a topic.")]
    Empty,

    #[error("Input is too long ({len} chars, max {max}).")]
    TooLong { len: usize, max: usize },
}

pub fn validate_topic(topic: &str) -> std::result::Result<(), TopicError> {
    if topic.trim().is_empty() {
        return Err(TopicError::Empty);
    }
    let len = topic.chars().count();
    if len > MAX_TOPIC_CHARS {
        return Err(TopicError::TooLong {
            len,
            max: MAX_TOPIC_CHARS,
        });
    }
    Ok(())
}

/// Result of one topic submission.
#[derive(Debug)]
pub enum ChatOutcome {
    /// Input failed validation; nothing changed.
    Rejected(TopicError),
    /// The reply streamed to completion and was recorded.
    Completed { reply: String },
    /// The call failed after the topic was recorded.
    Failed { error: Error, partial: String },
}

pub struct ChatOrchestrator {
    chat: Arc<dyn ChatService>,
    base_prompt: String,
}

impl ChatOrchestrator {
    pub fn new(chat: Arc<dyn ChatService>, base_prompt: impl Into<String>) -> Self {
        Self {
            chat,
            base_prompt: base_prompt.into(),
        }
    }

    /// Outbound messages: the base instruction followed by the non-empty history.
    pub fn build_messages(&self, conversation: &Conversation) -> Vec<Message> {
        std::iter::once(Message::system(self.base_prompt.clone()))
            .chain(conversation.messages().iter().cloned())
            .filter(|m| !m.content.is_empty())
            .collect()
    }

    /// Record `topic`, stream the assistant reply and record it.
    ///
    /// The user message is appended before any network call and is kept
    /// whatever happens afterwards.
    pub async fn submit_topic(
        &self,
        session: &mut SessionState,
        topic: &str,
        renderer: &mut dyn Renderer,
        cancel: &CancellationToken,
    ) -> ChatOutcome {
        if let Err(e) = validate_topic(topic) {
            tracing::debug!("Rejected topic: {}", e);
            return ChatOutcome::Rejected(e);
        }

        let Some(selection) = session.selection().cloned() else {
            return ChatOutcome::Failed {
                error: Error::Config("no chat model selected".to_string()),
                partial: String::new(),
            };
        };

        session.conversation.push_user(topic);
        tracing::info!(
            session = %session.id,
            model = %selection.id,
            "Submitting topic ({} chars, {} messages in history)",
            topic.chars().count(),
            session.conversation.len()
        );

        let request = ChatRequest {
            model: selection.id,
            messages: self.build_messages(&session.conversation),
            max_tokens: selection.max_tokens,
        };

        let mut reply = String::new();
        renderer.stream_started();
        let result = self.consume(request, &mut reply, renderer, cancel).await;
        renderer.stream_finished(&reply);

        match result {
            Ok(()) => {
                tracing::info!("Reply complete ({} chars)", reply.chars().count());
                session.conversation.finish_assistant(reply.clone());
                ChatOutcome::Completed { reply }
            }
            Err(error) => {
                tracing::error!("Error during reply generation: {}", error);
                if reply.is_empty() {
                    session.conversation.discard_empty_reply();
                }
                ChatOutcome::Failed {
                    error,
                    partial: reply,
                }
            }
        }
    }

    async fn consume(
        &self,
        request: ChatRequest,
        reply: &mut String,
        renderer: &mut dyn Renderer,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            opened = self.chat.stream_chat(request) => opened?,
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                next = stream.next() => next,
            };

            match next {
                Some(chunk) => {
                    reply.push_str(chunk?.fragment());
                    renderer.stream_progress(reply);
                }
                None => return Ok(()),
            }
        }
    }
}
