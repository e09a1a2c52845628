//! Data models and structures
//!
//! Defines the conversation history and generated-image gallery held by a
//! session, plus the catalog entries describing selectable chat models.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Ordered chat history of one session.
///
/// Roles are not required to alternate, but at most one assistant reply
/// trails the history: finishing a reply while the last entry is already an
/// assistant message overwrites it instead of appending a duplicate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    /// Record a completed assistant reply.
    pub fn finish_assistant(&mut self, reply: impl Into<String>) {
        let reply = reply.into();
        match self.messages.last_mut() {
            Some(last) if last.role == Role::Assistant => last.content = reply,
            _ => self.messages.push(Message::assistant(reply)),
        }
    }

    /// Remove a trailing assistant entry whose content is empty.
    ///
    /// Returns true when an entry was removed.
    pub fn discard_empty_reply(&mut self) -> bool {
        match self.messages.last() {
            Some(last) if last.role == Role::Assistant && last.content.is_empty() => {
                self.messages.pop();
                true
            }
            _ => false,
        }
    }

    /// Content of the most recent assistant reply, if any.
    pub fn last_reply(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

impl From<Vec<Message>> for Conversation {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub prompt: String,
    pub image_bytes: Vec<u8>,
}

impl GeneratedImage {
    pub fn new(prompt: String, image_bytes: Vec<u8>) -> Self {
        Self {
            prompt,
            image_bytes,
        }
    }
}

/// Generated images, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Gallery {
    images: Vec<GeneratedImage>,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_newest(&mut self, image: GeneratedImage) {
        self.images.insert(0, image);
    }

    pub fn get(&self, index: usize) -> Option<&GeneratedImage> {
        self.images.get(index)
    }

    pub fn images(&self) -> &[GeneratedImage] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn clear(&mut self) {
        self.images.clear();
    }
}

/// One selectable chat model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelSpec {
    pub id: String,
    pub name: String,
    /// Maximum output tokens accepted by the model.
    pub tokens: u32,
}
