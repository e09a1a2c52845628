//! Per-session mutable state
//!
//! One `SessionState` exists per interactive session and is passed by
//! reference to the orchestrators. Nothing here outlives the process.

use crate::config::{clamp_max_tokens, default_max_tokens};
use crate::models::{Conversation, Gallery, ModelSpec};
use uuid::Uuid;

/// Active chat model and its output-token ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub id: String,
    pub ceiling: u32,
    pub max_tokens: u32,
}

#[derive(Debug)]
pub struct SessionState {
    pub id: Uuid,
    pub conversation: Conversation,
    image_prompt: String,
    pub gallery: Gallery,
    selection: Option<ModelSelection>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation: Conversation::new(),
            image_prompt: String::new(),
            gallery: Gallery::new(),
            selection: None,
        }
    }

    pub fn image_prompt(&self) -> &str {
        &self.image_prompt
    }

    pub fn set_image_prompt(&mut self, text: impl Into<String>) {
        self.image_prompt = text.into();
    }

    pub fn selection(&self) -> Option<&ModelSelection> {
        self.selection.as_ref()
    }

    /// Apply the externally selected model.
    ///
    /// When it differs from the stored selection, conversation, image prompt
    /// and gallery are cleared together and the token bound resets to the
    /// model default. Returns true when that reset happened.
    pub fn sync_model(&mut self, spec: &ModelSpec) -> bool {
        if self.selection.as_ref().map(|s| s.id.as_str()) == Some(spec.id.as_str()) {
            return false;
        }

        tracing::info!(
            session = %self.id,
            model = %spec.id,
            "Model changed, resetting session state"
        );
        self.conversation.clear();
        self.image_prompt.clear();
        self.gallery.clear();
        self.selection = Some(ModelSelection {
            id: spec.id.clone(),
            ceiling: spec.tokens,
            max_tokens: default_max_tokens(spec.tokens),
        });
        true
    }

    /// Set the output-token bound, clamped to the selected model's range.
    ///
    /// Returns the value actually stored, or `None` without a selection.
    pub fn set_max_tokens(&mut self, requested: u32) -> Option<u32> {
        let selection = self.selection.as_mut()?;
        selection.max_tokens = clamp_max_tokens(requested, selection.ceiling);
        Some(selection.max_tokens)
    }
}
