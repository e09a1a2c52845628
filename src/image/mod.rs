//! Image generation and gallery export
//!
//! Sends the editable prompt to the image provider, keeps results in the
//! session gallery (newest first) and writes gallery entries to disk on
//! request.

pub mod export;

pub use export::ImageExporter;

use crate::ai::ImageGenerationService;
use crate::models::{Gallery, GeneratedImage};
use std::sync::Arc;

/// Result of one generation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    /// A new image now sits at the front of the gallery.
    Generated { bytes: usize },
    /// Nothing was added; `reason` is shown to the user.
    Failed { reason: String },
}

pub struct ImageOrchestrator {
    images: Arc<dyn ImageGenerationService>,
}

impl ImageOrchestrator {
    pub fn new(images: Arc<dyn ImageGenerationService>) -> Self {
        Self { images }
    }

    /// Render `prompt` and prepend the result to `gallery`.
    ///
    /// Callers check that the trimmed prompt is non-empty first. Single
    /// attempt; failures leave the gallery untouched.
    pub async fn generate_image(&self, gallery: &mut Gallery, prompt: &str) -> ImageOutcome {
        tracing::info!("Generating image ({} chars prompt)", prompt.chars().count());

        match self.images.generate_image(prompt).await {
            Ok(Some(bytes)) => {
                let size = bytes.len();
                gallery.insert_newest(GeneratedImage::new(prompt.to_string(), bytes));
                tracing::info!("Generated image ({} bytes), gallery now {}", size, gallery.len());
                ImageOutcome::Generated { bytes: size }
            }
            Ok(None) => {
                tracing::warn!("Image provider returned no image");
                ImageOutcome::Failed {
                    reason: "Image generation failed.".to_string(),
                }
            }
            Err(e) => {
                tracing::error!("Image generation failed: {}", e);
                ImageOutcome::Failed {
                    reason: format!("Image generation failed: {}", e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockImageGenerationClient;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_generate_image_prepends_to_gallery() {
        let mock = MockImageGenerationClient::new()
            .with_image_response(vec![1, 2, 3])
            .with_image_response(vec![4, 5]);
        let orchestrator = ImageOrchestrator::new(Arc::new(mock.clone()));
        let mut gallery = Gallery::new();

        let outcome = orchestrator.generate_image(&mut gallery, "a red fox in snow").await;
        assert_eq!(outcome, ImageOutcome::Generated { bytes: 3 });

        orchestrator.generate_image(&mut gallery, "a blue whale").await;

        assert_eq!(gallery.len(), 2);
        assert_eq!(
            gallery.get(0),
            Some(&GeneratedImage::new("a blue whale".to_string(), vec![4, 5]))
        );
        assert_eq!(
            gallery.get(1),
            Some(&GeneratedImage::new("a red fox in snow".to_string(), vec![1, 2, 3]))
        );
        assert_eq!(mock.prompts(), vec!["a red fox in snow", "a blue whale"]);
    }

    #[tokio::test]
    async fn test_soft_failure_leaves_gallery_unchanged() {
        let mock = MockImageGenerationClient::new().with_empty_response();
        let orchestrator = ImageOrchestrator::new(Arc::new(mock));
        let mut gallery = Gallery::new();
        gallery.insert_newest(GeneratedImage::new("old".to_string(), vec![9]));

        let outcome = orchestrator.generate_image(&mut gallery, "fox").await;
        assert_eq!(
            outcome,
            ImageOutcome::Failed {
                reason: "Image generation failed.".to_string()
            }
        );
        assert_eq!(gallery.len(), 1);
        assert_eq!(gallery.get(0).unwrap().prompt, "old");
    }

    #[tokio::test]
    async fn test_provider_error_is_reported_not_raised() {
        let mock = MockImageGenerationClient::new().with_error("quota exceeded");
        let orchestrator = ImageOrchestrator::new(Arc::new(mock.clone()));
        let mut gallery = Gallery::new();

        match orchestrator.generate_image(&mut gallery, "fox").await {
            ImageOutcome::Failed { reason } => assert!(reason.contains("quota exceeded")),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(gallery.is_empty());
        assert_eq!(mock.get_call_count(), 1);
    }
}
