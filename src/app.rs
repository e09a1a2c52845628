//! Single-threaded event loop wiring user actions to the orchestrators.
//!
//! Every user action becomes an [`Event`]. [`App::dispatch`] applies the
//! matching state transition to the session and then tells the renderer
//! what changed. Only one event is in flight at a time; a chat event owns
//! the control flow until its stream has drained or been interrupted.

use crate::ai::{ChatService, ImageGenerationService, OpenAiChatClient, TogetherImageClient};
use crate::chat::{ChatOrchestrator, ChatOutcome, TopicError};
use crate::commands::HELP_TEXT;
use crate::config::{Config, ModelCatalog};
use crate::image::{ImageExporter, ImageOrchestrator, ImageOutcome};
use crate::render::{Notice, Renderer, StatusView};
use crate::session::SessionState;
use crate::{prompts, Error, Result};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    SubmitTopic(String),
    SetImagePrompt(String),
    AppendImagePrompt(String),
    ShowImagePrompt,
    UseLastReply,
    GenerateImage,
    SelectModel(String),
    SetMaxTokens(u32),
    SaveImage { index: usize, dir: Option<PathBuf> },
    ShowHistory,
    ShowGallery,
    ShowStatus,
    ListModels,
    Help,
    Exit,
}

/// Whether the loop should keep reading input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Cancels the chat stream currently being consumed, if any.
#[derive(Clone, Default)]
pub struct Interrupter {
    current: Arc<Mutex<CancellationToken>>,
}

impl Interrupter {
    /// Fresh token for the next in-flight call.
    pub fn arm(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = token.clone();
        token
    }

    pub fn interrupt(&self) {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cancel();
    }
}

/// Injectable service bundle used to construct [`App`] in tests/harnesses.
pub struct AppServices {
    pub chat: Arc<dyn ChatService>,
    /// `None` when no image credential is configured.
    pub images: Option<Arc<dyn ImageGenerationService>>,
    pub catalog: ModelCatalog,
    pub exporter: ImageExporter,
    pub base_prompt: String,
}

pub struct App {
    session: SessionState,
    chat: ChatOrchestrator,
    images: Option<ImageOrchestrator>,
    catalog: ModelCatalog,
    exporter: ImageExporter,
    renderer: Box<dyn Renderer>,
    interrupter: Interrupter,
}

impl App {
    /// Build an app from concrete service dependencies.
    ///
    /// `initial_model` must name a catalog entry; `None` picks the default.
    pub fn with_services(
        services: AppServices,
        renderer: Box<dyn Renderer>,
        initial_model: Option<&str>,
    ) -> Result<Self> {
        let spec = match initial_model {
            Some(id) => services
                .catalog
                .get(id)
                .ok_or_else(|| Error::Config(format!("unknown model '{}'", id)))?,
            None => services.catalog.default_model(),
        }
        .clone();

        let mut session = SessionState::new();
        session.sync_model(&spec);

        Ok(Self {
            session,
            chat: ChatOrchestrator::new(services.chat, services.base_prompt),
            images: services.images.map(ImageOrchestrator::new),
            catalog: services.catalog,
            exporter: services.exporter,
            renderer,
            interrupter: Interrupter::default(),
        })
    }

    /// Construct an app talking to the real providers.
    pub fn from_config(
        config: &Config,
        chat_api_key: String,
        renderer: Box<dyn Renderer>,
        initial_model: Option<&str>,
    ) -> Result<Self> {
        info!("Chat provider: {}", config.chat_base_url);
        let chat: Arc<dyn ChatService> = Arc::new(OpenAiChatClient::new(
            chat_api_key,
            config.chat_base_url.clone(),
            config.chat_timeout,
        )?);

        let images: Option<Arc<dyn ImageGenerationService>> = match &config.image_api_key {
            Some(key) => {
                info!("Image provider: {} (model: {})", config.image_base_url, config.image_model);
                Some(Arc::new(TogetherImageClient::new(
                    key.clone(),
                    config.image_model.clone(),
                    config.image_base_url.clone(),
                    config.image_timeout,
                )))
            }
            None => {
                warn!("TOGETHER_API_KEY not set, image generation disabled");
                None
            }
        };

        let catalog = ModelCatalog::builtin()?;
        let initial_model = initial_model.filter(|id| {
            let known = catalog.get(id).is_some();
            if !known {
                warn!("Unknown model '{}', falling back to {}", id, catalog.default_model().id);
            }
            known
        });

        Self::with_services(
            AppServices {
                chat,
                images,
                catalog,
                exporter: ImageExporter::new(&config.download_dir),
                base_prompt: prompts::BASE_PROMPT.to_string(),
            },
            renderer,
            initial_model,
        )
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn image_enabled(&self) -> bool {
        self.images.is_some()
    }

    /// Handle used to interrupt a streaming reply from another task.
    pub fn interrupter(&self) -> Interrupter {
        self.interrupter.clone()
    }

    /// Show a notice outside of event dispatch, e.g. for input errors.
    pub fn notify(&mut self, notice: Notice) {
        self.renderer.notice(&notice);
    }

    /// Startup banner: credential state and current settings.
    pub fn greet(&mut self) {
        self.renderer
            .notice(&Notice::success("Chat API key loaded"));
        if !self.image_enabled() {
            self.renderer.notice(&Notice::warning(
                "TOGETHER_API_KEY environment variable not set. Image generation will not work.",
            ));
        }
        self.render_status();
        self.renderer.text("Type /help for commands.");
    }

    pub async fn dispatch(&mut self, event: Event) -> Flow {
        match event {
            Event::SubmitTopic(topic) => self.submit_topic(&topic).await,
            Event::SetImagePrompt(text) => {
                self.session.set_image_prompt(text);
                self.render_image_prompt();
            }
            Event::AppendImagePrompt(text) => {
                let mut prompt = self.session.image_prompt().to_string();
                if !prompt.is_empty() {
                    prompt.push('\n');
                }
                prompt.push_str(&text);
                self.session.set_image_prompt(prompt);
                self.render_image_prompt();
            }
            Event::ShowImagePrompt => self.render_image_prompt(),
            Event::UseLastReply => self.use_last_reply(),
            Event::GenerateImage => self.generate_image().await,
            Event::SelectModel(id) => self.select_model(&id),
            Event::SetMaxTokens(requested) => self.set_max_tokens(requested),
            Event::SaveImage { index, dir } => self.save_image(index, dir).await,
            Event::ShowHistory => self.renderer.conversation(self.session.conversation.messages()),
            Event::ShowGallery => self.renderer.gallery(&self.session.gallery),
            Event::ShowStatus => self.render_status(),
            Event::ListModels => self.list_models(),
            Event::Help => self.renderer.text(HELP_TEXT),
            Event::Exit => return Flow::Exit,
        }
        Flow::Continue
    }

    async fn submit_topic(&mut self, topic: &str) {
        let cancel = self.interrupter.arm();
        let outcome = self
            .chat
            .submit_topic(&mut self.session, topic, self.renderer.as_mut(), &cancel)
            .await;

        match outcome {
            ChatOutcome::Completed { .. } => {}
            ChatOutcome::Rejected(e @ TopicError::Empty) => {
                self.renderer.notice(&Notice::warning(e.to_string()))
            }
            ChatOutcome::Rejected(e) => self.renderer.notice(&Notice::error(e.to_string())),
            ChatOutcome::Failed { error, .. } => self.renderer.notice(&Notice::error(format!(
                "Error during LLM response generation: {}",
                error
            ))),
        }
    }

    async fn generate_image(&mut self) {
        let Some(images) = &self.images else {
            self.renderer.notice(&Notice::warning(
                "Together API key not configured. Cannot generate images.",
            ));
            return;
        };

        let prompt = self.session.image_prompt().to_string();
        if prompt.trim().is_empty() {
            self.renderer.notice(&Notice::warning(
                "Please enter an image prompt (/prompt <text>) before generating.",
            ));
            return;
        }

        self.renderer
            .notice(&Notice::info("Generating image via Together API..."));
        match images.generate_image(&mut self.session.gallery, &prompt).await {
            ImageOutcome::Generated { .. } => {
                self.renderer.notice(&Notice::success("Image generated!"));
                self.renderer.gallery(&self.session.gallery);
            }
            ImageOutcome::Failed { reason } => self.renderer.notice(&Notice::error(reason)),
        }
    }

    fn use_last_reply(&mut self) {
        match self.session.conversation.last_reply() {
            Some(reply) => {
                let reply = reply.to_string();
                self.session.set_image_prompt(reply);
                self.render_image_prompt();
            }
            None => self
                .renderer
                .notice(&Notice::warning("No assistant reply to copy yet.")),
        }
    }

    fn select_model(&mut self, id: &str) {
        let Some(spec) = self.catalog.get(id).cloned() else {
            self.renderer.notice(&Notice::warning(format!(
                "Unknown model '{}'. Use /models to list the available models.",
                id
            )));
            return;
        };

        if !self.session.sync_model(&spec) {
            self.renderer
                .notice(&Notice::info(format!("Already using {}.", spec.name)));
            return;
        }

        self.renderer.notice(&Notice::success(format!(
            "Switched to {}. History, image prompt and gallery cleared.",
            spec.name
        )));
        self.renderer.conversation(self.session.conversation.messages());
        self.renderer.gallery(&self.session.gallery);
        self.render_status();
    }

    fn set_max_tokens(&mut self, requested: u32) {
        match self.session.set_max_tokens(requested) {
            Some(applied) if applied == requested => self
                .renderer
                .notice(&Notice::success(format!("Max tokens set to {}.", applied))),
            Some(applied) => self.renderer.notice(&Notice::info(format!(
                "Max tokens adjusted to {} (range 512 to the model limit, step 512).",
                applied
            ))),
            None => self
                .renderer
                .notice(&Notice::warning("Select a model first.")),
        }
    }

    async fn save_image(&mut self, index: usize, dir: Option<PathBuf>) {
        let Some(image) = self.session.gallery.get(index) else {
            self.renderer.notice(&Notice::warning(format!(
                "No image at index {} (gallery has {}).",
                index,
                self.session.gallery.len()
            )));
            return;
        };

        let dir = dir.unwrap_or_else(|| self.exporter.output_dir().to_path_buf());
        match self.exporter.save_to(&dir, image, index).await {
            Ok(path) => self
                .renderer
                .notice(&Notice::success(format!("Saved {}", path.display()))),
            Err(e) => self
                .renderer
                .notice(&Notice::error(format!("Could not save image: {}", e))),
        }
    }

    fn list_models(&mut self) {
        let current = self.session.selection().map(|s| s.id.clone());
        let lines: Vec<String> = self
            .catalog
            .models()
            .iter()
            .map(|m| {
                let marker = if current.as_deref() == Some(m.id.as_str()) {
                    "*"
                } else {
                    " "
                };
                format!("{} {:<34} {} (max {} tokens)", marker, m.id, m.name, m.tokens)
            })
            .collect();
        self.renderer.text(&lines.join("\n"));
    }

    fn render_image_prompt(&mut self) {
        let prompt = self.session.image_prompt();
        if prompt.is_empty() {
            self.renderer.text("Image prompt is empty.");
        } else {
            let text = format!("Image prompt:\n{}", prompt);
            self.renderer.text(&text);
        }
    }

    fn render_status(&mut self) {
        let Some(selection) = self.session.selection() else {
            return;
        };
        let model_name = self
            .catalog
            .get(&selection.id)
            .map(|m| m.name.clone())
            .unwrap_or_else(|| selection.id.clone());

        let status = StatusView {
            model_id: selection.id.clone(),
            model_name,
            max_tokens: selection.max_tokens,
            ceiling: selection.ceiling,
            image_enabled: self.images.is_some(),
            image_prompt: self.session.image_prompt().to_string(),
            history_len: self.session.conversation.len(),
            gallery_len: self.session.gallery.len(),
        };
        self.renderer.status(&status);
    }
}
