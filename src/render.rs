//! Presentation of session state
//!
//! The app applies one state transition per event and then calls into a
//! [`Renderer`]. The terminal renderer writes to stdout; the recording
//! renderer captures output for tests and harnesses.

use crate::models::{Gallery, Message, Role};
use colored::Colorize;
use std::io::Write;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A user-visible message about the outcome of an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, text)
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, text)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, text)
    }

    fn new(level: NoticeLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

/// Snapshot shown by the status view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusView {
    pub model_id: String,
    pub model_name: String,
    pub max_tokens: u32,
    pub ceiling: u32,
    pub image_enabled: bool,
    pub image_prompt: String,
    pub history_len: usize,
    pub gallery_len: usize,
}

pub trait Renderer: Send {
    fn notice(&mut self, notice: &Notice);

    /// A chat reply started streaming.
    fn stream_started(&mut self);

    /// The accumulated reply so far. May be called repeatedly with the same text.
    fn stream_progress(&mut self, buffer: &str);

    /// The reply finished (or stopped) with this final text.
    fn stream_finished(&mut self, buffer: &str);

    fn conversation(&mut self, messages: &[Message]);

    fn gallery(&mut self, gallery: &Gallery);

    fn status(&mut self, status: &StatusView);

    fn text(&mut self, text: &str);
}

/// How the display must change to show a new stream buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUpdate {
    Unchanged,
    Append(String),
    Redraw(String),
}

/// Tracks what part of a streamed reply is already on screen.
///
/// Rendering the same buffer twice changes nothing; a buffer that does not
/// extend the shown text is redrawn whole rather than appended.
#[derive(Debug, Default)]
pub struct StreamView {
    shown: String,
}

impl StreamView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, buffer: &str) -> StreamUpdate {
        if buffer == self.shown {
            return StreamUpdate::Unchanged;
        }
        let update = match buffer.strip_prefix(self.shown.as_str()) {
            Some(suffix) => StreamUpdate::Append(suffix.to_string()),
            None => StreamUpdate::Redraw(buffer.to_string()),
        };
        self.shown = buffer.to_string();
        update
    }

    pub fn shown(&self) -> &str {
        &self.shown
    }

    pub fn reset(&mut self) {
        self.shown.clear();
    }
}

/// Colored stdout renderer used by the interactive front-end.
#[derive(Default)]
pub struct TerminalRenderer {
    stream: StreamView,
}

impl TerminalRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn flush() {
        // Nothing useful can be done if stdout is gone.
        let _ = std::io::stdout().flush();
    }
}

impl Renderer for TerminalRenderer {
    fn notice(&mut self, notice: &Notice) {
        match notice.level {
            NoticeLevel::Info => println!("{}", notice.text),
            NoticeLevel::Success => println!("{}", notice.text.green()),
            NoticeLevel::Warning => println!("{}", format!("Warning: {}", notice.text).yellow()),
            NoticeLevel::Error => eprintln!("{}", format!("Error: {}", notice.text).red()),
        }
    }

    fn stream_started(&mut self) {
        self.stream.reset();
        println!("{}", "assistant>".cyan().bold());
    }

    fn stream_progress(&mut self, buffer: &str) {
        match self.stream.update(buffer) {
            StreamUpdate::Unchanged => {}
            StreamUpdate::Append(suffix) => print!("{}", suffix),
            StreamUpdate::Redraw(text) => print!("\n{}", text),
        }
        Self::flush();
    }

    fn stream_finished(&mut self, buffer: &str) {
        self.stream_progress(buffer);
        println!();
        self.stream.reset();
    }

    fn conversation(&mut self, messages: &[Message]) {
        if messages.is_empty() {
            println!("{}", "No messages yet. Enter a topic to begin.".dimmed());
            return;
        }
        for message in messages {
            let tag = match message.role {
                Role::User => "you>".green().bold(),
                Role::Assistant => "assistant>".cyan().bold(),
                Role::System => "system>".dimmed(),
            };
            println!("{}\n{}\n", tag, message.content);
        }
    }

    fn gallery(&mut self, gallery: &Gallery) {
        if gallery.is_empty() {
            println!("{}", "No images generated yet.".dimmed());
            return;
        }
        println!("{}", "Generated Images".bold());
        for (index, image) in gallery.images().iter().enumerate() {
            println!(
                "  [{}] {} bytes  Prompt: {}",
                index,
                image.image_bytes.len(),
                image.prompt
            );
        }
        println!("{}", "Use /save <index> to download an image.".dimmed());
    }

    fn status(&mut self, status: &StatusView) {
        println!("Model:        {} ({})", status.model_name.bold(), status.model_id);
        println!("Max tokens:   {} / {}", status.max_tokens, status.ceiling);
        println!(
            "Images:       {}",
            if status.image_enabled {
                "enabled".green()
            } else {
                "disabled (TOGETHER_API_KEY not set)".yellow()
            }
        );
        println!("History:      {} messages", status.history_len);
        println!("Gallery:      {} images", status.gallery_len);
        if status.image_prompt.is_empty() {
            println!("Image prompt: {}", "(empty)".dimmed());
        } else {
            println!("Image prompt: {}", status.image_prompt);
        }
    }

    fn text(&mut self, text: &str) {
        println!("{}", text);
    }
}

/// Everything a [`RecordingRenderer`] saw, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvent {
    Notice(Notice),
    StreamStarted,
    StreamProgress(String),
    StreamFinished(String),
    Conversation(Vec<Message>),
    Gallery(usize),
    Status(StatusView),
    Text(String),
}

/// Renderer that records calls; clones share the same log.
#[derive(Clone, Default)]
pub struct RecordingRenderer {
    events: Arc<Mutex<Vec<RenderEvent>>>,
    displayed: Arc<Mutex<String>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RenderEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RenderEvent::Notice(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    /// Text of the streamed reply as it would appear on screen.
    pub fn displayed(&self) -> String {
        self.displayed.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    fn record(&self, event: RenderEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn show(&self, buffer: &str) {
        let mut displayed = self.displayed.lock().unwrap();
        let mut view = StreamView { shown: displayed.clone() };
        match view.update(buffer) {
            StreamUpdate::Unchanged => {}
            StreamUpdate::Append(suffix) => displayed.push_str(&suffix),
            StreamUpdate::Redraw(text) => *displayed = text,
        }
    }
}

impl Renderer for RecordingRenderer {
    fn notice(&mut self, notice: &Notice) {
        self.record(RenderEvent::Notice(notice.clone()));
    }

    fn stream_started(&mut self) {
        self.displayed.lock().unwrap().clear();
        self.record(RenderEvent::StreamStarted);
    }

    fn stream_progress(&mut self, buffer: &str) {
        self.show(buffer);
        self.record(RenderEvent::StreamProgress(buffer.to_string()));
    }

    fn stream_finished(&mut self, buffer: &str) {
        self.show(buffer);
        self.record(RenderEvent::StreamFinished(buffer.to_string()));
    }

    fn conversation(&mut self, messages: &[Message]) {
        self.record(RenderEvent::Conversation(messages.to_vec()));
    }

    fn gallery(&mut self, gallery: &Gallery) {
        self.record(RenderEvent::Gallery(gallery.len()));
    }

    fn status(&mut self, status: &StatusView) {
        self.record(RenderEvent::Status(status.clone()));
    }

    fn text(&mut self, text: &str) {
        self.record(RenderEvent::Text(text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_view_appends_suffix() {
        let mut view = StreamView::new();
        assert_eq!(view.update("A "), StreamUpdate::Append("A ".to_string()));
        assert_eq!(
            view.update("A vivid "),
            StreamUpdate::Append("vivid ".to_string())
        );
        assert_eq!(view.shown(), "A vivid ");
    }

    #[test]
    fn test_stream_view_is_idempotent() {
        let mut view = StreamView::new();
        view.update("A vivid sunset.");
        assert_eq!(view.update("A vivid sunset."), StreamUpdate::Unchanged);
        assert_eq!(view.shown(), "A vivid sunset.");
    }

    #[test]
    fn test_stream_view_redraws_on_divergence() {
        let mut view = StreamView::new();
        view.update("first attempt");
        assert_eq!(
            view.update("second"),
            StreamUpdate::Redraw("second".to_string())
        );
        view.reset();
        assert_eq!(view.shown(), "");
    }

    #[test]
    fn test_recording_renderer_displays_without_duplication() {
        let mut renderer = RecordingRenderer::new();
        renderer.stream_started();
        renderer.stream_progress("A ");
        renderer.stream_progress("A vivid ");
        renderer.stream_progress("A vivid ");
        renderer.stream_finished("A vivid sunset.");
        renderer.stream_finished("A vivid sunset.");
        assert_eq!(renderer.displayed(), "A vivid sunset.");
    }

    #[test]
    fn test_recording_renderer_clones_share_log() {
        let probe = RecordingRenderer::new();
        let mut renderer = probe.clone();
        renderer.notice(&Notice::warning("careful"));
        assert_eq!(probe.notices(), vec![Notice::warning("careful")]);
    }
}
