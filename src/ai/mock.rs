use super::{ChatChunk, ChatRequest, ChatService, ChatStream, ImageGenerationService};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Scripted outcome of one mocked chat call.
#[derive(Debug, Clone)]
enum ChatScript {
    Fragments(Vec<String>),
    FailAfter(Vec<String>, String),
    OpenError(String),
    Hang(Vec<String>),
}

#[derive(Clone)]
pub struct MockChatClient {
    scripts: Arc<Mutex<VecDeque<ChatScript>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl MockChatClient {
    pub fn new() -> Self {
        Self {
            scripts: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Next call streams these fragments, then ends.
    pub fn with_fragments(self, fragments: &[&str]) -> Self {
        self.push(ChatScript::Fragments(to_owned(fragments)))
    }

    /// Next call streams these fragments, then fails with `message`.
    pub fn with_stream_error(self, fragments: &[&str], message: &str) -> Self {
        self.push(ChatScript::FailAfter(to_owned(fragments), message.to_string()))
    }

    /// Next call fails before any stream is opened.
    pub fn with_open_error(self, message: &str) -> Self {
        self.push(ChatScript::OpenError(message.to_string()))
    }

    /// Next call streams these fragments and then never finishes.
    pub fn with_hanging_stream(self, fragments: &[&str]) -> Self {
        self.push(ChatScript::Hang(to_owned(fragments)))
    }

    pub fn get_call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    fn push(self, script: ChatScript) -> Self {
        self.scripts.lock().unwrap().push_back(script);
        self
    }
}

impl Default for MockChatClient {
    fn default() -> Self {
        Self::new()
    }
}

fn to_owned(fragments: &[&str]) -> Vec<String> {
    fragments.iter().map(|f| f.to_string()).collect()
}

fn chunks(fragments: Vec<String>) -> impl futures::Stream<Item = Result<ChatChunk>> {
    stream::iter(fragments.into_iter().map(|f| Ok(ChatChunk::text(f))))
}

#[async_trait]
impl ChatService for MockChatClient {
    async fn stream_chat(&self, request: ChatRequest) -> Result<ChatStream> {
        self.requests.lock().unwrap().push(request);

        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ChatScript::Fragments(vec!["A refined prompt".to_string()]));

        Ok(match script {
            ChatScript::Fragments(fragments) => chunks(fragments).boxed(),
            ChatScript::FailAfter(fragments, message) => chunks(fragments)
                .chain(stream::once(async move { Err(Error::AiProvider(message)) }))
                .boxed(),
            ChatScript::OpenError(message) => return Err(Error::AiProvider(message)),
            ChatScript::Hang(fragments) => chunks(fragments).chain(stream::pending()).boxed(),
        })
    }
}

/// Scripted outcome of one mocked image call.
#[derive(Debug, Clone)]
enum ImageScript {
    Bytes(Vec<u8>),
    Empty,
    Fail(String),
}

#[derive(Clone)]
pub struct MockImageGenerationClient {
    scripts: Arc<Mutex<VecDeque<ImageScript>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockImageGenerationClient {
    pub fn new() -> Self {
        Self {
            scripts: Arc::new(Mutex::new(VecDeque::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_image_response(self, response: Vec<u8>) -> Self {
        self.push(ImageScript::Bytes(response))
    }

    /// Next call answers without an image.
    pub fn with_empty_response(self) -> Self {
        self.push(ImageScript::Empty)
    }

    pub fn with_error(self, message: &str) -> Self {
        self.push(ImageScript::Fail(message.to_string()))
    }

    pub fn get_call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn push(self, script: ImageScript) -> Self {
        self.scripts.lock().unwrap().push_back(script);
        self
    }
}

impl Default for MockImageGenerationClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageGenerationService for MockImageGenerationClient {
    async fn generate_image(&self, prompt: &str) -> Result<Option<Vec<u8>>> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        let script = self.scripts.lock().unwrap().pop_front();
        match script {
            Some(ImageScript::Bytes(bytes)) => Ok(Some(bytes)),
            Some(ImageScript::Empty) => Ok(None),
            Some(ImageScript::Fail(message)) => Err(Error::AiProvider(message)),
            // Return a tiny valid PNG as default
            None => Ok(Some(vec![
                0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // PNG signature
                0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, // IHDR chunk
                0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, // 1x1 pixel
                0x08, 0x02, 0x00, 0x00, 0x00, 0x90, 0x77, 0x53, 0xDE, 0x00, 0x00, 0x00, 0x0C, 0x49,
                0x44, 0x41, // IDAT chunk
                0x54, 0x08, 0x99, 0x63, 0xF8, 0xCF, 0xC0, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0xE2,
                0x25, 0x00, 0xBC, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, // IEND chunk
                0x44, 0xAE, 0x42, 0x60, 0x82,
            ])),
        }
    }
}
