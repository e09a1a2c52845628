use super::client::OpenAiHttpClient;
use super::types::{ChatChunk, ChatCompletionRequest};
use crate::ai::{ChatRequest, ChatService, ChatStream};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;

pub struct OpenAiChatClient {
    http: OpenAiHttpClient,
}

impl OpenAiChatClient {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: OpenAiHttpClient::new(api_key, base_url, timeout)?,
        })
    }

    fn decode_chunk(data: &str) -> Result<ChatChunk> {
        let chunk: ChatChunk = serde_json::from_str(data).map_err(|e| {
            tracing::error!("Failed to parse stream chunk: {}\nData: {}", e, data);
            Error::AiProvider(format!("Failed to parse stream chunk: {}", e))
        })?;

        match chunk.error {
            Some(err) => {
                tracing::error!("Chat provider reported an error mid-stream: {}", err.message);
                Err(Error::AiProvider(err.message))
            }
            None => Ok(chunk),
        }
    }
}

#[async_trait]
impl ChatService for OpenAiChatClient {
    async fn stream_chat(&self, request: ChatRequest) -> Result<ChatStream> {
        tracing::debug!(
            "Requesting streamed completion (model: {}, {} messages, max_tokens: {})",
            request.model,
            request.messages.len(),
            request.max_tokens
        );

        let body = ChatCompletionRequest {
            model: request.model,
            messages: request.messages,
            max_tokens: request.max_tokens,
            stream: true,
        };

        let events = self.http.post_stream("/v1/chat/completions", &body).await?;

        Ok(events
            .map(|event| event.and_then(|data| Self::decode_chunk(&data)))
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Message;
    use futures::TryStreamExt;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_client(server: &MockServer) -> OpenAiChatClient {
        OpenAiChatClient::new(
            "test-key".to_string(),
            server.uri(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn request() -> ChatRequest {
        ChatRequest {
            model: "llama3.1-8b".to_string(),
            messages: vec![Message::system("base"), Message::user("sunset")],
            max_tokens: 1024,
        }
    }

    fn sse(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/event-stream")
    }

    #[tokio::test]
    async fn test_stream_chat_yields_fragments_in_order() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama3.1-8b",
                "max_tokens": 1024,
                "stream": true,
                "messages": [
                    { "role": "system", "content": "base" },
                    { "role": "user", "content": "sunset" }
                ]
            })))
            .respond_with(sse(concat!(
                "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"A \"}}]}\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"vivid \"}}]}\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"sunset.\"}}]}\n\n",
                "data: {\"choices\":[],\"usage\":{\"total_tokens\":9}}\n\n",
                "data: [DONE]\n\n",
            )))
            .expect(1)
            .mount(&server)
            .await;

        let client = make_client(&server);
        let chunks: Vec<ChatChunk> = client
            .stream_chat(request())
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        let text: String = chunks.iter().map(|c| c.fragment()).collect();
        assert_eq!(text, "A vivid sunset.");
        assert_eq!(chunks.len(), 5);
    }

    #[tokio::test]
    async fn test_stream_chat_status_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let client = make_client(&server);
        let err = client.stream_chat(request()).await.err().unwrap();
        match err {
            Error::AiProvider(message) => {
                assert!(message.contains("401"));
                assert!(message.contains("invalid api key"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stream_chat_surfaces_error_chunk() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(sse(concat!(
                "data: {\"choices\":[{\"delta\":{\"content\":\"par\"}}]}\n\n",
                "data: {\"error\":{\"message\":\"context too long\"}}\n\n",
            )))
            .mount(&server)
            .await;

        let client = make_client(&server);
        let mut stream = client.stream_chat(request()).await.unwrap();

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.fragment(), "par");

        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, Error::AiProvider(ref m) if m == "context too long"));
    }

    #[tokio::test]
    async fn test_stream_chat_rejects_malformed_chunk() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(sse("data: not json\n\n"))
            .mount(&server)
            .await;

        let client = make_client(&server);
        let result: Result<Vec<ChatChunk>> =
            client.stream_chat(request()).await.unwrap().try_collect().await;
        assert!(matches!(result, Err(Error::AiProvider(_))));
    }

    #[tokio::test]
    async fn test_stream_chat_rejects_json_error_with_success_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": { "message": "model overloaded" }
            })))
            .mount(&server)
            .await;

        let client = make_client(&server);
        let err = client.stream_chat(request()).await.err().unwrap();
        assert!(matches!(err, Error::AiProvider(ref m) if m == "model overloaded"));
    }

    #[tokio::test]
    async fn test_stream_chat_rejects_stream_without_events() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(sse("{\"id\":\"chatcmpl-1\"}"))
            .mount(&server)
            .await;

        let client = make_client(&server);
        let result: Result<Vec<ChatChunk>> =
            client.stream_chat(request()).await.unwrap().try_collect().await;
        assert!(matches!(result, Err(Error::AiProvider(_))));
    }

    #[tokio::test]
    async fn test_stalled_server_hits_read_timeout() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(sse("data: [DONE]\n\n").set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let client = OpenAiChatClient::new(
            "test-key".to_string(),
            server.uri(),
            Duration::from_millis(200),
        )
        .unwrap();
        let err = client.stream_chat(request()).await.err().unwrap();
        assert!(matches!(err, Error::Http(_)));
    }
}
