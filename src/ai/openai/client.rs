use crate::ai::sse;
use crate::{Error, Result};
use futures::stream::{BoxStream, StreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// HTTP transport for OpenAI-compatible endpoints.
pub struct OpenAiHttpClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiHttpClient {
    /// Build a transport whose timeouts bound connecting and each read,
    /// leaving a long streamed reply free to run.
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()?;
        Ok(Self::new_with_client(api_key, base_url, client))
    }

    pub fn new_with_client(api_key: String, base_url: String, client: Client) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// POST `request` and return the SSE `data:` payloads of the response.
    pub async fn post_stream<Req: Serialize>(
        &self,
        path: &str,
        request: &Req,
    ) -> Result<BoxStream<'static, Result<String>>> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("Opening stream to {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Accept", "text/event-stream")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send request to chat provider: {}", e);
                e
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            tracing::error!("Chat API error (status {}): {}", status, error_text);
            return Err(Error::AiProvider(format!(
                "Chat API error (status {}): {}",
                status, error_text
            )));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        if let Some(content_type) = content_type {
            if !content_type.starts_with("text/event-stream") {
                let body = response.text().await?;
                tracing::error!(
                    "Chat API answered with {} instead of a stream: {}",
                    content_type,
                    body
                );
                return Err(Error::AiProvider(non_stream_error(&body)));
            }
        }

        Ok(sse::data_events(response.bytes_stream()).boxed())
    }
}

/// Message for a successful response that is not an event stream.
fn non_stream_error(body: &str) -> String {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        });

    match message {
        Some(message) => message,
        None if body.trim().is_empty() => "Chat API returned an empty response".to_string(),
        None => format!("Chat API returned a non-stream response: {}", body.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_stream_error_prefers_error_message() {
        assert_eq!(
            non_stream_error(r#"{"error":{"message":"model overloaded","type":"server"}}"#),
            "model overloaded"
        );
    }

    #[test]
    fn test_non_stream_error_falls_back_to_body() {
        let message = non_stream_error(r#"{"choices":[{"message":{"content":"hi"}}]}"#);
        assert!(message.contains("non-stream response"));
        assert!(message.contains("hi"));
        assert_eq!(non_stream_error("  "), "Chat API returned an empty response");
    }
}
