use crate::{Error, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Lightweight Together REST client.
pub struct TogetherHttpClient {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl TogetherHttpClient {
    pub fn new_with_client(
        api_key: String,
        base_url: String,
        timeout: Duration,
        client: Client,
    ) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub async fn post<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        path: &str,
        request: &Req,
    ) -> Result<Resp> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send request to Together: {}", e);
                e
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            tracing::error!("Together API error (status {}): {}", status, error_text);
            return Err(Error::AiProvider(format!(
                "Together API error (status {}): {}",
                status, error_text
            )));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Failed to parse Together response: {}\nBody: {}", e, body);
            Error::AiProvider(format!("Failed to parse Together response: {}", e))
        })
    }

    /// Download a hosted image returned by URL.
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).timeout(self.timeout).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!("Image download failed (status {}): {}", status, url);
            return Err(Error::AiProvider(format!(
                "Image download failed (status {})",
                status
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }
}
