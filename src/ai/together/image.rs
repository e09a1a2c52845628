use super::client::TogetherHttpClient;
use super::types::{ImageGenerationRequest, ImageGenerationResponse};
use crate::ai::ImageGenerationService;
use crate::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;

const DEFAULT_WIDTH: u32 = 1024;
const DEFAULT_HEIGHT: u32 = 768;
const DEFAULT_STEPS: u32 = 4;

pub struct TogetherImageClient {
    http: TogetherHttpClient,
    model: String,
}

impl TogetherImageClient {
    pub fn new(api_key: String, model: String, base_url: String, timeout: Duration) -> Self {
        Self::new_with_client(api_key, model, base_url, timeout, reqwest::Client::new())
    }

    pub fn new_with_client(
        api_key: String,
        model: String,
        base_url: String,
        timeout: Duration,
        client: reqwest::Client,
    ) -> Self {
        Self {
            http: TogetherHttpClient::new_with_client(api_key, base_url, timeout, client),
            model,
        }
    }
}

#[async_trait]
impl ImageGenerationService for TogetherImageClient {
    async fn generate_image(&self, prompt: &str) -> Result<Option<Vec<u8>>> {
        tracing::debug!("Sending image generation request (model: {})", self.model);

        let request = ImageGenerationRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            steps: DEFAULT_STEPS,
            n: 1,
            response_format: "b64_json".to_string(),
        };

        let response: ImageGenerationResponse =
            self.http.post("/v1/images/generations", &request).await?;

        let Some(image_data) = response.data.first() else {
            tracing::warn!("Together response contained no images");
            return Ok(None);
        };

        if let Some(b64_json) = &image_data.b64_json {
            use base64::Engine as _;
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(b64_json)
                .map_err(|e| Error::AiProvider(format!("Failed to decode base64 image: {}", e)))?;
            Ok(Some(bytes))
        } else if let Some(url) = &image_data.url {
            Ok(Some(self.http.fetch_bytes(url).await?))
        } else {
            tracing::warn!("Together image item had neither base64 nor URL");
            Ok(None)
        }
    }
}
