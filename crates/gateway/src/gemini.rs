use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use shared::{
    domain::ImageRef,
    protocol::{GenerateContentRequest, GenerateContentResponse, Part},
};
use tracing::{debug, info, warn};
use url::Url;

use crate::{prompts, GatewayError, GenerationGateway};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(180);
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub api_base_url: String,
    pub request_timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

pub struct GeminiGateway {
    http: Client,
    api_key: String,
    model: String,
    endpoint: Url,
}

impl GeminiGateway {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let endpoint = generate_content_url(&config.api_base_url, &config.model)?;
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build HTTP client for image model")?;
        Ok(Self {
            http,
            api_key: config.api_key,
            model: config.model,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn generate(&self, operation: &'static str, parts: Vec<Part>) -> Result<ImageRef> {
        let request = GenerateContentRequest::image_and_text(parts);
        debug!(
            operation,
            model = %self.model,
            parts = request.contents.first().map(|c| c.parts.len()).unwrap_or_default(),
            "sending generateContent request"
        );

        let response = self
            .http
            .post(self.endpoint.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("{operation} request to image model failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|err| format!("<unreadable body: {err}>"));
            warn!(operation, status = status.as_u16(), "image model rejected request");
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .context("failed to decode image model response")?;
        let image = image_from_response(&body)?;
        info!(operation, model = %self.model, "image model returned an image");
        Ok(image)
    }
}

#[async_trait]
impl GenerationGateway for GeminiGateway {
    async fn normalize_to_model(&self, photo: &ImageRef) -> Result<ImageRef> {
        let parts = vec![inline_part(photo)?, Part::text(prompts::normalize_prompt())];
        self.generate("normalize", parts).await
    }

    async fn fit_garment(
        &self,
        base: &ImageRef,
        garment: &ImageRef,
        color: Option<&str>,
    ) -> Result<ImageRef> {
        let parts = vec![
            inline_part(base)?,
            inline_part(garment)?,
            Part::text(prompts::fit_garment_prompt(color)),
        ];
        self.generate("fit_garment", parts).await
    }

    async fn vary_pose(&self, base: &ImageRef, pose_instruction: &str) -> Result<ImageRef> {
        let parts = vec![
            inline_part(base)?,
            Part::text(prompts::pose_prompt(pose_instruction)),
        ];
        self.generate("vary_pose", parts).await
    }
}

fn generate_content_url(api_base_url: &str, model: &str) -> Result<Url> {
    let mut base = api_base_url.trim().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    let base = Url::parse(&base)
        .with_context(|| format!("invalid image model base url '{api_base_url}'"))?;
    base.join(&format!("v1beta/models/{model}:generateContent"))
        .with_context(|| format!("invalid image model name '{model}'"))
}

fn inline_part(image: &ImageRef) -> Result<Part, GatewayError> {
    let url = image.data_url()?;
    Ok(Part::inline(
        url.mime_type.unwrap_or("image/png"),
        url.payload,
    ))
}

pub fn image_from_response(response: &GenerateContentResponse) -> Result<ImageRef, GatewayError> {
    if let Some(reason) = response.block_reason() {
        return Err(GatewayError::Blocked {
            reason: reason.to_string(),
        });
    }
    response
        .first_inline_image()
        .map(|inline| ImageRef::from_base64(&inline.mime_type, &inline.data))
        .ok_or(GatewayError::InvalidResponse)
}

#[cfg(test)]
#[path = "tests/gemini_tests.rs"]
mod tests;
