use log::{ info, warn };
use std::sync::Arc;

use super::{ AudioClip, GenerateRequest, GenerativeClient, LlmError };

/// Ordered fallback over model identifiers. No state is kept between calls.
pub struct ModelGateway {
    client: Arc<dyn GenerativeClient>,
    models: Vec<String>,
}

impl ModelGateway {
    pub fn new(client: Arc<dyn GenerativeClient>, models: Vec<String>) -> Result<Self, LlmError> {
        let models: Vec<String> = models
            .into_iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        if models.is_empty() {
            return Err(LlmError::NoModels);
        }
        Ok(Self { client, models })
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub async fn generate(
        &self,
        prompt: &str,
        image: Option<&[u8]>,
        audio: Option<&AudioClip>
    ) -> Result<String, LlmError> {
        let mut request = GenerateRequest::new(prompt);
        if let Some(png) = image {
            request = request.with_image(png);
        }
        if let Some(clip) = audio {
            request = request.with_audio(clip);
        }
        self.generate_request(&request).await
    }

    pub async fn generate_request(&self, request: &GenerateRequest) -> Result<String, LlmError> {
        let mut last_error = None;

        for model in &self.models {
            match self.client.generate_content(model, request).await {
                Ok(text) => {
                    info!("Model {} answered ({} chars)", model, text.len());
                    return Ok(text);
                }
                Err(e) => {
                    warn!("Model {} failed: {}", model, e);
                    last_error = Some(e);
                }
            }
        }

        Err(LlmError::Exhausted(Box::new(last_error.unwrap_or(LlmError::NoModels))))
    }
}
