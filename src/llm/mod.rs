pub mod gateway;
pub mod gemini;
#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use thiserror::Error;

pub use gateway::ModelGateway;
pub use gemini::GeminiClient;

pub const IMAGE_MIME_TYPE: &str = "image/png";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Invalid model client configuration: {0}")]
    Config(String),

    #[error("Request to model '{model}' failed: {source}")]
    Transport {
        model: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Model '{model}' returned HTTP {status}: {message}")]
    Api {
        model: String,
        status: u16,
        message: String,
    },

    #[error("Model '{model}' returned no text: {reason}")]
    EmptyResponse {
        model: String,
        reason: String,
    },

    #[error("No model identifiers configured")]
    NoModels,

    #[error("All models exhausted; last error: {0}")]
    Exhausted(#[source] Box<LlmError>),
}

/// Binary payload sent next to the prompt in a single generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineData {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Audio as captured by the client, forwarded unmodified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub prompt: String,
    pub attachments: Vec<InlineData>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), attachments: Vec::new() }
    }

    pub fn with_image(mut self, png_bytes: &[u8]) -> Self {
        self.attachments.push(InlineData {
            mime_type: IMAGE_MIME_TYPE.to_string(),
            data: png_bytes.to_vec(),
        });
        self
    }

    pub fn with_audio(mut self, audio: &AudioClip) -> Self {
        self.attachments.push(InlineData {
            mime_type: audio.mime_type.clone(),
            data: audio.bytes.clone(),
        });
        self
    }
}

/// A single call to one hosted model. Fallback across models lives in [`ModelGateway`].
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateRequest
    ) -> Result<String, LlmError>;
}
