pub mod preprocess;

use log::{ debug, info, warn };
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::config::prompt::{ self, PromptConfig };
use crate::extract::{ extract_structured, ExtractError };
use crate::llm::{ AudioClip, LlmError, ModelGateway };
use crate::models::medicine::Prescription;
use self::preprocess::{ ImagePreprocessor, PreprocessError };

/// Used when an audio upload carries no content type; browser recorders produce webm.
pub const DEFAULT_AUDIO_MIME_TYPE: &str = "audio/webm";

#[derive(Debug, Error)]
pub enum PrescriptionError {
    #[error("No image, medicine name, or audio note provided")]
    NoInput,

    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    #[error("Image preprocessing task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Model(#[from] LlmError),

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// What the client sent; every field optional, blank ones count as absent.
#[derive(Debug, Clone, Default)]
pub struct PrescriptionRequest {
    pub image: Option<Vec<u8>>,
    pub medicine_name: Option<String>,
    pub audio: Option<AudioClip>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrescriptionInput {
    Image(Vec<u8>),
    Audio(AudioClip),
    Text(String),
}

impl PrescriptionInput {
    pub fn kind(&self) -> &'static str {
        match self {
            PrescriptionInput::Image(_) => "image",
            PrescriptionInput::Audio(_) => "audio",
            PrescriptionInput::Text(_) => "text",
        }
    }
}

impl PrescriptionRequest {
    /// Picks one modality: image, then audio, then text.
    pub fn into_input(self) -> Result<PrescriptionInput, PrescriptionError> {
        if let Some(image) = self.image.filter(|b| !b.is_empty()) {
            return Ok(PrescriptionInput::Image(image));
        }
        if let Some(audio) = self.audio.filter(|a| !a.bytes.is_empty()) {
            return Ok(PrescriptionInput::Audio(audio));
        }
        if let Some(name) = self.medicine_name {
            let name = name.trim();
            if !name.is_empty() {
                return Ok(PrescriptionInput::Text(name.to_string()));
            }
        }
        Err(PrescriptionError::NoInput)
    }
}

pub struct PrescriptionService {
    gateway: Arc<ModelGateway>,
    prompts: Arc<PromptConfig>,
    preprocessor: ImagePreprocessor,
}

impl PrescriptionService {
    pub fn new(
        gateway: Arc<ModelGateway>,
        prompts: Arc<PromptConfig>,
        preprocessor: ImagePreprocessor
    ) -> Self {
        Self { gateway, prompts, preprocessor }
    }

    pub async fn process(&self, request: PrescriptionRequest) -> Result<Value, PrescriptionError> {
        let input = request.into_input()?;
        debug!("Prescription request resolved to {} input", input.kind());
        self.process_input(input).await
    }

    pub async fn process_input(&self, input: PrescriptionInput) -> Result<Value, PrescriptionError> {
        let text = match input {
            PrescriptionInput::Image(bytes) => {
                info!("Processing image: {} bytes", bytes.len());
                let png = self.prepare_image(bytes).await?;
                let prompt = prompt::get_image_prompt(&self.prompts);
                self.gateway.generate(&prompt, Some(png.as_slice()), None).await?
            }
            PrescriptionInput::Audio(clip) => {
                info!("Processing audio note: {} bytes ({})", clip.bytes.len(), clip.mime_type);
                let prompt = prompt::get_audio_prompt(&self.prompts);
                self.gateway.generate(&prompt, None, Some(&clip)).await?
            }
            PrescriptionInput::Text(name) => {
                info!("Processing text lookup: {}", name);
                let prompt = prompt::get_text_prompt(&self.prompts, &name);
                self.gateway.generate(&prompt, None, None).await?
            }
        };

        let data = extract_structured(&text)?;
        Ok(ensure_medicines(data))
    }

    async fn prepare_image(&self, bytes: Vec<u8>) -> Result<Vec<u8>, PrescriptionError> {
        let preprocessor = self.preprocessor.clone();
        let png = tokio::task
            ::spawn_blocking(move || preprocessor.preprocess(&bytes)).await
            .map_err(|e| PrescriptionError::Task(e.to_string()))??;
        Ok(png)
    }
}

/// The reply is passed through as-is, except that a missing `medicines` array is added.
fn ensure_medicines(mut data: Value) -> Value {
    match serde_json::from_value::<Prescription>(data.clone()) {
        Ok(parsed) => debug!("Model returned {} medicine record(s)", parsed.medicines.len()),
        Err(e) => warn!("Model reply does not match the medicine schema: {}", e),
    }

    if let Value::Object(map) = &mut data {
        if !matches!(map.get("medicines"), Some(Value::Array(_))) {
            warn!("Model reply has no 'medicines' array, returning an empty one");
            map.insert("medicines".to_string(), Value::Array(Vec::new()));
        }
    }
    data
}
