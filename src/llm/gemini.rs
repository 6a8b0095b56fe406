use async_trait::async_trait;
use base64::Engine;
use log::{ debug, info };
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use std::time::Duration;
use url::Url;

use super::{ GenerateRequest, GenerativeClient, InlineData, LlmError };

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")] Inline {
        inline_data: GeminiBlob,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiBlob {
    mime_type: String,
    data: String,
}

impl From<&InlineData> for GeminiPart {
    fn from(inline: &InlineData) -> Self {
        GeminiPart::Inline {
            inline_data: GeminiBlob {
                mime_type: inline.mime_type.clone(),
                data: base64::engine::general_purpose::STANDARD.encode(&inline.data),
            },
        }
    }
}

impl From<&GenerateRequest> for GeminiRequest {
    fn from(request: &GenerateRequest) -> Self {
        let mut parts = vec![GeminiPart::Text { text: request.prompt.clone() }];
        parts.extend(request.attachments.iter().map(GeminiPart::from));
        GeminiRequest {
            contents: vec![GeminiContent { role: "user", parts }],
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleResponse {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
    prompt_feedback: Option<GooglePromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleCandidate {
    content: Option<GoogleContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GoogleContent {
    #[serde(default)]
    parts: Vec<GooglePart>,
}

#[derive(Deserialize)]
struct GooglePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GooglePromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleError,
}

#[derive(Deserialize)]
struct GoogleError {
    message: String,
}

impl GoogleResponse {
    /// Concatenated text parts of the first candidate, or why there are none.
    fn into_text(self) -> Result<String, String> {
        let Some(candidate) = self.candidates.into_iter().next() else {
            let reason = self.prompt_feedback
                .and_then(|f| f.block_reason)
                .map(|r| format!("prompt blocked ({})", r))
                .unwrap_or_else(|| "no candidates".to_string());
            return Err(reason);
        };

        let text: String = candidate.content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| p.text)
            .collect();

        if text.is_empty() {
            let reason = candidate.finish_reason.unwrap_or_else(|| "empty candidate".to_string());
            return Err(format!("finish reason {}", reason));
        }
        Ok(text)
    }
}

fn error_message(body: &str) -> String {
    serde_json
        ::from_str::<GoogleErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

/// `generateContent` client for the Google generative-language REST API.
pub struct GeminiClient {
    http: HttpClient,
    api_key: String,
    base_url: Url,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: &str, timeout: Option<Duration>) -> Result<Self, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::Config("Google API key is required for GeminiClient".to_string()));
        }
        let base_url = Url::parse(base_url).map_err(|e|
            LlmError::Config(format!("Invalid Gemini base URL '{}': {}", base_url, e))
        )?;

        let mut builder = HttpClient::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| LlmError::Config(format!("Failed to build HTTP client: {}", e)))?;

        info!("GeminiClient configured → base_url={}", base_url);
        Ok(Self { http, api_key, base_url })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url.as_str().trim_end_matches('/'), model)
    }
}

#[async_trait]
impl GenerativeClient for GeminiClient {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateRequest
    ) -> Result<String, LlmError> {
        let url = self.endpoint(model);
        let payload = GeminiRequest::from(request);
        debug!(
            "GeminiClient::generate_content() → model={} prompt_chars={} attachments={}",
            model,
            request.prompt.len(),
            request.attachments.len()
        );

        let transport = |source| LlmError::Transport { model: model.to_string(), source };

        let resp = self.http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send().await
            .map_err(transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                model: model.to_string(),
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let body: GoogleResponse = resp.json().await.map_err(transport)?;
        body.into_text().map_err(|reason| LlmError::EmptyResponse {
            model: model.to_string(),
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_puts_prompt_first_and_encodes_attachments() {
        let request = GenerateRequest::new("read this").with_image(b"png");
        let payload = serde_json::to_value(GeminiRequest::from(&request)).unwrap();

        assert_eq!(
            payload,
            json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        { "text": "read this" },
                        { "inlineData": { "mimeType": "image/png", "data": "cG5n" } }
                    ]
                }]
            })
        );
    }

    #[test]
    fn response_text_joins_parts_of_first_candidate() {
        let body: GoogleResponse = serde_json
            ::from_value(
                json!({
                "candidates": [
                    { "content": { "role": "model", "parts": [{ "text": "Here " }, { "text": "you go" }] }, "finishReason": "STOP" },
                    { "content": { "parts": [{ "text": "ignored" }] } }
                ]
            })
            )
            .unwrap();
        assert_eq!(body.into_text().unwrap(), "Here you go");
    }

    #[test]
    fn blocked_prompt_reports_reason() {
        let body: GoogleResponse = serde_json
            ::from_value(json!({ "promptFeedback": { "blockReason": "SAFETY" } }))
            .unwrap();
        assert_eq!(body.into_text().unwrap_err(), "prompt blocked (SAFETY)");
    }

    #[test]
    fn empty_candidate_reports_finish_reason() {
        let body: GoogleResponse = serde_json
            ::from_value(json!({ "candidates": [{ "finishReason": "MAX_TOKENS" }] }))
            .unwrap();
        assert_eq!(body.into_text().unwrap_err(), "finish reason MAX_TOKENS");
    }

    #[test]
    fn provider_error_message_is_extracted() {
        let body = r#"{"error":{"code":429,"message":"Resource has been exhausted","status":"RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(error_message(body), "Resource has been exhausted");
        assert_eq!(error_message("  bad gateway "), "bad gateway");
    }

    #[test]
    fn endpoint_and_config_validation() {
        let client = GeminiClient::new(
            "key".into(),
            "https://generativelanguage.googleapis.com/v1beta/",
            None
        ).unwrap();
        assert_eq!(
            client.endpoint("gemini-2.0-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );

        assert!(matches!(GeminiClient::new(" ".into(), "https://x", None), Err(LlmError::Config(_))));
        assert!(matches!(GeminiClient::new("k".into(), "not a url", None), Err(LlmError::Config(_))));
    }
}
