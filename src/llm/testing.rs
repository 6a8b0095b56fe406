use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{ GenerateRequest, GenerativeClient, LlmError };

enum Scripted {
    Reply(String),
    Fail(String),
}

/// Stands in for the hosted provider: canned reply or failure per model, every call recorded.
#[derive(Default)]
pub(crate) struct ScriptedClient {
    script: HashMap<String, Scripted>,
    calls: Mutex<Vec<(String, GenerateRequest)>>,
}

impl ScriptedClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reply(mut self, model: &str, text: &str) -> Self {
        self.script.insert(model.to_string(), Scripted::Reply(text.to_string()));
        self
    }

    pub(crate) fn fail(mut self, model: &str, message: &str) -> Self {
        self.script.insert(model.to_string(), Scripted::Fail(message.to_string()));
        self
    }

    pub(crate) fn models_called(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(model, _)| model.clone())
            .collect()
    }

    pub(crate) fn requests(&self) -> Vec<GenerateRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, request)| request.clone())
            .collect()
    }

    pub(crate) fn last_prompt(&self) -> Option<String> {
        self.calls
            .lock()
            .unwrap()
            .last()
            .map(|(_, request)| request.prompt.clone())
    }
}

#[async_trait]
impl GenerativeClient for ScriptedClient {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateRequest
    ) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push((model.to_string(), request.clone()));
        match self.script.get(model) {
            Some(Scripted::Reply(text)) => Ok(text.clone()),
            Some(Scripted::Fail(message)) =>
                Err(LlmError::Api {
                    model: model.to_string(),
                    status: 503,
                    message: message.clone(),
                }),
            None =>
                Err(LlmError::Api {
                    model: model.to_string(),
                    status: 404,
                    message: format!("model {} not scripted", model),
                }),
        }
    }
}
