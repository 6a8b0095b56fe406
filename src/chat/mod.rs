use log::info;
use std::sync::Arc;
use thiserror::Error;

use crate::config::prompt::{ self, PromptConfig };
use crate::llm::{ LlmError, ModelGateway };
use crate::models::chat::ChatMessage;

pub const DEFAULT_HISTORY_TURNS: usize = 5;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Message is required")]
    EmptyMessage,

    #[error(transparent)]
    Model(#[from] LlmError),
}

/// Follow-up questions answered by the medication assistant persona.
pub struct ChatService {
    gateway: Arc<ModelGateway>,
    prompts: Arc<PromptConfig>,
    history_turns: usize,
}

impl ChatService {
    pub fn new(gateway: Arc<ModelGateway>, prompts: Arc<PromptConfig>, history_turns: usize) -> Self {
        Self { gateway, prompts, history_turns }
    }

    pub fn build_prompt(&self, message: &str, history: &[ChatMessage]) -> String {
        let summary = prompt::format_history_for_prompt(history, self.history_turns);
        prompt::get_chat_prompt(&self.prompts, message, &summary)
    }

    pub async fn reply(&self, message: &str, history: &[ChatMessage]) -> Result<String, ChatError> {
        if message.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        info!("Chat message: {} chars, {} prior turn(s)", message.len(), history.len());

        let prompt = self.build_prompt(message, history);
        Ok(self.gateway.generate(&prompt, None, None).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedClient;
    use crate::models::chat::Role;

    const WORDS: [&str; 8] = [
        "amber",
        "birch",
        "cedar",
        "delta",
        "ember",
        "fjord",
        "grove",
        "heath",
    ];

    fn service(client: &Arc<ScriptedClient>) -> ChatService {
        let gateway = ModelGateway::new(client.clone(), vec!["model-a".into()]).unwrap();
        ChatService::new(Arc::new(gateway), Arc::new(PromptConfig::default()), DEFAULT_HISTORY_TURNS)
    }

    fn eight_turns() -> Vec<ChatMessage> {
        WORDS.iter()
            .enumerate()
            .map(|(i, word)| {
                let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
                ChatMessage::new(role, *word)
            })
            .collect()
    }

    #[tokio::test]
    async fn only_the_last_five_turns_reach_the_model() {
        let client = Arc::new(ScriptedClient::new().reply("model-a", "Take it after meals."));

        let reply = service(&client).reply("And with alcohol?", &eight_turns()).await.unwrap();

        assert_eq!(reply, "Take it after meals.");
        let prompt = client.last_prompt().unwrap();
        for dropped in &WORDS[..3] {
            assert!(!prompt.contains(dropped), "{dropped} should be dropped");
        }
        for kept in &WORDS[3..] {
            assert!(prompt.contains(kept), "{kept} should be kept");
        }
        assert!(prompt.contains("assistant: delta\nuser: ember"));
        assert!(prompt.contains("User Message: And with alcohol?"));
    }

    #[tokio::test]
    async fn no_history_says_none() {
        let client = Arc::new(ScriptedClient::new().reply("model-a", "ok"));

        service(&client).reply("What is ibuprofen?", &[]).await.unwrap();

        let prompt = client.last_prompt().unwrap();
        assert!(prompt.contains("Previous Conversation Summary (if any): None"));
        assert!(client.requests()[0].attachments.is_empty());
    }

    #[tokio::test]
    async fn blank_message_is_rejected_before_the_model() {
        let client = Arc::new(ScriptedClient::new().reply("model-a", "ok"));

        let err = service(&client).reply("   ", &[]).await.unwrap_err();

        assert!(matches!(err, ChatError::EmptyMessage));
        assert!(client.models_called().is_empty());
    }

    #[tokio::test]
    async fn model_failure_surfaces() {
        let client = Arc::new(ScriptedClient::new().fail("model-a", "API key not valid"));

        let err = service(&client).reply("hi", &[]).await.unwrap_err();

        assert!(matches!(err, ChatError::Model(LlmError::Exhausted(_))));
        assert!(err.to_string().contains("API key not valid"));
    }
}
