use serde::Deserialize;
use std::error::Error;
use std::fs;
use std::sync::Arc;
use log::info;

use crate::models::chat::ChatMessage;

const IMAGE_TEMPLATE: &str = r#"
You are a world-class handwriting expert and pharmacist.
Scan this prescription and extract medicine names.

For each medicine, return a JSON object with EXACTLY these keys:
- "name": Correct name (cross-checked for spelling)
- "dosage": Dosage (e.g., 500mg, 1 tablet)
- "frequency": Frequency (e.g., Twice a day, After meals)
- "duration": Duration (e.g., 5 days)
- "explanation": Plain English explanation of what it does.
- "purpose": Detailed medical purpose and use cases.
- "sideEffects": Potential side effects.
- "restrictions": Warnings for patients with conditions like diabetes, heart disease, pregnancy, etc.
- "ageDosage": A JSON object with recommendations for "Children", "Adults", and "Elderly".
- "schedule": Array of times in HH:mm format based on frequency.

Format the output as a JSON object with a 'medicines' array.
"#;

const AUDIO_TEMPLATE: &str = r#"
You are a pharmacist. Listen to this audio note where a user is asking about a medicine.
Identify the medicine name and provide a detailed report.

Return a JSON object with EXACTLY these keys in a 'medicines' array:
- "name": Identified medicine name
- "dosage": "See age-based recommendations"
- "frequency": "As mentioned/Standard"
- "duration": "As mentioned/Standard"
- "explanation": Plain English explanation of what it does.
- "purpose": Detailed medical purpose and use cases.
- "sideEffects": Potential side effects.
- "restrictions": Warnings for patients with conditions like diabetes, heart disease, pregnancy, etc.
- "ageDosage": { "Children": "Consult doctor", "Adults": "Standard dose", "Elderly": "Use with caution" },
- "schedule": ["08:00", "20:00"] (Example default schedule).

Format the output as a JSON object with a 'medicines' array.
"#;

const TEXT_TEMPLATE: &str = r#"
You are a pharmacist. Provide detailed information for the medicine: "{medicine_name}".

Return a JSON object with EXACTLY these keys in a 'medicines' array:
- "name": "{medicine_name}"
- "dosage": "See age-based recommendations"
- "frequency": "Standard frequency"
- "duration": "As prescribed"
- "explanation": Plain English explanation of what it does.
- "purpose": Detailed medical purpose and use cases.
- "sideEffects": Potential side effects.
- "restrictions": Warnings for patients (e.g., diabetes, heart disease, pregnancy).
- "ageDosage": { "Children": "Consult doctor", "Adults": "Standard dose", "Elderly": "Use with caution" },
- "schedule": ["08:00", "20:00"] (Example default schedule).

Format the output as a JSON object with a 'medicines' array.
"#;

const CHAT_TEMPLATE: &str = r#"
You are CareScan AI, a specialized medical assistant.
Your goal is to help users understand their medications, dosages, and safety restrictions.

Guidelines:
1. Provide clear, medically-grounded information.
2. If asked about side effects or restrictions, be thorough but easy to understand.
3. ALWAYS include a disclaimer that you are an AI and the user should consult a doctor.
4. Avoid providing specific medical diagnoses; focus on medication information.
5. Use a helpful, professional, and empathetic tone.

User Message: {message}

Previous Conversation Summary (if any): {history}
"#;

/// Prompt templates. Placeholders: `{medicine_name}` (text), `{message}` and `{history}` (chat).
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PromptConfig {
    pub image: String,
    pub audio: String,
    pub text: String,
    pub chat: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            image: IMAGE_TEMPLATE.to_string(),
            audio: AUDIO_TEMPLATE.to_string(),
            text: TEXT_TEMPLATE.to_string(),
            chat: CHAT_TEMPLATE.to_string(),
        }
    }
}

/// Reads a JSON prompt file; keys it leaves out keep the built-in template.
pub fn load_prompts(path: &str) -> Result<Arc<PromptConfig>, Box<dyn Error + Send + Sync>> {
    let file_content = fs
        ::read_to_string(path)
        .map_err(|e| format!("Failed to read prompts file '{}': {}", path, e))?;
    let config: PromptConfig = serde_json
        ::from_str(&file_content)
        .map_err(|e| format!("Failed to parse prompts file '{}': {}", path, e))?;
    info!("Loaded prompt templates from {}", path);
    Ok(Arc::new(config))
}

pub fn get_image_prompt(config: &PromptConfig) -> String {
    config.image.clone()
}

pub fn get_audio_prompt(config: &PromptConfig) -> String {
    config.audio.clone()
}

pub fn get_text_prompt(config: &PromptConfig, medicine_name: &str) -> String {
    config.text.replace("{medicine_name}", medicine_name)
}

/// `role: content` lines for the most recent `turns` messages, `None` when there are none.
pub fn format_history_for_prompt(history: &[ChatMessage], turns: usize) -> String {
    let recent = &history[history.len().saturating_sub(turns)..];
    if recent.is_empty() {
        return "None".to_string();
    }
    recent
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fills `{message}` and `{history}` in one pass; placeholders inside the inserted text stay literal.
pub fn get_chat_prompt(config: &PromptConfig, message: &str, history: &str) -> String {
    let template = config.chat.as_str();
    let mut out = String::with_capacity(template.len() + message.len() + history.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix("{message}") {
            out.push_str(message);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{history}") {
            out.push_str(history);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Role;
    use std::io::Write;

    #[test]
    fn text_prompt_pins_the_name() {
        let prompt = get_text_prompt(&PromptConfig::default(), "Metformin");
        assert!(prompt.contains(r#"for the medicine: "Metformin""#));
        assert!(prompt.contains(r#""name": "Metformin""#));
        assert!(!prompt.contains("{medicine_name}"));
    }

    #[test]
    fn empty_history_renders_none() {
        assert_eq!(format_history_for_prompt(&[], 5), "None");
        let one = [ChatMessage::new(Role::User, "hi")];
        assert_eq!(format_history_for_prompt(&one, 0), "None");
    }

    #[test]
    fn history_keeps_the_most_recent_turns() {
        let history = vec![
            ChatMessage::new(Role::User, "alpha"),
            ChatMessage::new(Role::Assistant, "bravo"),
            ChatMessage::new(Role::User, "charlie")
        ];
        assert_eq!(format_history_for_prompt(&history, 2), "assistant: bravo\nuser: charlie");
    }

    #[test]
    fn chat_prompt_embeds_message_and_history() {
        let prompt = get_chat_prompt(&PromptConfig::default(), "Can I take it with food?", "user: hi");
        assert!(prompt.contains("You are CareScan AI"));
        assert!(prompt.contains("User Message: Can I take it with food?"));
        assert!(prompt.contains("Previous Conversation Summary (if any): user: hi"));
    }

    #[test]
    fn placeholders_in_user_text_are_not_expanded() {
        let config = PromptConfig { chat: "H[{history}] M[{message}] {other}".to_string(), ..Default::default() };

        let prompt = get_chat_prompt(&config, "what about {history}?", "user: I typed {message} earlier");

        assert_eq!(prompt, "H[user: I typed {message} earlier] M[what about {history}?] {other}");
    }

    #[test]
    fn prompt_file_overrides_only_given_keys() {
        let path = std::env::temp_dir().join(format!("carescan-prompts-{}.json", uuid::Uuid::new_v4()));
        let mut file = fs::File::create(&path).unwrap();
        write!(file, r#"{{ "text": "Describe {{medicine_name}} briefly as JSON." }}"#).unwrap();

        let config = load_prompts(path.to_str().unwrap()).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(get_text_prompt(&config, "Aspirin"), "Describe Aspirin briefly as JSON.");
        assert_eq!(config.chat, CHAT_TEMPLATE);
    }

    #[test]
    fn missing_prompt_file_is_an_error() {
        let err = load_prompts("/definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("Failed to read prompts file"));
    }
}
