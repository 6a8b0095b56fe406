use serde::{ Serialize, Deserialize };
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[serde(alias = "bot", alias = "model")]
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bot_and_model_turns_read_as_assistant() {
        for role in ["assistant", "bot", "model"] {
            let raw = format!(r#"{{ "role": "{}", "content": "Hello! How can I help?" }}"#, role);
            let msg: ChatMessage = serde_json::from_str(&raw).unwrap();
            assert_eq!(msg.role, Role::Assistant);
        }
        let msg: ChatMessage = serde_json::from_str(r#"{ "role": "user", "content": "hi" }"#).unwrap();
        assert_eq!(msg.role, Role::User);
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(serde_json::from_str::<ChatMessage>(r#"{ "role": "system", "content": "x" }"#).is_err());
    }
}
