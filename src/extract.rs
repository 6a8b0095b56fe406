//! Pulls a JSON object out of a free-text model reply.
//!
//! The span runs from the first `{` to the last `}` in the text. This is not a
//! balanced-brace scanner: an unrelated brace pair in prose before the payload
//! makes the span unparseable.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Could not find valid JSON in AI response")]
    NoJson,

    #[error("Malformed JSON in AI response: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub fn json_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

pub fn extract_structured(text: &str) -> Result<Value, ExtractError> {
    let span = json_span(text).ok_or(ExtractError::NoJson)?;
    Ok(serde_json::from_str(span)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_in_prose_comes_back_unchanged() {
        let object = json!({
            "medicines": [{ "name": "Ibuprofen", "schedule": ["08:00"], "ageDosage": { "Adults": "200mg" } }]
        });
        let reply = format!(
            "Sure! Here is the report:\n```json\n{}\n```\nConsult your doctor.",
            serde_json::to_string_pretty(&object).unwrap()
        );

        assert_eq!(extract_structured(&reply).unwrap(), object);
    }

    #[test]
    fn nested_braces_stay_inside_the_span() {
        let reply = r#"{"a":{"b":{}}} trailing"#;
        assert_eq!(json_span(reply), Some(r#"{"a":{"b":{}}}"#));
    }

    #[test]
    fn no_braces_is_no_json() {
        assert!(matches!(extract_structured("I could not read the prescription."), Err(ExtractError::NoJson)));
        assert!(matches!(extract_structured(""), Err(ExtractError::NoJson)));
    }

    #[test]
    fn closing_before_opening_is_no_json() {
        assert!(matches!(extract_structured("} nothing here {"), Err(ExtractError::NoJson)));
    }

    #[test]
    fn truncated_output_is_malformed() {
        let err = extract_structured(r#"{"medicines": [{"name": "Aspirin"}"#).unwrap_err();
        assert!(matches!(err, ExtractError::Malformed(_)));
    }

    #[test]
    fn stray_braces_before_the_payload_misparse() {
        let reply = r#"Use {dose} as needed. {"medicines": []}"#;
        assert!(matches!(extract_structured(reply), Err(ExtractError::Malformed(_))));
    }
}
