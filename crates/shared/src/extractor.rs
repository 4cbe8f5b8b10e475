//! Pulls the JSON payload out of a model response that was asked for
//! "only JSON" but may still wrap it in a code fence or chatty prose.

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::LazyLock;

static FENCED_JSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").expect("valid regex"));

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("no JSON object containing \"{0}\" found in response")]
    NotFound(String),
    #[error("malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("JSON object is missing required key \"{0}\"")]
    MissingKey(String),
}

/// Extracts and deserializes the object that carries `required_key`.
pub fn extract_json<T: DeserializeOwned>(text: &str, required_key: &str) -> Result<T, ExtractionError> {
    let value = extract_value(text, required_key)?;
    Ok(serde_json::from_value(value)?)
}

pub fn extract_value(text: &str, required_key: &str) -> Result<Value, ExtractionError> {
    if let Some(value) = fenced_candidate(text, required_key) {
        return Ok(value);
    }

    let key_pattern = format!(r#"(?s)\{{.*"{}".*\}}"#, regex::escape(required_key));
    let outermost = Regex::new(&key_pattern).map_err(|_| ExtractionError::NotFound(required_key.to_string()))?;

    let candidate = outermost
        .find(text)
        .ok_or_else(|| ExtractionError::NotFound(required_key.to_string()))?;

    let value: Value = serde_json::from_str(candidate.as_str())?;
    if value.get(required_key).is_none() {
        return Err(ExtractionError::MissingKey(required_key.to_string()));
    }
    Ok(value)
}

/// A fenced block only counts if it parses and carries the key; otherwise
/// the greedy object match gets its turn.
fn fenced_candidate(text: &str, required_key: &str) -> Option<Value> {
    FENCED_JSON
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|body| serde_json::from_str::<Value>(body.as_str().trim()).ok())
        .find(|value| value.get(required_key).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Metric {
        value: String,
        context: String,
    }

    #[test]
    fn test_fenced_block_with_prose() {
        let text = "Here you go:\n```json\n{\"value\":\"$4.2M\",\"context\":\"steady\"}\n```\nThanks!";
        let metric: Metric = extract_json(text, "value").unwrap();
        assert_eq!(
            metric,
            Metric {
                value: "$4.2M".to_string(),
                context: "steady".to_string(),
            }
        );
    }

    #[test]
    fn test_unfenced_object_with_prose() {
        let text = r#"Sure! {"stories": [{"headline": "A", "significance": "B"}]} Hope that helps."#;
        let value = extract_value(text, "stories").unwrap();
        assert_eq!(value["stories"][0]["headline"], "A");
    }

    #[test]
    fn test_nested_braces_use_outermost_object() {
        let text = r#"{"events": [{"name": "Open studio", "day": "Sat"}], "note": {"x": 1}}"#;
        let value = extract_value(text, "events").unwrap();
        assert_eq!(value["note"]["x"], 1);
    }

    #[test]
    fn test_fence_without_key_falls_through() {
        let text = "```json\n{\"other\": 1}\n```";
        assert!(matches!(extract_value(text, "value"), Err(ExtractionError::NotFound(_))));

        let text = "```\nnot json at all\n```\n{\"value\": \"12\", \"context\": \"\"}";
        let value = extract_value(text, "value").unwrap();
        assert_eq!(value["value"], "12");
    }

    #[test]
    fn test_no_json_reports_not_found() {
        let err = extract_value("I couldn't find anything this week.", "events").unwrap_err();
        assert!(matches!(err, ExtractionError::NotFound(key) if key == "events"));
    }

    #[test]
    fn test_broken_json_reports_malformed() {
        let err = extract_value(r#"{"value": "12", "context": }"#, "value").unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed(_)));
    }

    #[test]
    fn test_key_only_in_nested_object_is_missing() {
        let err = extract_value(r#"{"data": {"value": "12"}}"#, "value").unwrap_err();
        assert!(matches!(err, ExtractionError::MissingKey(_)));
    }

    #[test]
    fn test_wrong_shape_is_malformed() {
        let err = extract_json::<Metric>(r#"{"value": 12}"#, "value").unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed(_)));
    }
}
