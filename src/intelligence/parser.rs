use serde::de::DeserializeOwned;

use super::AiError;

/// Extract the JSON body from model output.
/// Handles ```json fences and text before/after the JSON.
pub fn extract_json_block(response: &str) -> Result<&str, AiError> {
    let trimmed = response.trim();

    if let Some(start) = trimmed.find("```json") {
        let after_fence = &trimmed[start + 7..];
        if let Some(end) = after_fence.find("```") {
            return Ok(after_fence[..end].trim());
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        if let Some(end) = after_fence.find("```") {
            let block = after_fence[..end].trim();
            if block.starts_with('{') || block.starts_with('[') {
                return Ok(block);
            }
        }
    }

    // Whichever bracket opens first decides object vs array
    let object = trimmed.find('{').zip(trimmed.rfind('}'));
    let array = trimmed.find('[').zip(trimmed.rfind(']'));
    let span = match (object, array) {
        (Some(o), Some(a)) => Some(if a.0 < o.0 { a } else { o }),
        (o, a) => o.or(a),
    };
    if let Some((start, end)) = span {
        if start < end {
            return Ok(&trimmed[start..=end]);
        }
    }

    Err(AiError::MalformedResponse(
        "No JSON block found in model response".to_string(),
    ))
}

/// Deserialize model output into `T`.
pub fn parse_json<T: DeserializeOwned>(response: &str) -> Result<T, AiError> {
    let block = extract_json_block(response)?;
    serde_json::from_str(block).map_err(|e| AiError::JsonParsing(e.to_string()))
}

/// Parse an array leniently, skipping items that fail to deserialize.
/// A bare object is treated as a one-element array.
pub fn parse_array_lenient<T: DeserializeOwned>(response: &str) -> Result<Vec<T>, AiError> {
    let value: serde_json::Value = parse_json(response)?;
    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(_) => vec![value],
        other => {
            return Err(AiError::MalformedResponse(format!(
                "Expected a JSON array, got {other}"
            )))
        }
    };

    Ok(items
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        name: String,
    }

    #[test]
    fn extract_from_json_fence() {
        let response = "Here you go:\n```json\n{\"name\": \"A\"}\n```\nThanks";
        assert_eq!(extract_json_block(response).unwrap(), "{\"name\": \"A\"}");
    }

    #[test]
    fn extract_from_plain_fence() {
        let response = "```\n[1, 2]\n```";
        assert_eq!(extract_json_block(response).unwrap(), "[1, 2]");
    }

    #[test]
    fn extract_bare_object_and_array() {
        assert_eq!(
            extract_json_block("prefix {\"a\": [1]} suffix").unwrap(),
            "{\"a\": [1]}"
        );
        assert_eq!(
            extract_json_block("[{\"a\": 1}, {\"a\": 2}]").unwrap(),
            "[{\"a\": 1}, {\"a\": 2}]"
        );
    }

    #[test]
    fn extract_without_json_fails() {
        assert!(matches!(
            extract_json_block("no structured data here"),
            Err(AiError::MalformedResponse(_))
        ));
        assert!(extract_json_block("").is_err());
    }

    #[test]
    fn parse_json_reports_syntax_errors() {
        let result: Result<Item, _> = parse_json("{\"name\": }");
        assert!(matches!(result, Err(AiError::JsonParsing(_))));
    }

    #[test]
    fn lenient_array_skips_bad_items() {
        let items: Vec<Item> =
            parse_array_lenient(r#"[{"name": "A"}, {"nom": "B"}, 7, {"name": "C"}]"#).unwrap();
        assert_eq!(
            items,
            vec![Item { name: "A".into() }, Item { name: "C".into() }]
        );
    }

    #[test]
    fn lenient_array_accepts_single_object() {
        let items: Vec<Item> = parse_array_lenient(r#"{"name": "Solo"}"#).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn lenient_array_rejects_scalars() {
        let result: Result<Vec<Item>, _> = parse_array_lenient("```json\n\"text\"\n```");
        assert!(result.is_err());
    }
}
