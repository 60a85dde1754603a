use serde_json::Value;

use super::AiError;

pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// Which bracket pair delimits the payload the caller asked for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JsonShape {
    Array,
    Object,
}

impl JsonShape {
    fn brackets(self) -> (char, char) {
        match self {
            Self::Array => ('[', ']'),
            Self::Object => ('{', '}'),
        }
    }
}

/// Returns the text between the first opening bracket of `shape` and the last
/// closing one.
///
/// This is a plain slice, not a balanced scan: bracketed prose ahead of the
/// payload widens the span and the subsequent parse fails.
pub fn extract_json_span(text: &str, shape: JsonShape) -> Result<String, AiError> {
    let cleaned = strip_code_fences(text);
    let (open, close) = shape.brackets();
    let start = cleaned.find(open).ok_or(AiError::NoJsonFound)?;
    let end = cleaned
        .rfind(close)
        .filter(|end| *end > start)
        .ok_or(AiError::NoJsonFound)?;
    Ok(cleaned[start..=end].to_string())
}

pub fn extract_json(text: &str, shape: JsonShape) -> Result<Value, AiError> {
    let span = extract_json_span(text, shape)?;
    serde_json::from_str(&span).map_err(AiError::JsonParseError)
}
