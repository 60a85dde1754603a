use serde_json::{Map, Value};

use super::AiError;
use crate::model::RoadmapStep;

const NO_DESCRIPTION: &str = "No description provided";

/// Maps a parsed reply into roadmap steps. Accepts a bare array or an object
/// wrapping one under `roadmap` (or `steps`).
pub fn normalize_steps(value: &Value) -> Result<Vec<RoadmapStep>, AiError> {
    let items = step_items(value)?;
    if items.is_empty() {
        return Err(AiError::UnexpectedShape(
            "roadmap contains no steps".to_string(),
        ));
    }
    Ok(items
        .iter()
        .enumerate()
        .map(|(idx, item)| normalize_item(idx + 1, item))
        .collect())
}

fn step_items(value: &Value) -> Result<&Vec<Value>, AiError> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(map) => ["roadmap", "steps"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
            .ok_or_else(|| {
                AiError::UnexpectedShape("object has no roadmap array".to_string())
            }),
        other => Err(AiError::UnexpectedShape(format!(
            "expected an array of steps, got {}",
            kind(other)
        ))),
    }
}

fn normalize_item(position: usize, item: &Value) -> RoadmapStep {
    let (title, description) = match item {
        Value::String(text) if !text.is_empty() => (Some(text.clone()), None),
        Value::Object(map) => (
            text_field(map, "step").or_else(|| text_field(map, "title")),
            text_field(map, "description"),
        ),
        _ => (None, None),
    };
    let mut step = RoadmapStep::new(
        title.unwrap_or_else(|| format!("Step {position}")),
        description.unwrap_or_else(|| NO_DESCRIPTION.to_string()),
    );
    step.order = Some(position as u32);
    step
}

fn text_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
