//! Free-text helpers: goal coaching and note summaries. Failures surface to
//! the caller; there is no offline fallback for these.

use serde_json::Value;

use super::{extract_json, AiError, CompletionClient, CompletionRequest, JsonShape};
use crate::model::Goal;

const CHAT_MAX_TOKENS: u32 = 400;
const NOTE_MAX_TOKENS: u32 = 1000;
const MAX_INSIGHTS: usize = 5;

fn coach_prompt(goal: &Goal) -> String {
    let mut parts = vec![
        "You are an encouraging, practical goal-achievement coach.".to_string(),
        format!("The current goal is: \"{}\".", goal.title),
    ];
    if !goal.description.trim().is_empty() {
        parts.push(format!("Details: {}.", goal.description.trim()));
    }
    if let Some(target) = goal.target_date {
        parts.push(format!("Target date: {}.", target.format("%Y-%m-%d")));
    }
    parts.push("Give concise, actionable advice (2-3 sentences).".to_string());
    parts.join(" ")
}

pub async fn goal_chat_reply<C: CompletionClient + ?Sized>(
    client: &C,
    goal: &Goal,
    message: &str,
) -> Result<String, AiError> {
    let request = CompletionRequest::new(message)
        .with_system(coach_prompt(goal))
        .with_max_tokens(CHAT_MAX_TOKENS);
    Ok(client.complete(&request).await?.trim().to_string())
}

pub async fn summarize_note<C: CompletionClient + ?Sized>(
    client: &C,
    content: &str,
) -> Result<String, AiError> {
    let request = CompletionRequest::new(format!(
        "Please provide a concise summary of the following note content in 2-3 sentences:\n\n{content}"
    ))
    .with_system("You are a helpful assistant that creates concise summaries.")
    .with_max_tokens(NOTE_MAX_TOKENS);
    Ok(client.complete(&request).await?.trim().to_string())
}

/// Asks for a JSON array of insight strings. A reply without parseable JSON
/// is read line by line instead, keeping at most five bullets.
pub async fn note_insights<C: CompletionClient + ?Sized>(
    client: &C,
    content: &str,
) -> Result<Vec<String>, AiError> {
    let request = CompletionRequest::new(format!(
        "Analyze the following note content and provide 3-5 key insights, actionable items, or important points as a JSON array of strings:\n\n{content}"
    ))
    .with_system(
        "You are a helpful assistant that extracts key insights from text. Always respond with valid JSON.",
    )
    .with_max_tokens(NOTE_MAX_TOKENS);
    let reply = client.complete(&request).await?;

    match extract_json(&reply, JsonShape::Array) {
        Ok(Value::Array(items)) => Ok(items
            .iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text.trim().to_string()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|text| !text.is_empty())
            .collect()),
        Ok(_) => Err(AiError::UnexpectedShape(
            "expected an array of insights".to_string(),
        )),
        Err(AiError::NoJsonFound | AiError::JsonParseError(_)) => Ok(bullet_lines(&reply)),
        Err(err) => Err(err),
    }
}

fn bullet_lines(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(['-', '*', '\u{2022}'])
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .take(MAX_INSIGHTS)
        .collect()
}
