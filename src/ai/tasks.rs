use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::info;

use super::{extract_json, AiError, CompletionClient, CompletionRequest, JsonShape};
use crate::model::{new_id, DailyTask, Goal, TaskCategory, TaskPriority};

const TASKS_MAX_TOKENS: u32 = 2048;
const DEFAULT_ESTIMATED_MINUTES: u32 = 30;

pub fn daily_tasks_prompt(goals: &[Goal]) -> String {
    let listing = goals
        .iter()
        .map(|goal| {
            let description = if goal.description.trim().is_empty() {
                "No description"
            } else {
                goal.description.as_str()
            };
            format!(
                "- Goal: {}\n  Description: {}\n  Progress: {}%",
                goal.title, description, goal.progress
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"Based on these goals, generate 3-5 specific, actionable daily tasks for TODAY.

{listing}

Return ONLY a valid JSON array (no markdown) in this format:
[
  {{
    "title": "Task title",
    "description": "Detailed description",
    "goalTitle": "Goal title",
    "priority": "high|medium|low",
    "category": "research|planning|creation|communication|review",
    "estimatedTime": 30,
    "aiInsight": "Why this task matters"
  }}
]"#
    )
}

/// Calls the provider and maps its reply to tasks. Unlike roadmaps there is
/// no fallback: every failure reaches the caller.
pub async fn generate_daily_tasks<C: CompletionClient + ?Sized>(
    client: &C,
    goals: &[Goal],
    now: DateTime<Utc>,
) -> Result<Vec<DailyTask>, AiError> {
    let request = CompletionRequest::new(daily_tasks_prompt(goals)).with_max_tokens(TASKS_MAX_TOKENS);
    let reply = client.complete(&request).await?;
    let value = extract_json(&reply, JsonShape::Array)?;
    let tasks = map_tasks(&value, goals, now)?;
    info!(tasks = tasks.len(), "generated daily tasks");
    Ok(tasks)
}

pub fn map_tasks(
    value: &Value,
    goals: &[Goal],
    now: DateTime<Utc>,
) -> Result<Vec<DailyTask>, AiError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => map.get("tasks").and_then(Value::as_array).ok_or_else(|| {
            AiError::UnexpectedShape("object has no tasks array".to_string())
        })?,
        _ => {
            return Err(AiError::UnexpectedShape(
                "expected an array of tasks".to_string(),
            ))
        }
    };

    Ok(items
        .iter()
        .map(|item| {
            let empty = Map::new();
            let fields = item.as_object().unwrap_or(&empty);
            map_task(fields, goals, now)
        })
        .collect())
}

fn map_task(fields: &Map<String, Value>, goals: &[Goal], now: DateTime<Utc>) -> DailyTask {
    let goal_title = text(fields, "goalTitle");
    let matched = goal_title.as_deref().and_then(|wanted| {
        goals
            .iter()
            .find(|goal| goal.title.to_lowercase() == wanted.to_lowercase())
    });
    let goal_id = matched
        .or_else(|| goals.first())
        .map(|goal| goal.id.clone())
        .unwrap_or_default();
    let goal_title = goal_title
        .or_else(|| goals.first().map(|goal| goal.title.clone()))
        .unwrap_or_else(|| "General".to_string());

    DailyTask {
        id: new_id(),
        title: text(fields, "title").unwrap_or_else(|| "Untitled Task".to_string()),
        description: text(fields, "description").unwrap_or_default(),
        goal_id,
        goal_title,
        step_index: None,
        priority: text(fields, "priority")
            .and_then(|value| TaskPriority::parse(&value))
            .unwrap_or_default(),
        category: text(fields, "category")
            .and_then(|value| TaskCategory::parse(&value))
            .unwrap_or_default(),
        estimated_time: minutes(fields.get("estimatedTime")).unwrap_or(DEFAULT_ESTIMATED_MINUTES),
        completed: false,
        created_at: now,
        completed_at: None,
        ai_insight: Some(text(fields, "aiInsight").unwrap_or_default()),
    }
}

fn text(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn minutes(value: Option<&Value>) -> Option<u32> {
    let minutes = match value? {
        Value::Number(number) => number.as_u64(),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }?;
    u32::try_from(minutes).ok().filter(|minutes| *minutes > 0)
}
