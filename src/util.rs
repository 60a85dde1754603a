use chrono::{DateTime, Local, Utc};

use crate::error::AppError;
use crate::model::{DailyTask, Goal, Note, RoadmapStep};

fn has_text(value: &Option<String>) -> bool {
    value
        .as_deref()
        .map(|text| !text.trim().is_empty())
        .unwrap_or(false)
}

pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

pub fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        12 => "December",
        _ => "Unknown",
    }
}

pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Finds an entity by exact id or by a unique id prefix.
pub fn resolve_index<T>(
    items: &[T],
    wanted: &str,
    label: &str,
    id_of: impl Fn(&T) -> &str,
) -> Result<usize, AppError> {
    let wanted = wanted.trim();
    if wanted.is_empty() {
        return Err(AppError::InvalidInput(format!("{label} id cannot be empty")));
    }
    if let Some(idx) = items.iter().position(|item| id_of(item) == wanted) {
        return Ok(idx);
    }
    let matches: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| id_of(item).starts_with(wanted))
        .map(|(idx, _)| idx)
        .collect();
    match matches.as_slice() {
        [idx] => Ok(*idx),
        [] => Err(AppError::NotFound(format!("{label} id {wanted}"))),
        _ => Err(AppError::InvalidInput(format!(
            "{label} id prefix '{wanted}' matches {} entries",
            matches.len()
        ))),
    }
}

/// All-digit selectors are 1-based positions; anything else is an id prefix.
pub fn resolve_step_index(steps: &[RoadmapStep], selector: &str) -> Result<usize, AppError> {
    let selector = selector.trim();
    if !selector.is_empty() && selector.chars().all(|ch| ch.is_ascii_digit()) {
        let position: usize = selector
            .parse()
            .map_err(|_| AppError::InvalidInput(format!("invalid step position {selector}")))?;
        if position == 0 || position > steps.len() {
            return Err(AppError::NotFound(format!(
                "step {position} (roadmap has {} steps)",
                steps.len()
            )));
        }
        return Ok(position - 1);
    }
    resolve_index(steps, selector, "step", |step| step.id.as_str())
}

pub fn format_goal_detail(goal: &Goal) -> String {
    let mut output = String::new();
    output.push_str(&format!("Goal ID: {}\n", goal.id));
    output.push_str(&format!("Title: {}\n", goal.title));
    output.push_str(&format!(
        "Month: {} {}\n",
        month_name(goal.month),
        goal.year
    ));
    if !goal.description.trim().is_empty() {
        output.push_str(&format!("Description: {}\n", goal.description));
    }
    if has_text(&goal.category) {
        output.push_str(&format!(
            "Category: {}\n",
            goal.category.as_deref().unwrap_or("")
        ));
    }
    if has_text(&goal.priority) {
        output.push_str(&format!(
            "Priority: {}\n",
            goal.priority.as_deref().unwrap_or("")
        ));
    }
    if let Some(target) = goal.target_date {
        output.push_str(&format!("Target: {}\n", target.format("%Y-%m-%d")));
    }
    output.push_str(&format!(
        "Progress: {}% ({}/{} steps)\n",
        goal.progress,
        goal.completed_steps(),
        goal.roadmap.len()
    ));
    output.push_str(&format!("Created: {}\n", format_datetime(goal.created_at)));
    output.push_str(&format!("Updated: {}\n", format_datetime(goal.updated_at)));
    output.push('\n');
    if goal.roadmap.is_empty() {
        output.push_str("Roadmap: (none)");
        return output;
    }
    output.push_str("Roadmap:\n");
    output.push_str(&format_roadmap(&goal.roadmap));
    output.trim_end().to_string()
}

pub fn format_roadmap(steps: &[RoadmapStep]) -> String {
    let mut output = String::new();
    for (idx, step) in steps.iter().enumerate() {
        let mark = if step.completed { "x" } else { " " };
        output.push_str(&format!(
            "{}. [{}] {} (step id {})\n",
            idx + 1,
            mark,
            step.title,
            short_id(&step.id)
        ));
        if !step.description.trim().is_empty() {
            output.push_str(&format!("   {}\n", step.description));
        }
        if let Some(due) = step.due_date {
            output.push_str(&format!("   Due: {}\n", due.format("%Y-%m-%d")));
        }
        if has_text(&step.notes) {
            output.push_str(&format!(
                "   Notes: {}\n",
                step.notes.as_deref().unwrap_or("")
            ));
        }
    }
    output
}

pub fn format_task_line(task: &DailyTask) -> String {
    let mark = if task.completed { "x" } else { " " };
    format!(
        "[{}] {:<8} {:<6} {:<13} {:>3}m {} ({})",
        mark,
        short_id(&task.id),
        task.priority.as_str(),
        task.category.as_str(),
        task.estimated_time,
        task.title,
        task.goal_title
    )
}

pub fn format_note_detail(note: &Note) -> String {
    let mut output = String::new();
    output.push_str(&format!("Note ID: {}\n", note.id));
    output.push_str(&format!("Title: {}\n", note.title));
    if note.pinned {
        output.push_str("Pinned: yes\n");
    }
    if !note.tags.is_empty() {
        output.push_str(&format!("Tags: {}\n", note.tags.join(", ")));
    }
    if has_text(&note.color) {
        output.push_str(&format!("Color: {}\n", note.color.as_deref().unwrap_or("")));
    }
    output.push_str(&format!("Created: {}\n", format_datetime(note.created_at)));
    output.push_str(&format!("Updated: {}\n", format_datetime(note.updated_at)));
    output.push('\n');
    output.push_str(&note.content);
    output.push('\n');
    if has_text(&note.ai_summary) {
        output.push_str(&format!(
            "\nSummary: {}\n",
            note.ai_summary.as_deref().unwrap_or("")
        ));
    }
    if let Some(insights) = note.ai_insights.as_ref().filter(|items| !items.is_empty()) {
        output.push_str("\nInsights:\n");
        for insight in insights {
            output.push_str(&format!("- {insight}\n"));
        }
    }
    output.trim_end().to_string()
}
