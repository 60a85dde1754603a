use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapStep {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Legacy alias of `title`, still written for older readers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

impl RoadmapStep {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            id: new_id(),
            step: Some(title.clone()),
            title,
            description: description.into(),
            completed: false,
            notes: None,
            due_date: None,
            order: None,
        }
    }

    fn reconcile_legacy_title(&mut self) {
        if self.title.trim().is_empty() {
            if let Some(step) = self.step.as_deref().filter(|s| !s.trim().is_empty()) {
                self.title = step.to_string();
            }
        }
        self.step = Some(self.title.clone());
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(deserialize_with = "number_or_text")]
    pub month: u32,
    pub year: i32,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub roadmap: Vec<RoadmapStep>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_date: Option<NaiveDate>,
}

impl Goal {
    pub fn completed_steps(&self) -> usize {
        self.roadmap.iter().filter(|step| step.completed).count()
    }

    /// `round(100 * completed / total)`, 0 for an empty roadmap.
    pub fn computed_progress(&self) -> u8 {
        let total = self.roadmap.len();
        if total == 0 {
            return 0;
        }
        let done = self.completed_steps();
        ((200 * done + total) / (2 * total)) as u8
    }

    /// Rewrites step positions and legacy aliases, then recomputes progress.
    pub fn refresh_roadmap(&mut self) {
        for (idx, step) in self.roadmap.iter_mut().enumerate() {
            step.reconcile_legacy_title();
            step.order = Some((idx + 1) as u32);
        }
        self.progress = self.computed_progress();
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    High,
    #[default]
    Medium,
    Low,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskCategory {
    Research,
    Planning,
    #[default]
    Creation,
    Communication,
    Review,
}

impl TaskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Research => "research",
            Self::Planning => "planning",
            Self::Creation => "creation",
            Self::Communication => "communication",
            Self::Review => "review",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "research" => Some(Self::Research),
            "planning" => Some(Self::Planning),
            "creation" => Some(Self::Creation),
            "communication" => Some(Self::Communication),
            "review" => Some(Self::Review),
            _ => None,
        }
    }
}

// Stored tasks may carry whatever label the model returned ("High",
// "Research "), so unknown text reads as the default.
impl<'de> Deserialize<'de> for TaskPriority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(raw.as_str().and_then(Self::parse).unwrap_or_default())
    }
}

impl<'de> Deserialize<'de> for TaskCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(raw.as_str().and_then(Self::parse).unwrap_or_default())
    }
}

/// Accepts `10` as well as `"10"`.
fn number_or_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Number(number) => number
            .as_u64()
            .and_then(|value| u32::try_from(value).ok())
            .ok_or_else(|| D::Error::custom(format!("expected a whole number, got {number}"))),
        Value::String(text) => text
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("expected a whole number, got \"{text}\""))),
        other => Err(D::Error::custom(format!("expected a whole number, got {other}"))),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub goal_id: String,
    #[serde(default)]
    pub goal_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_index: Option<u32>,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub category: TaskCategory,
    #[serde(default, deserialize_with = "number_or_text")]
    pub estimated_time: u32,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_insight: Option<String>,
}

#[derive(Debug, Default)]
pub struct TaskBuckets {
    pub today: Vec<DailyTask>,
    pub previous: Vec<DailyTask>,
}

/// Splits tasks by the calendar date of `created_at` in `now`'s timezone.
pub fn partition_tasks<Tz: TimeZone>(tasks: Vec<DailyTask>, now: &DateTime<Tz>) -> TaskBuckets {
    let today = now.date_naive();
    let tz = now.timezone();
    let (today_tasks, previous) = tasks
        .into_iter()
        .partition(|task| task.created_at.with_timezone(&tz).date_naive() == today);
    TaskBuckets {
        today: today_tasks,
        previous,
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, alias = "isPinned")]
    pub pinned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_insights: Option<Vec<String>>,
}

#[derive(Clone, Debug)]
pub struct GoalInput {
    pub title: String,
    pub description: String,
    pub month: u32,
    pub year: i32,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub target_date: Option<NaiveDate>,
}

#[derive(Clone, Debug, Default)]
pub struct GoalChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub target_date: Option<NaiveDate>,
}

#[derive(Clone, Debug, Default)]
pub struct GoalQuery {
    pub month: Option<u32>,
    pub year: Option<i32>,
}

#[derive(Clone, Debug)]
pub struct StepInput {
    pub title: String,
    pub description: String,
    pub due_date: Option<NaiveDate>,
}

#[derive(Clone, Debug, Default)]
pub struct StepChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub completed: Option<bool>,
}

#[derive(Clone, Debug)]
pub struct NoteInput {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub color: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct NoteChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub color: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct NoteQuery {
    pub tag: Option<String>,
    pub search: Option<String>,
}
