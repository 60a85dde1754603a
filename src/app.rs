use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tracing::info;

use crate::ai::{
    generate_daily_tasks, generate_roadmap, goal_chat_reply, note_insights, summarize_note,
    CompletionClient, ProviderClient, RoadmapSource,
};
use crate::error::AppError;
use crate::model::{
    new_id, partition_tasks, DailyTask, Goal, GoalChanges, GoalInput, GoalQuery, Note,
    NoteChanges, NoteInput, NoteQuery, RoadmapStep, StepChanges, StepInput, TaskBuckets,
};
use crate::settings::{ApiSettings, NotificationSettings, Provider};
use crate::store::Storage;
use crate::util::{resolve_index, resolve_step_index};

pub struct App {
    storage: Storage,
    completions: Arc<dyn CompletionClient>,
}

impl App {
    pub fn new(storage: Storage, completions: Arc<dyn CompletionClient>) -> Self {
        Self {
            storage,
            completions,
        }
    }

    /// Builds an app whose completions go to the stored provider settings.
    pub async fn with_provider(storage: Storage, http: reqwest::Client) -> Result<Self, AppError> {
        let settings = storage.load_api_settings().await?;
        Ok(Self::new(
            storage,
            Arc::new(ProviderClient::new(http, settings)),
        ))
    }

    pub async fn add_goal(&self, input: GoalInput) -> Result<(Goal, RoadmapSource), AppError> {
        ensure_non_empty("goal title", &input.title)?;
        ensure_month(input.month)?;
        let outcome =
            generate_roadmap(self.completions.as_ref(), &input.title, &input.description).await;

        let now = Utc::now();
        let mut goal = Goal {
            id: new_id(),
            title: input.title.trim().to_string(),
            description: input.description.trim().to_string(),
            month: input.month,
            year: input.year,
            progress: 0,
            roadmap: outcome.steps,
            created_at: now,
            updated_at: now,
            category: input.category,
            priority: input.priority,
            target_date: input.target_date,
        };
        goal.refresh_roadmap();

        let mut goals = self.storage.load_goals().await?;
        goals.push(goal.clone());
        self.storage.save_goals(&goals).await?;
        info!(goal_id = %goal.id, source = outcome.source.as_str(), "created goal");
        Ok((goal, outcome.source))
    }

    pub async fn list_goals(&self, query: &GoalQuery) -> Result<Vec<Goal>, AppError> {
        let mut goals: Vec<Goal> = self
            .storage
            .load_goals()
            .await?
            .into_iter()
            .filter(|goal| query.month.is_none_or(|month| goal.month == month))
            .filter(|goal| query.year.is_none_or(|year| goal.year == year))
            .collect();
        goals.sort_by(|a, b| {
            (a.year, a.month, a.created_at).cmp(&(b.year, b.month, b.created_at))
        });
        Ok(goals)
    }

    pub async fn get_goal(&self, id: &str) -> Result<Goal, AppError> {
        let goals = self.storage.load_goals().await?;
        let idx = resolve_index(&goals, id, "goal", |goal| goal.id.as_str())?;
        Ok(goals[idx].clone())
    }

    pub async fn update_goal(&self, id: &str, changes: GoalChanges) -> Result<Goal, AppError> {
        if let Some(title) = &changes.title {
            ensure_non_empty("goal title", title)?;
        }
        if let Some(month) = changes.month {
            ensure_month(month)?;
        }
        let (goal, ()) = self
            .mutate_goal(id, |goal| {
                if let Some(title) = changes.title {
                    goal.title = title.trim().to_string();
                }
                if let Some(description) = changes.description {
                    goal.description = description.trim().to_string();
                }
                if let Some(month) = changes.month {
                    goal.month = month;
                }
                if let Some(year) = changes.year {
                    goal.year = year;
                }
                if let Some(category) = changes.category {
                    goal.category = non_blank(category);
                }
                if let Some(priority) = changes.priority {
                    goal.priority = non_blank(priority);
                }
                if let Some(target_date) = changes.target_date {
                    goal.target_date = Some(target_date);
                }
                Ok(())
            })
            .await?;
        Ok(goal)
    }

    pub async fn delete_goal(&self, id: &str) -> Result<Goal, AppError> {
        let mut goals = self.storage.load_goals().await?;
        let idx = resolve_index(&goals, id, "goal", |goal| goal.id.as_str())?;
        let removed = goals.remove(idx);
        self.storage.save_goals(&goals).await?;
        Ok(removed)
    }

    /// Replaces the roadmap with a freshly generated one. Progress resets.
    pub async fn regenerate_roadmap(&self, id: &str) -> Result<(Goal, RoadmapSource), AppError> {
        let current = self.get_goal(id).await?;
        let outcome =
            generate_roadmap(self.completions.as_ref(), &current.title, &current.description)
                .await;
        let (goal, ()) = self
            .mutate_goal(&current.id, |goal| {
                goal.roadmap = outcome.steps;
                Ok(())
            })
            .await?;
        Ok((goal, outcome.source))
    }

    pub async fn goal_chat(&self, id: &str, message: &str) -> Result<String, AppError> {
        ensure_non_empty("message", message)?;
        let goal = self.get_goal(id).await?;
        Ok(goal_chat_reply(self.completions.as_ref(), &goal, message.trim()).await?)
    }

    /// Inserts a step at the 1-based `at` position, or appends it.
    pub async fn add_step(
        &self,
        goal_id: &str,
        input: StepInput,
        at: Option<usize>,
    ) -> Result<(Goal, RoadmapStep), AppError> {
        ensure_non_empty("step title", &input.title)?;
        self.mutate_goal(goal_id, |goal| {
            let mut step = RoadmapStep::new(input.title.trim(), input.description.trim());
            step.due_date = input.due_date;
            let position = match at {
                Some(0) => {
                    return Err(AppError::InvalidInput("position starts at 1".to_string()))
                }
                Some(at) => (at - 1).min(goal.roadmap.len()),
                None => goal.roadmap.len(),
            };
            goal.roadmap.insert(position, step.clone());
            Ok(step)
        })
        .await
        .map(|(goal, step)| {
            let step = find_step(&goal, &step.id).unwrap_or(step);
            (goal, step)
        })
    }

    pub async fn update_step(
        &self,
        goal_id: &str,
        selector: &str,
        changes: StepChanges,
    ) -> Result<(Goal, RoadmapStep), AppError> {
        if let Some(title) = &changes.title {
            ensure_non_empty("step title", title)?;
        }
        self.mutate_goal(goal_id, |goal| {
            let idx = resolve_step_index(&goal.roadmap, selector)?;
            let step = &mut goal.roadmap[idx];
            if let Some(title) = changes.title {
                step.title = title.trim().to_string();
            }
            if let Some(description) = changes.description {
                step.description = description.trim().to_string();
            }
            if let Some(notes) = changes.notes {
                step.notes = non_blank(notes);
            }
            if let Some(due_date) = changes.due_date {
                step.due_date = Some(due_date);
            }
            if let Some(completed) = changes.completed {
                step.completed = completed;
            }
            Ok(step.id.clone())
        })
        .await
        .and_then(|(goal, step_id)| with_step(goal, &step_id))
    }

    pub async fn toggle_step(
        &self,
        goal_id: &str,
        selector: &str,
    ) -> Result<(Goal, RoadmapStep), AppError> {
        self.mutate_goal(goal_id, |goal| {
            let idx = resolve_step_index(&goal.roadmap, selector)?;
            let step = &mut goal.roadmap[idx];
            step.completed = !step.completed;
            Ok(step.id.clone())
        })
        .await
        .and_then(|(goal, step_id)| with_step(goal, &step_id))
    }

    /// Moves a step to the 1-based position `to`, clamped to the roadmap length.
    pub async fn move_step(&self, goal_id: &str, selector: &str, to: usize) -> Result<Goal, AppError> {
        if to == 0 {
            return Err(AppError::InvalidInput("position starts at 1".to_string()));
        }
        let (goal, ()) = self
            .mutate_goal(goal_id, |goal| {
                let current = resolve_step_index(&goal.roadmap, selector)?;
                let moving = goal.roadmap.remove(current);
                let desired = (to - 1).min(goal.roadmap.len());
                goal.roadmap.insert(desired, moving);
                Ok(())
            })
            .await?;
        Ok(goal)
    }

    /// Removes every selected step. Selectors resolve against the roadmap as
    /// it was before the call.
    pub async fn remove_steps(
        &self,
        goal_id: &str,
        selectors: &[String],
    ) -> Result<(Goal, usize), AppError> {
        if selectors.is_empty() {
            return Err(AppError::InvalidInput(
                "at least one step is required".to_string(),
            ));
        }
        self.mutate_goal(goal_id, |goal| {
            let mut indices = HashSet::new();
            for selector in selectors {
                indices.insert(resolve_step_index(&goal.roadmap, selector)?);
            }
            let mut idx = 0;
            goal.roadmap.retain(|_| {
                let keep = !indices.contains(&idx);
                idx += 1;
                keep
            });
            Ok(indices.len())
        })
        .await
    }

    /// Asks the provider for today's tasks and appends them to the stored list.
    pub async fn generate_tasks(&self, now: DateTime<Utc>) -> Result<Vec<DailyTask>, AppError> {
        let goals: Vec<Goal> = self
            .storage
            .load_goals()
            .await?
            .into_iter()
            .filter(|goal| goal.progress < 100)
            .collect();
        if goals.is_empty() {
            return Err(AppError::InvalidInput(
                "add an unfinished goal before generating daily tasks".to_string(),
            ));
        }
        let generated = generate_daily_tasks(self.completions.as_ref(), &goals, now).await?;

        let mut tasks = self.storage.load_tasks().await?;
        tasks.extend(generated.iter().cloned());
        self.storage.save_tasks(&tasks).await?;
        Ok(generated)
    }

    pub async fn list_tasks<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<TaskBuckets, AppError> {
        let tasks = self.storage.load_tasks().await?;
        Ok(partition_tasks(tasks, now))
    }

    pub async fn toggle_task(&self, id: &str) -> Result<DailyTask, AppError> {
        let mut tasks = self.storage.load_tasks().await?;
        let idx = resolve_index(&tasks, id, "task", |task| task.id.as_str())?;
        let task = &mut tasks[idx];
        task.completed = !task.completed;
        task.completed_at = task.completed.then(Utc::now);
        let updated = task.clone();
        self.storage.save_tasks(&tasks).await?;
        Ok(updated)
    }

    pub async fn remove_task(&self, id: &str) -> Result<DailyTask, AppError> {
        let mut tasks = self.storage.load_tasks().await?;
        let idx = resolve_index(&tasks, id, "task", |task| task.id.as_str())?;
        let removed = tasks.remove(idx);
        self.storage.save_tasks(&tasks).await?;
        Ok(removed)
    }

    pub async fn add_note(&self, input: NoteInput) -> Result<Note, AppError> {
        ensure_non_empty("note title", &input.title)?;
        let now = Utc::now();
        let note = Note {
            id: new_id(),
            title: input.title.trim().to_string(),
            content: input.content,
            tags: clean_tags(input.tags),
            color: input.color.and_then(non_blank),
            pinned: false,
            created_at: now,
            updated_at: now,
            ai_summary: None,
            ai_insights: None,
        };
        let mut notes = self.storage.load_notes().await?;
        notes.push(note.clone());
        self.storage.save_notes(&notes).await?;
        Ok(note)
    }

    /// Pinned notes first, then most recently updated.
    pub async fn list_notes(&self, query: &NoteQuery) -> Result<Vec<Note>, AppError> {
        let tag = query
            .tag
            .as_deref()
            .map(|tag| tag.trim().to_lowercase())
            .filter(|tag| !tag.is_empty());
        let search = query
            .search
            .as_deref()
            .map(|text| text.trim().to_lowercase())
            .filter(|text| !text.is_empty());

        let mut notes: Vec<Note> = self
            .storage
            .load_notes()
            .await?
            .into_iter()
            .filter(|note| {
                tag.as_ref().is_none_or(|tag| {
                    note.tags.iter().any(|candidate| candidate.to_lowercase() == *tag)
                })
            })
            .filter(|note| {
                search.as_ref().is_none_or(|text| {
                    note.title.to_lowercase().contains(text)
                        || note.content.to_lowercase().contains(text)
                })
            })
            .collect();
        notes.sort_by(|a, b| {
            b.pinned
                .cmp(&a.pinned)
                .then_with(|| b.updated_at.cmp(&a.updated_at))
        });
        Ok(notes)
    }

    pub async fn get_note(&self, id: &str) -> Result<Note, AppError> {
        let notes = self.storage.load_notes().await?;
        let idx = resolve_index(&notes, id, "note", |note| note.id.as_str())?;
        Ok(notes[idx].clone())
    }

    pub async fn update_note(&self, id: &str, changes: NoteChanges) -> Result<Note, AppError> {
        if let Some(title) = &changes.title {
            ensure_non_empty("note title", title)?;
        }
        self.mutate_note(id, |note| {
            if let Some(title) = changes.title {
                note.title = title.trim().to_string();
            }
            if let Some(content) = changes.content {
                if content != note.content {
                    note.ai_summary = None;
                    note.ai_insights = None;
                }
                note.content = content;
            }
            if let Some(tags) = changes.tags {
                note.tags = clean_tags(tags);
            }
            if let Some(color) = changes.color {
                note.color = non_blank(color);
            }
        })
        .await
    }

    pub async fn toggle_pin(&self, id: &str) -> Result<Note, AppError> {
        self.mutate_note(id, |note| note.pinned = !note.pinned).await
    }

    pub async fn delete_note(&self, id: &str) -> Result<Note, AppError> {
        let mut notes = self.storage.load_notes().await?;
        let idx = resolve_index(&notes, id, "note", |note| note.id.as_str())?;
        let removed = notes.remove(idx);
        self.storage.save_notes(&notes).await?;
        Ok(removed)
    }

    pub async fn summarize_note(&self, id: &str) -> Result<Note, AppError> {
        let note = self.get_note(id).await?;
        ensure_non_empty("note content", &note.content)?;
        let summary = summarize_note(self.completions.as_ref(), &note.content).await?;
        self.mutate_note(&note.id, |note| note.ai_summary = Some(summary))
            .await
    }

    pub async fn note_insights(&self, id: &str) -> Result<Note, AppError> {
        let note = self.get_note(id).await?;
        ensure_non_empty("note content", &note.content)?;
        let insights = note_insights(self.completions.as_ref(), &note.content).await?;
        self.mutate_note(&note.id, |note| note.ai_insights = Some(insights))
            .await
    }

    pub async fn api_settings(&self) -> Result<Option<ApiSettings>, AppError> {
        self.storage.load_api_settings().await
    }

    pub async fn set_api_settings(&self, settings: ApiSettings) -> Result<ApiSettings, AppError> {
        ensure_non_empty("api key", &settings.api_key)?;
        let provider = Provider::from_name(&settings.provider)?;
        let settings = ApiSettings {
            provider: provider.as_str().to_string(),
            api_key: settings.api_key.trim().to_string(),
            model: settings.model.and_then(non_blank),
            base_url: settings.base_url.and_then(non_blank),
        };
        self.storage.save_api_settings(&settings).await?;
        Ok(settings)
    }

    pub async fn clear_api_settings(&self) -> Result<(), AppError> {
        self.storage.clear_api_settings().await
    }

    pub async fn notification_settings(&self) -> Result<NotificationSettings, AppError> {
        self.storage.load_notification_settings().await
    }

    pub async fn set_notification_settings(
        &self,
        settings: NotificationSettings,
    ) -> Result<NotificationSettings, AppError> {
        if settings.quiet_hours.bounds().is_none() {
            return Err(AppError::InvalidInput(format!(
                "quiet hours must be HH:MM, got {}-{}",
                settings.quiet_hours.start, settings.quiet_hours.end
            )));
        }
        self.storage.save_notification_settings(&settings).await?;
        Ok(settings)
    }

    /// Loads goals, applies `apply` to the addressed goal, then refreshes
    /// step order and progress before saving.
    async fn mutate_goal<T>(
        &self,
        id: &str,
        apply: impl FnOnce(&mut Goal) -> Result<T, AppError>,
    ) -> Result<(Goal, T), AppError> {
        let mut goals = self.storage.load_goals().await?;
        let idx = resolve_index(&goals, id, "goal", |goal| goal.id.as_str())?;
        let goal = &mut goals[idx];
        let output = apply(goal)?;
        goal.refresh_roadmap();
        goal.updated_at = Utc::now();
        let updated = goal.clone();
        self.storage.save_goals(&goals).await?;
        Ok((updated, output))
    }

    async fn mutate_note(&self, id: &str, apply: impl FnOnce(&mut Note)) -> Result<Note, AppError> {
        let mut notes = self.storage.load_notes().await?;
        let idx = resolve_index(&notes, id, "note", |note| note.id.as_str())?;
        let note = &mut notes[idx];
        apply(note);
        note.updated_at = Utc::now();
        let updated = note.clone();
        self.storage.save_notes(&notes).await?;
        Ok(updated)
    }
}

fn find_step(goal: &Goal, step_id: &str) -> Option<RoadmapStep> {
    goal.roadmap.iter().find(|step| step.id == step_id).cloned()
}

fn with_step(goal: Goal, step_id: &str) -> Result<(Goal, RoadmapStep), AppError> {
    let step = find_step(&goal, step_id)
        .ok_or_else(|| AppError::NotFound(format!("step id {step_id}")))?;
    Ok((goal, step))
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut cleaned = Vec::new();
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && seen.insert(tag.to_lowercase()) {
            cleaned.push(tag);
        }
    }
    cleaned
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn ensure_month(month: u32) -> Result<(), AppError> {
    if !(1..=12).contains(&month) {
        return Err(AppError::InvalidInput(format!(
            "month must be between 1 and 12, got {month}"
        )));
    }
    Ok(())
}

fn ensure_non_empty(label: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::InvalidInput(format!("{label} cannot be empty")));
    }
    Ok(())
}
