mod ai;
mod app;
mod cli;
mod db;
mod entities;
mod error;
mod model;
mod reminders;
mod settings;
mod store;
mod util;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, Local, NaiveDateTime, Utc};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::app::App;
use crate::cli::{
    Cli, Command, GoalAdd, GoalChat, GoalCommand, GoalList, GoalRemove, GoalRoadmap, GoalShow,
    GoalUpdate, NoteAdd, NoteCommand, NoteInsights, NoteList, NotePin, NoteRemove, NoteShow,
    NoteSummarize, NoteUpdate, RemindCommand, RemindPlan, SettingsCommand, SettingsSetApi,
    SettingsSetNotify, StepAdd, StepCommand, StepMove, StepRemove, StepToggle, StepUpdate,
    TaskCommand, TaskList, TaskRemove, TaskToggle,
};
use crate::error::AppError;
use crate::model::{
    Goal, GoalChanges, GoalInput, GoalQuery, Note, NoteChanges, NoteInput, NoteQuery, StepChanges,
    StepInput,
};
use crate::reminders::{plan_reminders, Reminder, ReminderScheduler, ReminderSink};
use crate::settings::{parse_clock, ApiSettings, NotificationSettings, Provider};
use crate::store::{SqliteStore, Storage};
use crate::util::{
    format_datetime, format_goal_detail, format_note_detail, format_roadmap, format_task_line,
    short_id,
};

const HOME_ENV: &str = "GOALPILOT_HOME";
const LOG_ENV: &str = "GOALPILOT_LOG";

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("Error: {err}");
        if err.is_ai() {
            eprintln!("Check `goalpilot settings show` and try again.");
        }
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn run() -> Result<(), AppError> {
    let Cli { home, command } = Cli::parse();

    let home = resolve_home(home)?;
    let db_path = db::resolve_db_path(&home);
    db::ensure_parent_dir(&db_path)?;
    let mut lock = db::open_lock(&db_path)?;
    let guard = lock.write()?;
    debug!(path = %db_path.display(), "opened store");

    let db = db::connect(&db_path).await?;
    db::ensure_schema(&db).await?;
    let storage = Storage::new(Arc::new(SqliteStore::new(db)));
    let app = App::with_provider(storage, reqwest::Client::new()).await?;

    match command {
        Command::Goal(command) => handle_goal(&app, command).await,
        Command::Step(command) => handle_step(&app, command).await,
        Command::Task(command) => handle_task(&app, command).await,
        Command::Note(command) => handle_note(&app, command).await,
        Command::Settings(command) => handle_settings(&app, command).await,
        Command::Remind(RemindCommand::Plan(args)) => handle_remind_plan(&app, args).await,
        Command::Remind(RemindCommand::Run(_)) => {
            let settings = app.notification_settings().await?;
            // Waiting can take hours; let other commands use the store meanwhile.
            drop(guard);
            handle_remind_run(&settings).await
        }
    }
}

fn resolve_home(flag: Option<PathBuf>) -> Result<PathBuf, AppError> {
    if let Some(home) = flag {
        return Ok(home);
    }
    if let Ok(home) = std::env::var(HOME_ENV) {
        if !home.trim().is_empty() {
            return Ok(PathBuf::from(home));
        }
    }
    if let Ok(home) = std::env::var("HOME") {
        return Ok(PathBuf::from(home).join(".goalpilot"));
    }
    Err(AppError::InvalidInput(format!(
        "unable to resolve data directory; pass --home or set {HOME_ENV}"
    )))
}

async fn handle_goal(app: &App, command: GoalCommand) -> Result<(), AppError> {
    match command {
        GoalCommand::Add(args) => handle_goal_add(app, args).await,
        GoalCommand::List(args) => handle_goal_list(app, args).await,
        GoalCommand::Show(args) => handle_goal_show(app, args).await,
        GoalCommand::Update(args) => handle_goal_update(app, args).await,
        GoalCommand::Remove(args) => handle_goal_remove(app, args).await,
        GoalCommand::Roadmap(args) => handle_goal_roadmap(app, args).await,
        GoalCommand::Chat(args) => handle_goal_chat(app, args).await,
    }
}

async fn handle_step(app: &App, command: StepCommand) -> Result<(), AppError> {
    match command {
        StepCommand::Add(args) => handle_step_add(app, args).await,
        StepCommand::Update(args) => handle_step_update(app, args).await,
        StepCommand::Toggle(args) => handle_step_toggle(app, args).await,
        StepCommand::Move(args) => handle_step_move(app, args).await,
        StepCommand::Remove(args) => handle_step_remove(app, args).await,
    }
}

async fn handle_task(app: &App, command: TaskCommand) -> Result<(), AppError> {
    match command {
        TaskCommand::Generate(_) => handle_task_generate(app).await,
        TaskCommand::List(args) => handle_task_list(app, args).await,
        TaskCommand::Toggle(args) => handle_task_toggle(app, args).await,
        TaskCommand::Remove(args) => handle_task_remove(app, args).await,
    }
}

async fn handle_note(app: &App, command: NoteCommand) -> Result<(), AppError> {
    match command {
        NoteCommand::Add(args) => handle_note_add(app, args).await,
        NoteCommand::List(args) => handle_note_list(app, args).await,
        NoteCommand::Show(args) => handle_note_show(app, args).await,
        NoteCommand::Update(args) => handle_note_update(app, args).await,
        NoteCommand::Pin(args) => handle_note_pin(app, args).await,
        NoteCommand::Remove(args) => handle_note_remove(app, args).await,
        NoteCommand::Summarize(args) => handle_note_summarize(app, args).await,
        NoteCommand::Insights(args) => handle_note_insights(app, args).await,
    }
}

async fn handle_settings(app: &App, command: SettingsCommand) -> Result<(), AppError> {
    match command {
        SettingsCommand::Show(_) => handle_settings_show(app).await,
        SettingsCommand::SetApi(args) => handle_settings_set_api(app, args).await,
        SettingsCommand::ClearApi(_) => {
            app.clear_api_settings().await?;
            println!("Cleared API settings.");
            Ok(())
        }
        SettingsCommand::SetNotify(args) => handle_settings_set_notify(app, args).await,
    }
}

async fn handle_goal_add(app: &App, args: GoalAdd) -> Result<(), AppError> {
    let today = Local::now();
    let (goal, source) = app
        .add_goal(GoalInput {
            title: args.title,
            description: args.description,
            month: args.month.unwrap_or_else(|| today.month()),
            year: args.year.unwrap_or_else(|| today.year()),
            category: args.category,
            priority: args.priority,
            target_date: args.target,
        })
        .await?;

    println!("Created goal ID: {}: {}", goal.id, goal.title);
    println!(
        "Roadmap: {} steps ({})",
        goal.roadmap.len(),
        source.as_str()
    );
    print!("{}", format_roadmap(&goal.roadmap));
    Ok(())
}

async fn handle_goal_list(app: &App, args: GoalList) -> Result<(), AppError> {
    let goals = app
        .list_goals(&GoalQuery {
            month: args.month,
            year: args.year,
        })
        .await?;
    if goals.is_empty() {
        println!("No goals found.");
        return Ok(());
    }
    print_goal_list(&goals);
    Ok(())
}

async fn handle_goal_show(app: &App, args: GoalShow) -> Result<(), AppError> {
    let goal = app.get_goal(&args.id).await?;
    println!("{}", format_goal_detail(&goal));
    Ok(())
}

async fn handle_goal_update(app: &App, args: GoalUpdate) -> Result<(), AppError> {
    let goal = app
        .update_goal(
            &args.id,
            GoalChanges {
                title: args.title,
                description: args.description,
                month: args.month,
                year: args.year,
                category: args.category,
                priority: args.priority,
                target_date: args.target,
            },
        )
        .await?;
    println!("Updated goal ID: {}: {}", goal.id, goal.title);
    Ok(())
}

async fn handle_goal_remove(app: &App, args: GoalRemove) -> Result<(), AppError> {
    let goal = app.delete_goal(&args.id).await?;
    println!("Goal ID: {} removed.", goal.id);
    Ok(())
}

async fn handle_goal_roadmap(app: &App, args: GoalRoadmap) -> Result<(), AppError> {
    let (goal, source) = app.regenerate_roadmap(&args.id).await?;
    println!(
        "Regenerated roadmap for goal ID: {} ({} steps, {})",
        goal.id,
        goal.roadmap.len(),
        source.as_str()
    );
    print!("{}", format_roadmap(&goal.roadmap));
    Ok(())
}

async fn handle_goal_chat(app: &App, args: GoalChat) -> Result<(), AppError> {
    let message = args.message.join(" ");
    let reply = app.goal_chat(&args.id, &message).await?;
    println!("{reply}");
    Ok(())
}

async fn handle_step_add(app: &App, args: StepAdd) -> Result<(), AppError> {
    let (goal, step) = app
        .add_step(
            &args.goal_id,
            StepInput {
                title: args.title,
                description: args.description,
                due_date: args.due,
            },
            args.at,
        )
        .await?;
    println!(
        "Added step {} to goal ID: {}: {}",
        step.order.unwrap_or_default(),
        goal.id,
        step.title
    );
    print_progress(&goal);
    Ok(())
}

async fn handle_step_update(app: &App, args: StepUpdate) -> Result<(), AppError> {
    let (goal, step) = app
        .update_step(
            &args.goal_id,
            &args.step,
            StepChanges {
                title: args.title,
                description: args.description,
                notes: args.notes,
                due_date: args.due,
                completed: args.completed,
            },
        )
        .await?;
    println!(
        "Updated step {}: {}",
        step.order.unwrap_or_default(),
        step.title
    );
    print_progress(&goal);
    Ok(())
}

async fn handle_step_toggle(app: &App, args: StepToggle) -> Result<(), AppError> {
    let (goal, step) = app.toggle_step(&args.goal_id, &args.step).await?;
    let state = if step.completed { "done" } else { "todo" };
    println!(
        "Step {} marked {}: {}",
        step.order.unwrap_or_default(),
        state,
        step.title
    );
    print_progress(&goal);
    Ok(())
}

async fn handle_step_move(app: &App, args: StepMove) -> Result<(), AppError> {
    let goal = app.move_step(&args.goal_id, &args.step, args.to).await?;
    println!("Reordered roadmap for goal ID: {}:", goal.id);
    print!("{}", format_roadmap(&goal.roadmap));
    Ok(())
}

async fn handle_step_remove(app: &App, args: StepRemove) -> Result<(), AppError> {
    let (goal, removed) = app.remove_steps(&args.goal_id, &args.steps).await?;
    println!("Removed {} steps.", removed);
    print_progress(&goal);
    Ok(())
}

async fn handle_task_generate(app: &App) -> Result<(), AppError> {
    let tasks = app.generate_tasks(Utc::now()).await?;
    if tasks.is_empty() {
        println!("No tasks generated.");
        return Ok(());
    }
    println!("Generated {} tasks:", tasks.len());
    for task in &tasks {
        println!("{}", format_task_line(task));
    }
    Ok(())
}

async fn handle_task_list(app: &App, args: TaskList) -> Result<(), AppError> {
    let buckets = app.list_tasks(&Local::now()).await?;
    if buckets.today.is_empty() {
        println!("No tasks for today.");
    } else {
        let done = buckets.today.iter().filter(|task| task.completed).count();
        println!("Today ({}/{} done):", done, buckets.today.len());
        for task in &buckets.today {
            println!("{}", format_task_line(task));
        }
    }
    if args.all && !buckets.previous.is_empty() {
        println!();
        println!("Previous:");
        for task in &buckets.previous {
            println!("{}", format_task_line(task));
        }
    }
    Ok(())
}

async fn handle_task_toggle(app: &App, args: TaskToggle) -> Result<(), AppError> {
    let task = app.toggle_task(&args.id).await?;
    let state = if task.completed { "done" } else { "todo" };
    println!("Task {} marked {}: {}", short_id(&task.id), state, task.title);
    Ok(())
}

async fn handle_task_remove(app: &App, args: TaskRemove) -> Result<(), AppError> {
    let task = app.remove_task(&args.id).await?;
    println!("Task {} removed.", short_id(&task.id));
    Ok(())
}

async fn handle_note_add(app: &App, args: NoteAdd) -> Result<(), AppError> {
    let note = app
        .add_note(NoteInput {
            title: args.title,
            content: args.content,
            tags: args.tags,
            color: args.color,
        })
        .await?;
    println!("Created note ID: {}: {}", note.id, note.title);
    Ok(())
}

async fn handle_note_list(app: &App, args: NoteList) -> Result<(), AppError> {
    let notes = app
        .list_notes(&NoteQuery {
            tag: args.tag,
            search: args.search,
        })
        .await?;
    if notes.is_empty() {
        println!("No notes found.");
        return Ok(());
    }
    print_note_list(&notes);
    Ok(())
}

async fn handle_note_show(app: &App, args: NoteShow) -> Result<(), AppError> {
    let note = app.get_note(&args.id).await?;
    println!("{}", format_note_detail(&note));
    Ok(())
}

async fn handle_note_update(app: &App, args: NoteUpdate) -> Result<(), AppError> {
    let tags = if args.clear_tags {
        Some(Vec::new())
    } else if args.tags.is_empty() {
        None
    } else {
        Some(args.tags)
    };
    let note = app
        .update_note(
            &args.id,
            NoteChanges {
                title: args.title,
                content: args.content,
                tags,
                color: args.color,
            },
        )
        .await?;
    println!("Updated note ID: {}: {}", note.id, note.title);
    Ok(())
}

async fn handle_note_pin(app: &App, args: NotePin) -> Result<(), AppError> {
    let note = app.toggle_pin(&args.id).await?;
    let state = if note.pinned { "Pinned" } else { "Unpinned" };
    println!("{} note ID: {}: {}", state, note.id, note.title);
    Ok(())
}

async fn handle_note_remove(app: &App, args: NoteRemove) -> Result<(), AppError> {
    let note = app.delete_note(&args.id).await?;
    println!("Note ID: {} removed.", note.id);
    Ok(())
}

async fn handle_note_summarize(app: &App, args: NoteSummarize) -> Result<(), AppError> {
    let note = app.summarize_note(&args.id).await?;
    println!("{}", note.ai_summary.as_deref().unwrap_or(""));
    Ok(())
}

async fn handle_note_insights(app: &App, args: NoteInsights) -> Result<(), AppError> {
    let note = app.note_insights(&args.id).await?;
    let insights = note.ai_insights.unwrap_or_default();
    if insights.is_empty() {
        println!("No insights returned.");
    }
    for insight in insights {
        println!("- {insight}");
    }
    Ok(())
}

async fn handle_settings_show(app: &App) -> Result<(), AppError> {
    match app.api_settings().await? {
        Some(settings) => print_api_settings(&settings),
        None => println!("API: not configured"),
    }
    println!();
    print_notification_settings(&app.notification_settings().await?);
    Ok(())
}

async fn handle_settings_set_api(app: &App, args: SettingsSetApi) -> Result<(), AppError> {
    let provider = Provider::from(args.provider);
    let settings = app
        .set_api_settings(ApiSettings {
            provider: provider.as_str().to_string(),
            api_key: args.api_key,
            model: args.model,
            base_url: args.base_url,
        })
        .await?;
    println!(
        "Saved API settings for provider {} (key {}).",
        settings.provider,
        settings.masked_key()
    );
    Ok(())
}

async fn handle_settings_set_notify(app: &App, args: SettingsSetNotify) -> Result<(), AppError> {
    let mut settings = app.notification_settings().await?;
    if args.enable {
        settings.enabled = true;
    }
    if args.disable {
        settings.enabled = false;
    }
    if let Some(frequency) = args.frequency {
        settings.frequency = frequency.into();
    }
    if let Some(start) = args.quiet_start {
        settings.quiet_hours.start = start.trim().to_string();
    }
    if let Some(end) = args.quiet_end {
        settings.quiet_hours.end = end.trim().to_string();
    }
    let types = &mut settings.types;
    for (flag, slot) in [
        (args.daily_tasks, &mut types.daily_tasks),
        (args.goal_reminders, &mut types.goal_reminders),
        (args.motivational, &mut types.motivational),
        (args.progress, &mut types.progress),
        (args.streaks, &mut types.streaks),
    ] {
        if let Some(value) = flag {
            *slot = value;
        }
    }

    let settings = app.set_notification_settings(settings).await?;
    println!("Saved notification settings.");
    print_notification_settings(&settings);
    Ok(())
}

async fn handle_remind_plan(app: &App, args: RemindPlan) -> Result<(), AppError> {
    let settings = app.notification_settings().await?;
    let now = match args.at {
        Some(raw) => {
            let time = parse_clock(&raw).ok_or_else(|| {
                AppError::InvalidInput(format!("expected HH:MM for --at, got {raw}"))
            })?;
            Local::now().date_naive().and_time(time)
        }
        None => Local::now().naive_local(),
    };
    if !settings.enabled {
        println!("Notifications are disabled.");
        return Ok(());
    }
    let reminders = plan_reminders(&settings, now);
    if reminders.is_empty() {
        println!("No reminders left for today.");
        return Ok(());
    }
    print_reminders(&reminders);
    Ok(())
}

struct StdoutSink;

#[async_trait]
impl ReminderSink for StdoutSink {
    async fn deliver(&self, reminder: &Reminder) {
        println!(
            "[{}] {}: {}",
            reminder.at.format("%H:%M"),
            reminder.title,
            reminder.body
        );
    }
}

async fn handle_remind_run(settings: &NotificationSettings) -> Result<(), AppError> {
    if !settings.enabled {
        println!("Notifications are disabled.");
        return Ok(());
    }
    let now: NaiveDateTime = Local::now().naive_local();
    let reminders = plan_reminders(settings, now);
    if reminders.is_empty() {
        println!("No reminders left for today.");
        return Ok(());
    }

    print_reminders(&reminders);
    let mut scheduler = ReminderScheduler::new();
    scheduler.schedule(reminders, now, Arc::new(StdoutSink));
    println!(
        "Waiting for {} reminders (Ctrl-C to stop).",
        scheduler.pending()
    );

    let interrupted = tokio::select! {
        delivered = scheduler.join() => {
            println!("Delivered {delivered} reminders.");
            false
        }
        _ = tokio::signal::ctrl_c() => true,
    };
    if interrupted {
        scheduler.cancel_all();
        println!("Cancelled pending reminders.");
    }
    Ok(())
}

fn print_progress(goal: &Goal) {
    println!(
        "Progress: {}% ({}/{} steps)",
        goal.progress,
        goal.completed_steps(),
        goal.roadmap.len()
    );
}

fn print_goal_list(goals: &[Goal]) {
    println!(
        "{:<8} {:<7} {:<8} {:<5} {}",
        "ID", "MONTH", "PROGRESS", "STEPS", "TITLE"
    );
    for goal in goals {
        println!(
            "{:<8} {:<7} {:<8} {:<5} {}",
            short_id(&goal.id),
            format!("{}-{:02}", goal.year, goal.month),
            format!("{}%", goal.progress),
            format!("{}/{}", goal.completed_steps(), goal.roadmap.len()),
            goal.title
        );
    }
}

fn print_note_list(notes: &[Note]) {
    println!(
        "{:<8} {:<3} {:<16} {:<30} {}",
        "ID", "PIN", "UPDATED", "TITLE", "TAGS"
    );
    for note in notes {
        println!(
            "{:<8} {:<3} {:<16} {:<30} {}",
            short_id(&note.id),
            if note.pinned { "*" } else { "" },
            format_datetime(note.updated_at),
            note.title,
            note.tags.join(", ")
        );
    }
}

fn print_api_settings(settings: &ApiSettings) {
    println!("API provider: {}", settings.provider);
    let default_model = Provider::from_name(&settings.provider)
        .map(|provider| provider.default_model())
        .unwrap_or("unknown");
    match settings.model.as_deref() {
        Some(model) => println!("Model: {model}"),
        None => println!("Model: {default_model} (default)"),
    }
    println!("API key: {}", settings.masked_key());
    if let Some(base_url) = settings.base_url.as_deref() {
        println!("Base URL: {base_url}");
    }
}

fn print_notification_settings(settings: &NotificationSettings) {
    println!(
        "Notifications: {}",
        if settings.enabled { "enabled" } else { "disabled" }
    );
    println!("Frequency: {}", settings.frequency.as_str());
    println!(
        "Quiet hours: {}-{}",
        settings.quiet_hours.start, settings.quiet_hours.end
    );
    let types = &settings.types;
    let enabled: Vec<&str> = [
        ("daily-tasks", types.daily_tasks),
        ("goal-reminders", types.goal_reminders),
        ("motivational", types.motivational),
        ("progress", types.progress),
        ("streaks", types.streaks),
    ]
    .into_iter()
    .filter(|(_, on)| *on)
    .map(|(name, _)| name)
    .collect();
    println!(
        "Types: {}",
        if enabled.is_empty() {
            "(none)".to_string()
        } else {
            enabled.join(", ")
        }
    );
}

fn print_reminders(reminders: &[Reminder]) {
    for reminder in reminders {
        println!(
            "{} {:<6} {:<12} {}: {}",
            reminder.at.format("%H:%M"),
            reminder.priority.as_str(),
            reminder.kind.as_str(),
            reminder.title,
            reminder.body
        );
    }
}
