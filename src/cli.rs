use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::settings::{NotificationFrequency, Provider};

#[derive(Parser, Debug)]
#[command(
    name = "goalpilot",
    version,
    about = "Track monthly goals with AI-generated roadmaps and daily tasks"
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Data directory (defaults to $GOALPILOT_HOME or ~/.goalpilot)"
    )]
    pub home: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(subcommand)]
    Goal(GoalCommand),
    #[command(subcommand)]
    Step(StepCommand),
    #[command(subcommand)]
    Task(TaskCommand),
    #[command(subcommand)]
    Note(NoteCommand),
    #[command(subcommand)]
    Settings(SettingsCommand),
    #[command(subcommand)]
    Remind(RemindCommand),
}

#[derive(Subcommand, Debug)]
pub enum GoalCommand {
    Add(GoalAdd),
    List(GoalList),
    Show(GoalShow),
    Update(GoalUpdate),
    Remove(GoalRemove),
    #[command(about = "Regenerate the roadmap (resets progress)")]
    Roadmap(GoalRoadmap),
    Chat(GoalChat),
}

#[derive(Subcommand, Debug)]
pub enum StepCommand {
    Add(StepAdd),
    Update(StepUpdate),
    Toggle(StepToggle),
    Move(StepMove),
    Remove(StepRemove),
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    Generate(TaskGenerate),
    List(TaskList),
    Toggle(TaskToggle),
    Remove(TaskRemove),
}

#[derive(Subcommand, Debug)]
pub enum NoteCommand {
    Add(NoteAdd),
    List(NoteList),
    Show(NoteShow),
    Update(NoteUpdate),
    Pin(NotePin),
    Remove(NoteRemove),
    Summarize(NoteSummarize),
    Insights(NoteInsights),
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    Show(SettingsShow),
    #[command(name = "set-api")]
    SetApi(SettingsSetApi),
    #[command(name = "clear-api")]
    ClearApi(SettingsClearApi),
    #[command(name = "set-notify")]
    SetNotify(SettingsSetNotify),
}

#[derive(Subcommand, Debug)]
pub enum RemindCommand {
    Plan(RemindPlan),
    #[command(about = "Deliver today's remaining reminders, then exit")]
    Run(RemindRun),
}

#[derive(Args, Debug)]
pub struct GoalAdd {
    pub title: String,
    #[arg(long, default_value = "")]
    pub description: String,
    #[arg(long, help = "Month 1-12 (defaults to the current month)")]
    pub month: Option<u32>,
    #[arg(long)]
    pub year: Option<i32>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub priority: Option<String>,
    #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_date)]
    pub target: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub struct GoalList {
    #[arg(long)]
    pub month: Option<u32>,
    #[arg(long)]
    pub year: Option<i32>,
}

#[derive(Args, Debug)]
pub struct GoalShow {
    pub id: String,
}

#[derive(Args, Debug)]
pub struct GoalUpdate {
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub month: Option<u32>,
    #[arg(long)]
    pub year: Option<i32>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub priority: Option<String>,
    #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_date)]
    pub target: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub struct GoalRemove {
    pub id: String,
}

#[derive(Args, Debug)]
pub struct GoalRoadmap {
    pub id: String,
}

#[derive(Args, Debug)]
pub struct GoalChat {
    pub id: String,
    #[arg(value_name = "MESSAGE", num_args = 1..)]
    pub message: Vec<String>,
}

#[derive(Args, Debug)]
pub struct StepAdd {
    pub goal_id: String,
    pub title: String,
    #[arg(long, default_value = "")]
    pub description: String,
    #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_date)]
    pub due: Option<NaiveDate>,
    #[arg(long)]
    pub at: Option<usize>,
}

#[derive(Args, Debug)]
pub struct StepUpdate {
    pub goal_id: String,
    #[arg(help = "1-based position or step id prefix")]
    pub step: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
    #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_date)]
    pub due: Option<NaiveDate>,
    #[arg(long, value_name = "BOOL")]
    pub completed: Option<bool>,
}

#[derive(Args, Debug)]
pub struct StepToggle {
    pub goal_id: String,
    pub step: String,
}

#[derive(Args, Debug)]
pub struct StepMove {
    pub goal_id: String,
    pub step: String,
    #[arg(long)]
    pub to: usize,
}

#[derive(Args, Debug)]
pub struct StepRemove {
    pub goal_id: String,
    #[arg(value_name = "STEP", num_args = 1..)]
    pub steps: Vec<String>,
}

#[derive(Args, Debug)]
pub struct TaskGenerate {}

#[derive(Args, Debug)]
pub struct TaskList {
    #[arg(long, help = "Include tasks from previous days")]
    pub all: bool,
}

#[derive(Args, Debug)]
pub struct TaskToggle {
    pub id: String,
}

#[derive(Args, Debug)]
pub struct TaskRemove {
    pub id: String,
}

#[derive(Args, Debug)]
pub struct NoteAdd {
    pub title: String,
    #[arg(long, default_value = "")]
    pub content: String,
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,
    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Args, Debug)]
pub struct NoteList {
    #[arg(long)]
    pub tag: Option<String>,
    #[arg(long)]
    pub search: Option<String>,
}

#[derive(Args, Debug)]
pub struct NoteShow {
    pub id: String,
}

#[derive(Args, Debug)]
pub struct NoteUpdate {
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub content: Option<String>,
    #[arg(long = "tag", value_name = "TAG", help = "Replace tags (repeatable)")]
    pub tags: Vec<String>,
    #[arg(long, conflicts_with = "tags")]
    pub clear_tags: bool,
    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Args, Debug)]
pub struct NotePin {
    pub id: String,
}

#[derive(Args, Debug)]
pub struct NoteRemove {
    pub id: String,
}

#[derive(Args, Debug)]
pub struct NoteSummarize {
    pub id: String,
}

#[derive(Args, Debug)]
pub struct NoteInsights {
    pub id: String,
}

#[derive(Args, Debug)]
pub struct SettingsShow {}

#[derive(Args, Debug)]
pub struct SettingsSetApi {
    #[arg(long, value_enum)]
    pub provider: ProviderArg,
    #[arg(long)]
    pub api_key: String,
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,
}

#[derive(Args, Debug)]
pub struct SettingsClearApi {}

#[derive(Args, Debug)]
pub struct SettingsSetNotify {
    #[arg(long, conflicts_with = "disable")]
    pub enable: bool,
    #[arg(long)]
    pub disable: bool,
    #[arg(long, value_enum)]
    pub frequency: Option<FrequencyArg>,
    #[arg(long, value_name = "HH:MM")]
    pub quiet_start: Option<String>,
    #[arg(long, value_name = "HH:MM")]
    pub quiet_end: Option<String>,
    #[arg(long, value_name = "BOOL")]
    pub daily_tasks: Option<bool>,
    #[arg(long, value_name = "BOOL")]
    pub goal_reminders: Option<bool>,
    #[arg(long, value_name = "BOOL")]
    pub motivational: Option<bool>,
    #[arg(long, value_name = "BOOL")]
    pub progress: Option<bool>,
    #[arg(long, value_name = "BOOL")]
    pub streaks: Option<bool>,
}

#[derive(Args, Debug)]
pub struct RemindPlan {
    #[arg(long, value_name = "HH:MM", help = "Plan as if it were this time today")]
    pub at: Option<String>,
}

#[derive(Args, Debug)]
pub struct RemindRun {}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ProviderArg {
    Openai,
    Gemini,
    Anthropic,
}

impl From<ProviderArg> for Provider {
    fn from(value: ProviderArg) -> Self {
        match value {
            ProviderArg::Openai => Provider::OpenAi,
            ProviderArg::Gemini => Provider::Gemini,
            ProviderArg::Anthropic => Provider::Anthropic,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum FrequencyArg {
    Low,
    Medium,
    High,
}

impl From<FrequencyArg> for NotificationFrequency {
    fn from(value: FrequencyArg) -> Self {
        match value {
            FrequencyArg::Low => NotificationFrequency::Low,
            FrequencyArg::Medium => NotificationFrequency::Medium,
            FrequencyArg::High => NotificationFrequency::High,
        }
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|err| format!("expected YYYY-MM-DD: {err}"))
}
