//! Provider calls and the tolerant parsing around them.
//!
//! Roadmap generation always yields steps, falling back to a fixed plan when
//! any stage fails. Daily tasks, goal chat and note assistance surface their
//! errors to the caller instead.

mod assist;
mod error;
mod extract;
mod fallback;
mod normalize;
mod provider;
mod roadmap;
mod tasks;

pub use assist::{goal_chat_reply, note_insights, summarize_note};
pub use error::AiError;
pub use extract::{extract_json, JsonShape};
pub use fallback::fallback_roadmap;
pub use normalize::normalize_steps;
pub use provider::{CompletionClient, CompletionRequest, ProviderClient};
pub use roadmap::{generate_roadmap, RoadmapSource};
pub use tasks::generate_daily_tasks;
