use tracing::{info, warn};

use super::{extract_json, fallback_roadmap, normalize_steps, AiError, JsonShape};
use super::{CompletionClient, CompletionRequest};
use crate::model::RoadmapStep;

const ROADMAP_MAX_TOKENS: u32 = 2500;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RoadmapSource {
    Ai,
    Fallback,
}

impl RoadmapSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ai => "ai",
            Self::Fallback => "fallback",
        }
    }
}

#[derive(Clone, Debug)]
pub struct RoadmapOutcome {
    pub steps: Vec<RoadmapStep>,
    pub source: RoadmapSource,
}

pub fn roadmap_prompt(goal_title: &str, goal_description: &str) -> String {
    format!(
        r#"Create a detailed roadmap for achieving this goal:

Title: {goal_title}
Description: {goal_description}

Generate 6-8 specific, actionable steps that will lead to achieving this goal. Each step should be:
- Specific and actionable
- Measurable when possible
- Realistic and achievable
- Include detailed implementation guidance

For each step, provide:
1. A clear, actionable step title
2. A detailed description (3-4 sentences) explaining exactly how to implement this step

Respond in JSON format:
{{
  "roadmap": [
    {{
      "step": "Step title",
      "description": "Detailed 3-4 sentence description with specific implementation guidance"
    }}
  ]
}}"#
    )
}

async fn request_steps<C: CompletionClient + ?Sized>(
    client: &C,
    goal_title: &str,
    goal_description: &str,
) -> Result<Vec<RoadmapStep>, AiError> {
    let request = CompletionRequest::new(roadmap_prompt(goal_title, goal_description))
        .with_max_tokens(ROADMAP_MAX_TOKENS);
    let reply = client.complete(&request).await?;
    parse_steps(&reply)
}

/// The prompt asks for `{"roadmap": [...]}`; a bare array is accepted too.
fn parse_steps(reply: &str) -> Result<Vec<RoadmapStep>, AiError> {
    let wrapped = extract_json(reply, JsonShape::Object).and_then(|value| normalize_steps(&value));
    match wrapped {
        Ok(steps) => Ok(steps),
        Err(err) => extract_json(reply, JsonShape::Array)
            .and_then(|value| normalize_steps(&value))
            .map_err(|_| err),
    }
}

/// Never fails: any error along the way yields the fixed fallback roadmap.
pub async fn generate_roadmap<C: CompletionClient + ?Sized>(
    client: &C,
    goal_title: &str,
    goal_description: &str,
) -> RoadmapOutcome {
    match request_steps(client, goal_title, goal_description).await {
        Ok(steps) => {
            info!(steps = steps.len(), "generated roadmap");
            RoadmapOutcome {
                steps,
                source: RoadmapSource::Ai,
            }
        }
        Err(err) => {
            warn!(error = %err, "roadmap generation failed, using fallback");
            RoadmapOutcome {
                steps: fallback_roadmap(goal_title),
                source: RoadmapSource::Fallback,
            }
        }
    }
}
