use crate::model::RoadmapStep;

/// Network-independent roadmap used whenever generation fails.
pub fn fallback_roadmap(goal_title: &str) -> Vec<RoadmapStep> {
    let steps = [
        (
            "Define success criteria",
            format!(
                "Clarify what success looks like for '{goal_title}'. Include measurable outcomes and a target timeline."
            ),
        ),
        (
            "Break down into tasks",
            "Split the goal into smaller, time-bound tasks that build on each other.".to_string(),
        ),
        (
            "Start and iterate",
            "Begin with the first task, review progress weekly, and adjust the plan as needed."
                .to_string(),
        ),
    ];
    steps
        .into_iter()
        .enumerate()
        .map(|(idx, (title, description))| {
            let mut step = RoadmapStep::new(title, description);
            step.order = Some((idx + 1) as u32);
            step
        })
        .collect()
}
