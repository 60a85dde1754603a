//! Daily reminder planning plus a cancellable timer list that delivers them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDateTime, NaiveTime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::settings::{NotificationFrequency, NotificationSettings};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReminderKind {
    Motivational,
    DailyTasks,
    Progress,
}

impl ReminderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Motivational => "motivational",
            Self::DailyTasks => "daily-tasks",
            Self::Progress => "progress",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReminderPriority {
    Normal,
    High,
}

impl ReminderPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Reminder {
    pub at: NaiveDateTime,
    pub kind: ReminderKind,
    pub title: &'static str,
    pub body: &'static str,
    pub priority: ReminderPriority,
}

struct Slot {
    hour: u32,
    minute: u32,
    kind: ReminderKind,
    title: &'static str,
    body: &'static str,
    priority: ReminderPriority,
    enabled: fn(&NotificationSettings) -> bool,
}

fn motivational_on(settings: &NotificationSettings) -> bool {
    settings.types.motivational
}

fn daily_tasks_on(settings: &NotificationSettings) -> bool {
    settings.types.daily_tasks
}

fn progress_on(settings: &NotificationSettings) -> bool {
    settings.types.progress
}

fn midday_on(settings: &NotificationSettings) -> bool {
    settings.frequency != NotificationFrequency::Low && settings.types.progress
}

fn afternoon_on(settings: &NotificationSettings) -> bool {
    settings.frequency == NotificationFrequency::High && settings.types.motivational
}

const SLOTS: [Slot; 5] = [
    Slot {
        hour: 8,
        minute: 30,
        kind: ReminderKind::Motivational,
        title: "Good Morning!",
        body: "Ready to tackle your goals today? Check your daily tasks!",
        priority: ReminderPriority::Normal,
        enabled: motivational_on,
    },
    Slot {
        hour: 9,
        minute: 0,
        kind: ReminderKind::DailyTasks,
        title: "Daily Tasks Ready",
        body: "Your personalized tasks are waiting. Start with the first one!",
        priority: ReminderPriority::High,
        enabled: daily_tasks_on,
    },
    Slot {
        hour: 13,
        minute: 0,
        kind: ReminderKind::Progress,
        title: "Midday Check-in",
        body: "How's your progress? Take a moment to review your tasks.",
        priority: ReminderPriority::Normal,
        enabled: midday_on,
    },
    Slot {
        hour: 15,
        minute: 30,
        kind: ReminderKind::Motivational,
        title: "Afternoon Boost",
        body: "You're doing great! Keep the momentum going.",
        priority: ReminderPriority::Normal,
        enabled: afternoon_on,
    },
    Slot {
        hour: 18,
        minute: 0,
        kind: ReminderKind::Progress,
        title: "Daily Review",
        body: "Time to review your progress and plan for tomorrow!",
        priority: ReminderPriority::Normal,
        enabled: progress_on,
    },
];

/// `true` when `time` falls inside `[start, end)`. A window whose start is
/// after its end wraps past midnight. Equal bounds mean no quiet window.
pub fn in_quiet_hours(time: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
    if start < end {
        time >= start && time < end
    } else if start > end {
        time >= start || time < end
    } else {
        false
    }
}

/// Today's remaining reminders, in time order.
pub fn plan_reminders(settings: &NotificationSettings, now: NaiveDateTime) -> Vec<Reminder> {
    if !settings.enabled {
        return Vec::new();
    }
    let quiet = settings.quiet_hours.bounds();
    if quiet.is_none() {
        warn!(
            start = %settings.quiet_hours.start,
            end = %settings.quiet_hours.end,
            "ignoring unparseable quiet hours"
        );
    }

    SLOTS
        .iter()
        .filter(|slot| (slot.enabled)(settings))
        .filter_map(|slot| {
            let time = NaiveTime::from_hms_opt(slot.hour, slot.minute, 0)?;
            Some((slot, now.date().and_time(time)))
        })
        .filter(|(_, at)| *at > now)
        .filter(|(_, at)| match quiet {
            Some((start, end)) => !in_quiet_hours(at.time(), start, end),
            None => true,
        })
        .map(|(slot, at)| Reminder {
            at,
            kind: slot.kind,
            title: slot.title,
            body: slot.body,
            priority: slot.priority,
        })
        .collect()
}

#[async_trait]
pub trait ReminderSink: Send + Sync + 'static {
    async fn deliver(&self, reminder: &Reminder);
}

/// Pending reminder timers sharing one cancellation token.
pub struct ReminderScheduler {
    token: CancellationToken,
    handles: Vec<JoinHandle<bool>>,
}

impl ReminderScheduler {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    pub fn schedule(
        &mut self,
        reminders: Vec<Reminder>,
        now: NaiveDateTime,
        sink: Arc<dyn ReminderSink>,
    ) {
        for reminder in reminders {
            let delay = (reminder.at - now).to_std().unwrap_or(Duration::ZERO);
            let token = self.token.clone();
            let sink = Arc::clone(&sink);
            debug!(title = reminder.title, delay_secs = delay.as_secs(), "scheduling reminder");
            self.handles.push(tokio::spawn(async move {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => false,
                    _ = tokio::time::sleep(delay) => {
                        sink.deliver(&reminder).await;
                        true
                    }
                }
            }));
        }
    }

    pub fn pending(&self) -> usize {
        self.handles
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Cancels every pending timer. The scheduler stays usable afterwards.
    pub fn cancel_all(&mut self) {
        self.token.cancel();
        self.token = CancellationToken::new();
        self.handles.clear();
    }

    /// Waits for every scheduled timer and returns how many delivered.
    pub async fn join(&mut self) -> usize {
        let mut delivered = 0;
        for handle in self.handles.drain(..) {
            match handle.await {
                Ok(true) => delivered += 1,
                Ok(false) => {}
                Err(err) => warn!(error = %err, "reminder task failed"),
            }
        }
        delivered
    }
}

impl Default for ReminderScheduler {
    fn default() -> Self {
        Self::new()
    }
}
