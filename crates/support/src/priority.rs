use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn response_within(self) -> Duration {
        match self {
            Priority::Urgent => Duration::hours(2),
            Priority::High => Duration::hours(8),
            Priority::Medium => Duration::hours(24),
            Priority::Low => Duration::hours(48),
        }
    }

    pub fn resolution_within(self) -> Duration {
        match self {
            Priority::Urgent => Duration::days(1),
            Priority::High => Duration::days(3),
            Priority::Medium => Duration::days(7),
            Priority::Low => Duration::days(14),
        }
    }
}

/// Deadlines derived from a complaint's priority at the time it was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLevel {
    pub response_due_at: DateTime<Utc>,
    pub resolution_due_at: DateTime<Utc>,
}

impl ServiceLevel {
    pub fn for_priority(priority: Priority, opened_at: DateTime<Utc>) -> Self {
        Self {
            response_due_at: opened_at + priority.response_within(),
            resolution_due_at: opened_at + priority.resolution_within(),
        }
    }
}
