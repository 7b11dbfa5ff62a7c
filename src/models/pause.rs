use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One pause inside a work session. `pause_end` is absent while the pause is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseInterval {
    pub pause_start: DateTime<Utc>,
    pub pause_end: Option<DateTime<Utc>>,
}

impl PauseInterval {
    pub fn open(pause_start: DateTime<Utc>) -> Self {
        Self {
            pause_start,
            pause_end: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.pause_end.is_none()
    }

    /// Paused time up to `until` (or up to `pause_end` when closed), never negative.
    pub fn duration_until(&self, until: DateTime<Utc>) -> Duration {
        let end = self.pause_end.unwrap_or(until).min(until);
        (end - self.pause_start).max(Duration::zero())
    }
}
