use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::SlotSet;

/// Last known set of visible slots.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Local>,
    #[serde(rename = "especialidades")]
    pub slots: SlotSet,
}

impl Snapshot {
    pub fn new(slots: SlotSet, timestamp: DateTime<Local>) -> Self {
        Self { timestamp, slots }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeartbeatStatus {
    Running,
    Error,
}

/// Liveness record rewritten every cycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub last_run: DateTime<Local>,
    pub status: HeartbeatStatus,
}

impl Heartbeat {
    pub fn new(status: HeartbeatStatus, last_run: DateTime<Local>) -> Self {
        Self { last_run, status }
    }

    /// True when no cycle has completed within `max_age`.
    pub fn is_stale(&self, now: DateTime<Local>, max_age: chrono::Duration) -> bool {
        now.signed_duration_since(self.last_run) > max_age
    }
}
