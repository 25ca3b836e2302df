use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Added,
    Removed,
    /// Slot visible when the monitor took its baseline.
    SessionStart,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Added => "added",
            EventKind::Removed => "removed",
            EventKind::SessionStart => "session_start",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "added" => Ok(EventKind::Added),
            "removed" => Ok(EventKind::Removed),
            "session_start" => Ok(EventKind::SessionStart),
            other => Err(format!("unknown event kind: {other}")),
        }
    }
}

/// One row of the append-only event log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotEvent {
    pub timestamp: DateTime<Local>,
    pub kind: EventKind,
    pub slot: String,
}

impl SlotEvent {
    pub fn new(kind: EventKind, slot: impl Into<String>, timestamp: DateTime<Local>) -> Self {
        Self {
            timestamp,
            kind,
            slot: slot.into(),
        }
    }
}
