use std::collections::VecDeque;

use chrono::{DateTime, Local};

use crate::application::{DiffEngine, DiffReport};
use crate::domain::{InterestPolicy, SlotSet};

/// Entries kept for `/status`.
pub const RECENT_CHANGES: usize = 5;

/// Everything the monitor remembers for the life of the process.
#[derive(Debug)]
pub struct MonitorState {
    pub engine: DiffEngine,
    pub policy: InterestPolicy,
    /// Slots seen by the last successful read.
    pub current: SlotSet,
    pub paused: bool,
    pub started_at: DateTime<Local>,
    pub alerts_sent: usize,
    /// Latest additions and removals, newest first.
    pub recent: VecDeque<String>,
}

impl MonitorState {
    pub fn new(policy: InterestPolicy, started_at: DateTime<Local>) -> Self {
        Self {
            engine: DiffEngine::new(),
            policy,
            current: SlotSet::new(),
            paused: false,
            started_at,
            alerts_sent: 0,
            recent: VecDeque::with_capacity(RECENT_CHANGES),
        }
    }

    /// Uptime as `H:MM:SS`.
    pub fn uptime(&self, now: DateTime<Local>) -> String {
        let secs = now.signed_duration_since(self.started_at).num_seconds().max(0);
        format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
    }

    /// Record every addition and removal of `report`. A baseline is not a change.
    pub fn remember_changes(&mut self, report: &DiffReport, at: DateTime<Local>) {
        if report.baseline {
            return;
        }
        let stamp = at.format("%d/%m %H:%M");
        for slot in report.added.iter() {
            self.push_recent(format!("🟢 {stamp}: {slot}"));
        }
        for slot in report.removed.iter() {
            self.push_recent(format!("🔴 {stamp}: {slot}"));
        }
    }

    fn push_recent(&mut self, line: String) {
        self.recent.push_front(line);
        self.recent.truncate(RECENT_CHANGES);
    }
}
