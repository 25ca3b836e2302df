use std::path::PathBuf;

use chrono::{DateTime, Local};

use crate::application::{DiffReport, EventLog, EventPublisher, Notifier, PageReader};
use crate::domain::{EventKind, SlotEvent, SlotSet};

/// Records a diff in the event log and alerts on fresh slots.
pub struct HandleDiffUseCase<'a> {
    pub events: &'a dyn EventLog,
    pub publisher: Option<&'a dyn EventPublisher>,
    pub alerts: &'a dyn Notifier,
    /// Used to attach a screenshot to alerts when the reader supports it.
    pub reader: &'a dyn PageReader,
    pub scratch_dir: PathBuf,
}

impl<'a> HandleDiffUseCase<'a> {
    /// Returns how many slots were alerted on.
    pub async fn execute(&self, report: &DiffReport, now: DateTime<Local>) -> usize {
        let events = to_events(report, now);
        if !events.is_empty() {
            if let Err(e) = self.events.append(&events).await {
                tracing::error!(error = %e, "failed to append to event log");
            }
            if let Some(publisher) = self.publisher {
                for ev in &events {
                    if let Err(e) = publisher.publish(ev).await {
                        tracing::debug!(error = %e, "event publish failed");
                    }
                }
            }
        }

        if report.baseline {
            tracing::info!(count = report.added.len(), "session start, baseline recorded");
            return 0;
        }

        for r in &report.removed {
            tracing::info!(slot = %r, "slot closed");
        }

        if report.fresh.is_empty() {
            if !report.notable.is_empty() {
                tracing::debug!(slots = %report.notable, "already alerted, suppressing");
            }
            return 0;
        }

        tracing::info!(slots = %report.fresh, "new slots found");
        self.alert(&report.fresh).await;
        report.fresh.len()
    }

    async fn alert(&self, fresh: &SlotSet) {
        let text = alert_text(fresh);
        let shot = self.scratch_dir.join("alert_screenshot.png");

        let sent = match self.reader.take_screenshot(&shot).await {
            Some(path) => {
                let r = self.alerts.send_photo(&text, &path).await;
                let _ = tokio::fs::remove_file(&path).await;
                r
            }
            None => self.alerts.send_text(&text).await,
        };
        if let Err(e) = sent {
            tracing::warn!(error = %e, "alert delivery incomplete");
        }
    }
}

pub fn alert_text(fresh: &SlotSet) -> String {
    let mut lines = vec!["🟢 <b>NEW SLOTS:</b>".to_string()];
    lines.extend(fresh.iter().map(|s| format!("• {s}")));
    lines.join("\n")
}

fn to_events(report: &DiffReport, now: DateTime<Local>) -> Vec<SlotEvent> {
    if report.baseline {
        return report
            .added
            .iter()
            .map(|s| SlotEvent::new(EventKind::SessionStart, s.clone(), now))
            .collect();
    }
    report
        .added
        .iter()
        .map(|s| SlotEvent::new(EventKind::Added, s.clone(), now))
        .chain(
            report
                .removed
                .iter()
                .map(|s| SlotEvent::new(EventKind::Removed, s.clone(), now)),
        )
        .collect()
}
