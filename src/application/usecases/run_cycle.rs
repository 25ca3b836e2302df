use chrono::Local;

use crate::application::usecases::HandleDiffUseCase;
use crate::application::{
    AppError, AppResult, DiffReport, MonitorState, PageReader, ReadError, SnapshotStore,
};
use crate::domain::{Heartbeat, HeartbeatStatus, SlotSet, Snapshot};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Read failed transiently; nothing was compared or persisted.
    Skipped(String),
    Compared(DiffReport),
}

/// One pass: read, diff, notify, persist.
pub struct RunCycleUseCase<'a> {
    pub reader: &'a dyn PageReader,
    pub snapshots: &'a dyn SnapshotStore,
    pub handle_diff: HandleDiffUseCase<'a>,
}

impl<'a> RunCycleUseCase<'a> {
    /// `Err(AppError::Session)` means the caller must re-authenticate.
    pub async fn execute(&self, state: &mut MonitorState) -> AppResult<CycleOutcome> {
        let current = match self.reader.read_current_options().await {
            Ok(slots) => slots,
            Err(ReadError::Transient(reason)) => {
                tracing::warn!(%reason, "page not readable, skipping cycle");
                self.heartbeat(HeartbeatStatus::Error).await;
                return Ok(CycleOutcome::Skipped(reason));
            }
            Err(ReadError::SessionInvalid) => {
                self.heartbeat(HeartbeatStatus::Error).await;
                return Err(AppError::Session);
            }
        };
        self.heartbeat(HeartbeatStatus::Running).await;

        let previous = match self.snapshots.load_snapshot().await {
            Ok(Some(s)) => s.slots,
            Ok(None) => SlotSet::new(),
            Err(e) => {
                tracing::warn!(error = %e, "could not load snapshot, starting fresh");
                SlotSet::new()
            }
        };

        let now = Local::now();
        let report = state.engine.process(&current, &previous, &state.policy);
        state.remember_changes(&report, now);
        state.alerts_sent += self.handle_diff.execute(&report, now).await;

        if let Err(e) = self
            .snapshots
            .save_snapshot(&Snapshot::new(current.clone(), now))
            .await
        {
            tracing::error!(error = %e, "failed to save snapshot");
        }

        tracing::info!(
            visible = current.len(),
            added = report.added.len(),
            removed = report.removed.len(),
            "check finished"
        );
        state.current = current;
        Ok(CycleOutcome::Compared(report))
    }

    async fn heartbeat(&self, status: HeartbeatStatus) {
        if let Err(e) = self
            .snapshots
            .save_heartbeat(&Heartbeat::new(status, Local::now()))
            .await
        {
            tracing::warn!(error = %e, "failed to write heartbeat");
        }
    }
}
