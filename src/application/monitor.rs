use std::future::Future;
use std::time::Duration;

use chrono::Local;
use tokio::time::Instant;

use crate::application::usecases::RunCycleUseCase;
use crate::application::{
    AppError, AppResult, CommandDispatcher, CommandSource, IntervalScheduler, MonitorState,
    Notifier, SessionManager, notify_best_effort,
};

/// Consecutive "session invalid" reads tolerated right after a fresh login.
const MAX_SESSION_RETRIES: u32 = 3;

/// The long-running watch loop.
pub struct Monitor<'a> {
    pub cycle: RunCycleUseCase<'a>,
    pub session: SessionManager<'a>,
    pub commands: &'a dyn CommandSource,
    pub dispatcher: CommandDispatcher<'a>,
    pub scheduler: IntervalScheduler,
    pub chat: &'a dyn Notifier,
    /// Granularity of the command-polling sleep.
    pub tick: Duration,
    /// Period of the "still alive" chat ping, `None` for never.
    pub alive_every: Option<Duration>,
}

impl<'a> Monitor<'a> {
    /// Runs until `shutdown` resolves (clean exit) or a fatal error occurs.
    pub async fn run<F>(&self, state: &mut MonitorState, shutdown: F) -> AppResult<()>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(mode = %state.policy.mode_label(), "monitor starting");
        notify_best_effort(self.chat, "🚀 Monitor started").await;

        let outcome = tokio::select! {
            r = self.run_loop(state) => Some(r),
            _ = shutdown => None,
        };

        match outcome {
            None => {
                tracing::info!("interrupted by operator");
                let msg = format!(
                    "🛑 Stopped manually.\nUptime: {}\nAlerts sent: {}",
                    state.uptime(Local::now()),
                    state.alerts_sent
                );
                notify_best_effort(self.chat, &msg).await;
                Ok(())
            }
            Some(Err(e)) => {
                tracing::error!(error = %e, "fatal error in monitor");
                // operator channels include the alarm
                let msg = format!("🔴 FATAL ERROR:\n<pre>{e}</pre>");
                notify_best_effort(self.session.operator, &msg).await;
                Err(e)
            }
            Some(Ok(())) => Ok(()),
        }
    }

    async fn run_loop(&self, state: &mut MonitorState) -> AppResult<()> {
        self.session.ensure_authenticated().await?;
        let mut session_retries = 0;
        let mut last_alive = Instant::now();

        loop {
            if !state.paused {
                match self.cycle.execute(state).await {
                    Ok(_) => session_retries = 0,
                    Err(AppError::Session) => {
                        session_retries += 1;
                        if session_retries > MAX_SESSION_RETRIES {
                            return Err(AppError::Auth(
                                "session keeps getting invalidated".into(),
                            ));
                        }
                        tracing::warn!(attempt = session_retries, "session invalidated, re-authenticating");
                        self.session.ensure_authenticated().await?;
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            }

            if self.alive_every.is_some_and(|every| last_alive.elapsed() >= every) {
                let msg = format!("💓 Alive. Visible slots: {}", state.current.len());
                notify_best_effort(self.chat, &msg).await;
                last_alive = Instant::now();
            }

            let wait = self.scheduler.next_wait(&Local::now(), state.paused);
            if !state.paused {
                tracing::info!(wait_secs = wait.as_secs(), "sleeping until next check");
            }
            self.sleep_polling(wait, state).await;
        }
    }

    /// Sleep in ticks, draining commands on each one. Returns early when the
    /// pause flag flips.
    async fn sleep_polling(&self, wait: Duration, state: &mut MonitorState) {
        let was_paused = state.paused;
        let deadline = Instant::now() + wait;

        loop {
            self.drain_commands(state).await;
            if state.paused != was_paused {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            tokio::time::sleep(self.tick.min(deadline - now)).await;
        }
    }

    async fn drain_commands(&self, state: &mut MonitorState) {
        match self.commands.poll().await {
            Ok(raw) if raw.is_empty() => {}
            Ok(raw) => self.dispatcher.dispatch_all(&raw, state).await,
            Err(e) => tracing::debug!(error = %e, "command poll failed"),
        }
    }
}
