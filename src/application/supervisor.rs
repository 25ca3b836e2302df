//! Guardian: keeps the monitor process alive.
//!
//! The monitor runs as a child process. Every exit counts as a crash; the
//! guardian restarts it after an exponentially growing pause and gives up
//! for good once too many crashes land inside a short window.

use std::collections::VecDeque;
use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::application::{AppResult, Notifier, notify_best_effort};

/// Trailing window of crash instants.
#[derive(Clone, Debug)]
pub struct CrashWindow {
    window: Duration,
    max_crashes: usize,
    crashes: VecDeque<Instant>,
}

impl CrashWindow {
    pub fn new(window: Duration, max_crashes: usize) -> Self {
        Self {
            window,
            max_crashes,
            crashes: VecDeque::new(),
        }
    }

    /// Record a crash at `now`; returns true once the breaker trips.
    pub fn record(&mut self, now: Instant) -> bool {
        self.crashes.push_back(now);
        self.prune(now);
        self.crashes.len() >= self.max_crashes
    }

    pub fn len(&self) -> usize {
        self.crashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crashes.is_empty()
    }

    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.crashes.front() {
            if now.saturating_duration_since(*oldest) > self.window {
                self.crashes.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Doubling restart delay with a ceiling. Never resets.
#[derive(Clone, Debug)]
pub struct Backoff {
    current: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            current: initial.min(max),
            max,
        }
    }

    /// The delay to wait now; advances the sequence.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }
}

#[derive(Clone, Debug)]
pub struct GuardianConfig {
    pub max_crashes: usize,
    pub crash_window: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            max_crashes: 5,
            crash_window: Duration::from_secs(60),
            initial_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(300),
        }
    }
}

/// A running monitor process.
#[async_trait]
pub trait SupervisedChild: Send {
    /// Resolves when the child exits; yields its exit code if it had one.
    async fn wait(&mut self) -> AppResult<Option<i32>>;

    /// Stop the child and reap it.
    async fn terminate(&mut self) -> AppResult<()>;
}

#[async_trait]
pub trait ChildLauncher: Send + Sync {
    async fn launch(&self) -> AppResult<Box<dyn SupervisedChild>>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardianExit {
    /// Crash-loop breaker tripped.
    Tripped { crashes: usize },
    /// Operator shut the guardian down.
    Interrupted,
}

pub struct Guardian<'a> {
    pub launcher: &'a dyn ChildLauncher,
    pub notifier: &'a dyn Notifier,
    pub config: GuardianConfig,
}

impl<'a> Guardian<'a> {
    pub async fn run<F>(&self, shutdown: F) -> GuardianExit
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        tracing::info!(
            max_crashes = self.config.max_crashes,
            window_secs = self.config.crash_window.as_secs(),
            "guardian started"
        );
        notify_best_effort(self.notifier, "🟢 Guardian started.").await;

        let mut window = CrashWindow::new(self.config.crash_window, self.config.max_crashes);
        let mut backoff = Backoff::new(self.config.initial_backoff, self.config.max_backoff);

        loop {
            let mut child = match self.launcher.launch().await {
                Ok(c) => Some(c),
                Err(e) => {
                    tracing::error!(error = %e, "failed to launch monitor");
                    None
                }
            };

            let exit = match child.as_mut() {
                Some(c) => tokio::select! {
                    r = c.wait() => Some(r),
                    _ = &mut shutdown => None,
                },
                None => Some(Err(crate::application::AppError::Child("spawn failed".into()))),
            };

            let Some(exit) = exit else {
                return self.shutdown_child(child).await;
            };

            match exit {
                Ok(code) => tracing::warn!(?code, "monitor exited"),
                Err(e) => tracing::warn!(error = %e, "monitor wait failed"),
            }

            let now = tokio::time::Instant::now().into_std();
            if window.record(now) {
                tracing::error!(crashes = window.len(), "crash loop detected, giving up");
                notify_best_effort(
                    self.notifier,
                    "🚨 CRITICAL 🚨\nCrash loop detected. Monitor stopped.",
                )
                .await;
                return GuardianExit::Tripped {
                    crashes: window.len(),
                };
            }

            let delay = backoff.next_delay();
            tracing::info!(delay_secs = delay.as_secs(), "restarting monitor after backoff");
            notify_best_effort(
                self.notifier,
                &format!("🔴 Monitor went down. Restarting in {}s...", delay.as_secs()),
            )
            .await;

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = &mut shutdown => return self.shutdown_child(None).await,
            }
        }
    }

    async fn shutdown_child(&self, child: Option<Box<dyn SupervisedChild>>) -> GuardianExit {
        tracing::info!("guardian interrupted, stopping monitor");
        if let Some(mut c) = child {
            if let Err(e) = c.terminate().await {
                tracing::warn!(error = %e, "failed to terminate monitor");
            }
        }
        notify_best_effort(self.notifier, "🛑 Guardian stopped manually.").await;
        GuardianExit::Interrupted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_crashes_inside_window_trip() {
        let mut w = CrashWindow::new(Duration::from_secs(60), 5);
        let t0 = Instant::now();
        let tripped: Vec<bool> = (0..5)
            .map(|i| w.record(t0 + Duration::from_secs(i * 10)))
            .collect();
        assert_eq!(tripped, vec![false, false, false, false, true]);
    }

    #[test]
    fn crashes_spread_over_two_minutes_do_not_trip() {
        let mut w = CrashWindow::new(Duration::from_secs(60), 5);
        let t0 = Instant::now();
        for i in 0..5 {
            assert!(!w.record(t0 + Duration::from_secs(i * 30)));
        }
        assert!(w.len() < 5);
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let mut b = Backoff::new(Duration::from_secs(5), Duration::from_secs(300));
        let seq: Vec<u64> = (0..9).map(|_| b.next_delay().as_secs()).collect();
        assert_eq!(seq, vec![5, 10, 20, 40, 80, 160, 300, 300, 300]);
    }
}
