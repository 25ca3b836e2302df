use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::domain::{EventKind, Heartbeat, SlotEvent, SlotSet, Snapshot};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("provider error: {0}")]
    Provider(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("notifier error: {0}")]
    Notifier(String),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("session invalidated")]
    Session,
    #[error("child process error: {0}")]
    Child(String),
}

pub type AppResult<T> = Result<T, AppError>;

/// Outcome of reading the target page.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    /// Page not ready, timeout, network hiccup. Skip the cycle.
    #[error("transient read failure: {0}")]
    Transient(String),
    /// The portal bounced us to the login form.
    #[error("session invalidated")]
    SessionInvalid,
}

/// Reads the list of offered slots from the portal.
#[async_trait]
pub trait PageReader: Send + Sync {
    async fn read_current_options(&self) -> Result<SlotSet, ReadError>;

    /// Capture the current page into `path`. `None` if the reader cannot.
    async fn take_screenshot(&self, path: &Path) -> Option<PathBuf>;
}

/// Establishes an authenticated session with the portal.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Install `token` and check the post-login marker shows up within `timeout`.
    async fn try_session(&self, token: &str, timeout: Duration) -> AppResult<bool>;

    /// Submit the login form. `Ok(None)` when the portal wants a human (CAPTCHA).
    async fn login_with_credentials(&self, timeout: Duration) -> AppResult<Option<String>>;
}

/// Persists the session token between process lives.
#[async_trait]
pub trait SessionTokenStore: Send + Sync {
    async fn load(&self) -> AppResult<Option<String>>;
    async fn save(&self, token: &str) -> AppResult<()>;
}

/// Deliver notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, text: &str) -> AppResult<()>;

    async fn send_photo(&self, caption: &str, _path: &Path) -> AppResult<()> {
        self.send_text(caption).await
    }
}

/// One client shared by several fan-outs.
#[async_trait]
impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    async fn send_text(&self, text: &str) -> AppResult<()> {
        (**self).send_text(text).await
    }

    async fn send_photo(&self, caption: &str, path: &Path) -> AppResult<()> {
        (**self).send_photo(caption, path).await
    }
}

/// Pull-based inbound operator commands.
#[async_trait]
pub trait CommandSource: Send + Sync {
    /// Raw command texts received since the previous poll.
    async fn poll(&self) -> AppResult<Vec<String>>;
}

/// Last snapshot + heartbeat, each replaced whole.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load_snapshot(&self) -> AppResult<Option<Snapshot>>;
    async fn save_snapshot(&self, snapshot: &Snapshot) -> AppResult<()>;
    async fn load_heartbeat(&self) -> AppResult<Option<Heartbeat>>;
    async fn save_heartbeat(&self, heartbeat: &Heartbeat) -> AppResult<()>;
}

#[derive(Clone, Debug, Default)]
pub struct EventQuery {
    pub since: Option<DateTime<Local>>,
    pub kind: Option<EventKind>,
    pub limit: u32,
}

/// Number of events observed in one hour-of-day bucket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlyCount {
    pub hour: u32,
    pub count: u64,
}

/// Append-only log of slot add/remove events.
#[async_trait]
pub trait EventLog: Send + Sync {
    async fn append(&self, events: &[SlotEvent]) -> AppResult<()>;

    /// Newest first.
    async fn list(&self, query: EventQuery) -> AppResult<Vec<SlotEvent>>;

    /// `added` events grouped by local hour, ascending, empty hours omitted.
    async fn additions_by_hour(&self) -> AppResult<Vec<HourlyCount>>;
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &SlotEvent) -> AppResult<()>;
}

/// Send and log-on-failure. Notification problems never abort a cycle.
pub async fn notify_best_effort(notifier: &dyn Notifier, text: &str) {
    if let Err(e) = notifier.send_text(text).await {
        tracing::warn!(error = %e, "notification failed");
    }
}

/// Turns the hourly histogram into something the operator can read in chat.
pub trait ReportRenderer: Send + Sync {
    fn render(&self, counts: &[HourlyCount]) -> String;
}
