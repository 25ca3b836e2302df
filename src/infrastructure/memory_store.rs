use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Timelike;

use crate::application::{
    AppError, AppResult, CommandSource, EventLog, EventQuery, HourlyCount, SessionTokenStore,
    SnapshotStore,
};
use crate::domain::{EventKind, Heartbeat, SlotEvent, Snapshot};

fn lock<T>(m: &Mutex<T>) -> AppResult<MutexGuard<'_, T>> {
    m.lock()
        .map_err(|_| AppError::Storage("lock poisoned".into()))
}

/// Snapshot + heartbeat held in memory. Used by `--dry-run` and tests.
#[derive(Clone, Default)]
pub struct InMemorySnapshotStore {
    inner: Arc<Mutex<SnapshotInner>>,
}

#[derive(Default)]
struct SnapshotInner {
    snapshot: Option<Snapshot>,
    heartbeat: Option<Heartbeat>,
    snapshot_writes: u32,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        let store = Self::default();
        if let Ok(mut inner) = store.inner.lock() {
            inner.snapshot = Some(snapshot);
        }
        store
    }

    pub fn snapshot_writes(&self) -> u32 {
        self.inner.lock().map(|i| i.snapshot_writes).unwrap_or(0)
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn load_snapshot(&self) -> AppResult<Option<Snapshot>> {
        Ok(lock(&self.inner)?.snapshot.clone())
    }

    async fn save_snapshot(&self, snapshot: &Snapshot) -> AppResult<()> {
        let mut inner = lock(&self.inner)?;
        inner.snapshot = Some(snapshot.clone());
        inner.snapshot_writes += 1;
        Ok(())
    }

    async fn load_heartbeat(&self) -> AppResult<Option<Heartbeat>> {
        Ok(lock(&self.inner)?.heartbeat.clone())
    }

    async fn save_heartbeat(&self, heartbeat: &Heartbeat) -> AppResult<()> {
        lock(&self.inner)?.heartbeat = Some(heartbeat.clone());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryEventLog {
    events: Arc<Mutex<Vec<SlotEvent>>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Oldest first.
    pub fn all(&self) -> Vec<SlotEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append(&self, events: &[SlotEvent]) -> AppResult<()> {
        lock(&self.events)?.extend_from_slice(events);
        Ok(())
    }

    async fn list(&self, query: EventQuery) -> AppResult<Vec<SlotEvent>> {
        let events = lock(&self.events)?;
        Ok(events
            .iter()
            .rev() // newest first (pushed at end)
            .filter(|e| query.since.is_none_or(|s| e.timestamp >= s))
            .filter(|e| query.kind.is_none_or(|k| e.kind == k))
            .take(query.limit as usize)
            .cloned()
            .collect())
    }

    async fn additions_by_hour(&self) -> AppResult<Vec<HourlyCount>> {
        let events = lock(&self.events)?;
        let mut by_hour: BTreeMap<u32, u64> = BTreeMap::new();
        for e in events.iter().filter(|e| e.kind == EventKind::Added) {
            *by_hour.entry(e.timestamp.hour()).or_default() += 1;
        }
        Ok(by_hour
            .into_iter()
            .map(|(hour, count)| HourlyCount { hour, count })
            .collect())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryTokenStore {
    token: Arc<Mutex<Option<String>>>,
}

impl InMemoryTokenStore {
    pub fn new(token: Option<&str>) -> Self {
        Self {
            token: Arc::new(Mutex::new(token.map(str::to_string))),
        }
    }

    pub fn set(&self, token: &str) {
        if let Ok(mut t) = self.token.lock() {
            *t = Some(token.to_string());
        }
    }

    pub fn get(&self) -> Option<String> {
        self.token.lock().ok().and_then(|t| t.clone())
    }
}

#[async_trait]
impl SessionTokenStore for InMemoryTokenStore {
    async fn load(&self) -> AppResult<Option<String>> {
        Ok(lock(&self.token)?.clone())
    }

    async fn save(&self, token: &str) -> AppResult<()> {
        *lock(&self.token)? = Some(token.to_string());
        Ok(())
    }
}

/// Command texts pushed in-process. With nothing pushed it is a silent channel.
#[derive(Clone, Default)]
pub struct InMemoryCommandQueue {
    pending: Arc<Mutex<Vec<String>>>,
}

impl InMemoryCommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, text: &str) {
        if let Ok(mut p) = self.pending.lock() {
            p.push(text.to_string());
        }
    }
}

#[async_trait]
impl CommandSource for InMemoryCommandQueue {
    async fn poll(&self) -> AppResult<Vec<String>> {
        Ok(std::mem::take(&mut *lock(&self.pending)?))
    }
}
