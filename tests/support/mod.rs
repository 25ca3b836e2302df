#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use slotwatch::application::{AppResult, Authenticator, Notifier, PageReader, ReadError};
use slotwatch::domain::SlotSet;

pub fn slots(names: &[&str]) -> SlotSet {
    SlotSet::from_labels(names.iter().copied())
}

/// Keeps every message it was asked to deliver.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    texts: Arc<Mutex<Vec<String>>>,
    photos: Arc<Mutex<u32>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.texts.lock().unwrap().len()
    }

    pub fn photos(&self) -> u32 {
        *self.photos.lock().unwrap()
    }

    pub fn last(&self) -> Option<String> {
        self.texts.lock().unwrap().last().cloned()
    }

    pub fn any_contains(&self, needle: &str) -> bool {
        self.texts().iter().any(|t| t.contains(needle))
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_text(&self, text: &str) -> AppResult<()> {
        self.texts.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn send_photo(&self, caption: &str, _path: &Path) -> AppResult<()> {
        *self.photos.lock().unwrap() += 1;
        self.texts.lock().unwrap().push(caption.to_string());
        Ok(())
    }
}

/// Plays back a fixed list of reads, then repeats the last one.
pub struct ScriptedReader {
    script: Mutex<VecDeque<Result<SlotSet, ReadError>>>,
    last: Mutex<Result<SlotSet, ReadError>>,
    reads: Mutex<u32>,
    screenshots: bool,
}

impl ScriptedReader {
    pub fn new(script: Vec<Result<SlotSet, ReadError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(Ok(SlotSet::new())),
            reads: Mutex::new(0),
            screenshots: false,
        }
    }

    pub fn of(sets: &[&[&str]]) -> Self {
        Self::new(sets.iter().map(|s| Ok(slots(s))).collect())
    }

    pub fn with_screenshots(mut self) -> Self {
        self.screenshots = true;
        self
    }

    pub fn reads(&self) -> u32 {
        *self.reads.lock().unwrap()
    }
}

#[async_trait]
impl PageReader for ScriptedReader {
    async fn read_current_options(&self) -> Result<SlotSet, ReadError> {
        *self.reads.lock().unwrap() += 1;
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(r) => {
                *self.last.lock().unwrap() = r.clone();
                r
            }
            None => self.last.lock().unwrap().clone(),
        }
    }

    async fn take_screenshot(&self, path: &Path) -> Option<PathBuf> {
        if !self.screenshots {
            return None;
        }
        tokio::fs::write(path, b"png").await.ok()?;
        Some(path.to_path_buf())
    }
}

/// Accepts a fixed set of tokens; credential login hands out `login_token`.
#[derive(Default)]
pub struct FakeAuth {
    pub valid: Mutex<Vec<String>>,
    pub login_token: Option<String>,
    pub checks: Mutex<Vec<String>>,
    pub logins: Mutex<u32>,
}

impl FakeAuth {
    pub fn accepting(tokens: &[&str]) -> Self {
        Self {
            valid: Mutex::new(tokens.iter().map(|t| t.to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn with_login(mut self, token: &str) -> Self {
        self.valid.lock().unwrap().push(token.to_string());
        self.login_token = Some(token.to_string());
        self
    }

    pub fn logins(&self) -> u32 {
        *self.logins.lock().unwrap()
    }

    pub fn checks(&self) -> Vec<String> {
        self.checks.lock().unwrap().clone()
    }
}

#[async_trait]
impl Authenticator for FakeAuth {
    async fn try_session(&self, token: &str, _timeout: Duration) -> AppResult<bool> {
        self.checks.lock().unwrap().push(token.to_string());
        Ok(self.valid.lock().unwrap().iter().any(|t| t == token))
    }

    async fn login_with_credentials(&self, _timeout: Duration) -> AppResult<Option<String>> {
        *self.logins.lock().unwrap() += 1;
        Ok(self.login_token.clone())
    }
}
