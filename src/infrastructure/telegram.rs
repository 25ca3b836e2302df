use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use serde::{Deserialize, Serialize};

use crate::application::{AppError, AppResult, CommandSource, Notifier};

const API_BASE: &str = "https://api.telegram.org";

/// Telegram bot: outbound chat messages and the inbound command channel.
pub struct TelegramBot {
    client: reqwest::Client,
    base_url: String,
    token: String,
    chat_id: String,
    /// Next `update_id` to ask for.
    offset: AtomicI64,
}

impl TelegramBot {
    pub fn new(token: String, chat_id: String) -> Self {
        Self::with_base_url(API_BASE.to_string(), token, chat_id)
    }

    pub fn with_base_url(base_url: String, token: String, chat_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            token,
            chat_id,
            offset: AtomicI64::new(0),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Debug, Deserialize)]
struct UpdatesResp {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[async_trait]
impl Notifier for TelegramBot {
    async fn send_text(&self, text: &str) -> AppResult<()> {
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
        };

        self.client
            .post(self.method_url("sendMessage"))
            .timeout(Duration::from_secs(10))
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Notifier(e.to_string()))?
            .error_for_status()
            .map_err(|e| AppError::Notifier(e.to_string()))?;

        Ok(())
    }

    async fn send_photo(&self, caption: &str, path: &Path) -> AppResult<()> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AppError::Notifier(format!("read {}: {e}", path.display())))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photo.png".to_string());

        let form = multipart::Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("caption", caption.to_string())
            .text("parse_mode", "HTML")
            .part("photo", multipart::Part::bytes(bytes).file_name(file_name));

        self.client
            .post(self.method_url("sendPhoto"))
            .timeout(Duration::from_secs(20))
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Notifier(e.to_string()))?
            .error_for_status()
            .map_err(|e| AppError::Notifier(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl CommandSource for TelegramBot {
    async fn poll(&self) -> AppResult<Vec<String>> {
        let offset = self.offset.load(Ordering::SeqCst);
        let resp: UpdatesResp = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&[("offset", offset.to_string()), ("timeout", "1".to_string())])
            .timeout(Duration::from_secs(3))
            .send()
            .await
            .map_err(|e| AppError::Provider(e.to_string()))?
            .json()
            .await
            .map_err(|e| AppError::Provider(e.to_string()))?;

        if !resp.ok {
            return Ok(vec![]);
        }

        let (commands, next) = accept_updates(resp.result, &self.chat_id, offset);
        self.offset.store(next, Ordering::SeqCst);
        Ok(commands)
    }
}

/// Keep slash commands from the authorised chat; returns them with the next offset.
pub fn accept_updates(updates: Vec<Update>, chat_id: &str, offset: i64) -> (Vec<String>, i64) {
    let mut next = offset;
    let mut commands = vec![];

    for u in updates {
        next = next.max(u.update_id + 1);
        let Some(msg) = u.message else {
            continue;
        };
        if msg.chat.id.to_string() != chat_id.trim() {
            tracing::debug!(chat = msg.chat.id, "dropping message from unauthorised chat");
            continue;
        }
        let text = msg.text.unwrap_or_default();
        let text = text.trim();
        if text.starts_with('/') {
            commands.push(text.to_string());
        }
    }

    (commands, next)
}
