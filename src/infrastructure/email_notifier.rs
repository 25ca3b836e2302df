use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;

use crate::application::{AppError, AppResult, Notifier};

/// Sends alerts through an HTTP mail API (JSON body, bearer key).
pub struct EmailNotifier {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    from: String,
    to: String,
}

impl EmailNotifier {
    pub fn new(endpoint: String, api_key: String, from: String, to: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            from,
            to,
        }
    }
}

#[derive(Debug, Serialize)]
struct MailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: String,
    text: String,
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send_text(&self, text: &str) -> AppResult<()> {
        let body = strip_markup(text);
        let subject = format!("Slot monitor: {}", body.lines().next().unwrap_or_default());
        let payload = MailRequest {
            from: &self.from,
            to: self.to.split(',').map(str::trim).filter(|s| !s.is_empty()).collect(),
            subject,
            text: body,
        };

        self.client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(std::time::Duration::from_secs(10))
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Notifier(e.to_string()))?
            .error_for_status()
            .map_err(|e| AppError::Notifier(e.to_string()))?;

        Ok(())
    }
}

static TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</?[a-zA-Z]+>").expect("static regex"));

/// Chat messages carry Telegram HTML; mail gets plain text.
fn strip_markup(text: &str) -> String {
    TAGS.replace_all(text, "").trim().to_string()
}
