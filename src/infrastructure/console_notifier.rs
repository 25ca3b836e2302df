use async_trait::async_trait;

use crate::application::{AppResult, Notifier};

/// Prints alerts to stdout. Always on; the only channel in `--dry-run`.
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn send_text(&self, text: &str) -> AppResult<()> {
        println!("NOTIFY: {}", text.replace('\n', " | "));
        Ok(())
    }
}
