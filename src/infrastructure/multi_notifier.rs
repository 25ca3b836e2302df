use std::path::Path;

use async_trait::async_trait;

use crate::application::{AppResult, Notifier};

/// Fans a message out to every channel.
pub struct MultiNotifier {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl MultiNotifier {
    pub fn new(notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self { notifiers }
    }
}

#[async_trait]
impl Notifier for MultiNotifier {
    async fn send_text(&self, text: &str) -> AppResult<()> {
        // one channel failing must not starve the others
        let mut last_err = None;

        for n in &self.notifiers {
            if let Err(e) = n.send_text(text).await {
                last_err = Some(e);
            }
        }

        if let Some(e) = last_err {
            return Err(e);
        }

        Ok(())
    }

    async fn send_photo(&self, caption: &str, path: &Path) -> AppResult<()> {
        let mut last_err = None;

        for n in &self.notifiers {
            if let Err(e) = n.send_photo(caption, path).await {
                last_err = Some(e);
            }
        }

        if let Some(e) = last_err {
            return Err(e);
        }

        Ok(())
    }
}
