use std::io::Write;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;

use crate::application::{AppError, AppResult, Notifier};

/// Audible alarm on the machine running the monitor.
///
/// On macOS the message is spoken with `say` and a system sound plays;
/// elsewhere the terminal bell rings.
pub struct AlarmNotifier {
    voice: Option<String>,
}

impl AlarmNotifier {
    pub fn new(voice: Option<String>) -> Self {
        Self { voice }
    }
}

#[async_trait]
impl Notifier for AlarmNotifier {
    async fn send_text(&self, text: &str) -> AppResult<()> {
        let spoken = spoken_form(text);

        if cfg!(target_os = "macos") {
            let mut say = Command::new("say");
            if let Some(v) = &self.voice {
                say.arg("-v").arg(v);
            }
            say.arg(&spoken)
                .status()
                .await
                .map_err(|e| AppError::Notifier(format!("say: {e}")))?;
            Command::new("afplay")
                .arg("/System/Library/Sounds/Glass.aiff")
                .status()
                .await
                .map_err(|e| AppError::Notifier(format!("afplay: {e}")))?;
        } else {
            let mut err = std::io::stderr();
            write!(err, "\x07").map_err(|e| AppError::Notifier(e.to_string()))?;
            err.flush().map_err(|e| AppError::Notifier(e.to_string()))?;
        }
        Ok(())
    }
}

static TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</?[a-zA-Z]+>").expect("static regex"));

/// Markup and bullets stripped, lines joined into sentences.
fn spoken_form(text: &str) -> String {
    text.lines()
        .map(|l| TAGS.replace_all(l, "").replace('•', ""))
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(". ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_alert_for_speech() {
        assert_eq!(
            spoken_form("🟢 <b>NEW SLOTS:</b>\n• CARDIOLOGIA\n• DERMATO"),
            "🟢 NEW SLOTS:. CARDIOLOGIA. DERMATO"
        );
    }

    #[test]
    fn fatal_error_is_spoken_without_markup() {
        assert_eq!(
            spoken_form("🔴 FATAL ERROR:\n<pre>auth failed: session keeps getting invalidated</pre>"),
            "🔴 FATAL ERROR:. auth failed: session keeps getting invalidated"
        );
    }
}
