use std::path::PathBuf;

use chrono::Local;

use crate::application::{EventLog, MonitorState, Notifier, PageReader, ReportRenderer, notify_best_effort};
use crate::domain::{Command, HELP_TEXT};

/// Executes operator commands against the monitor state.
///
/// Replies go to the chat channel only; failures to reply are logged and
/// otherwise ignored.
pub struct CommandDispatcher<'a> {
    pub chat: &'a dyn Notifier,
    pub reader: &'a dyn PageReader,
    pub events: &'a dyn EventLog,
    pub renderer: &'a dyn ReportRenderer,
    pub scratch_dir: PathBuf,
}

impl<'a> CommandDispatcher<'a> {
    /// Parse and run raw command texts in arrival order.
    pub async fn dispatch_all(&self, raw: &[String], state: &mut MonitorState) {
        for text in raw {
            match Command::parse(text) {
                Some(cmd) => {
                    tracing::info!(command = %text, "command received");
                    self.dispatch(cmd, state).await;
                }
                None => tracing::debug!(command = %text, "ignoring unknown command"),
            }
        }
    }

    pub async fn dispatch(&self, cmd: Command, state: &mut MonitorState) {
        match cmd {
            Command::Ping => self.reply("🏓 Pong!").await,
            Command::Status => {
                let paused = if state.paused { "\n⏸️ Paused" } else { "" };
                let mut msg = format!(
                    "<b>MONITOR STATUS</b>\n⏱️ Uptime: {}\n🛠️ Mode: {}\n🔎 Visible slots: {}\n🔔 Alerts sent: {}{}",
                    state.uptime(Local::now()),
                    state.policy.mode_label(),
                    state.current.len(),
                    state.alerts_sent,
                    paused,
                );
                if !state.recent.is_empty() {
                    msg.push_str("\n\n<b>Recent changes:</b>");
                    for line in &state.recent {
                        msg.push('\n');
                        msg.push_str(line);
                    }
                }
                self.reply(&msg).await;
            }
            Command::List => {
                if state.current.is_empty() {
                    self.reply("ℹ️ No slots visible.").await;
                } else {
                    let lines: Vec<String> = state.current.iter().map(|s| format!("• {s}")).collect();
                    self.reply(&format!("📋 <b>CURRENT SLOTS:</b>\n\n{}", lines.join("\n")))
                        .await;
                }
            }
            Command::Screenshot => self.screenshot().await,
            Command::Report => self.report().await,
            Command::Pause => {
                state.paused = true;
                tracing::info!("paused by operator");
                self.reply("⏸️ Paused.").await;
            }
            Command::Resume => {
                state.paused = false;
                tracing::info!("resumed by operator");
                self.reply("▶️ Resumed.").await;
            }
            Command::Targets => {
                if state.policy.targets.is_empty() {
                    self.reply("🌐 GENERAL mode (everything except the blacklist)").await;
                } else {
                    let list: Vec<&str> = state.policy.targets.iter().map(String::as_str).collect();
                    self.reply(&format!("🎯 <b>TARGETS:</b>\n{}", list.join("\n"))).await;
                }
            }
            Command::Add(None) => self.reply("⚠️ Usage: /add NAME").await,
            Command::Add(Some(name)) => match state.policy.targets.add(&name) {
                Some(stored) => {
                    tracing::info!(name = %stored, "target added");
                    self.reply(&format!("✅ Target added: {stored}")).await;
                }
                None => self.reply(&format!("ℹ️ Already a target: {}", name.to_uppercase())).await,
            },
            Command::Remove(None) => self.reply("⚠️ Usage: /remove NAME").await,
            Command::Remove(Some(name)) => {
                let dropped = state.policy.targets.remove_matching(&name);
                tracing::info!(fragment = %name, removed = dropped.len(), "targets removed");
                self.reply(&format!("🗑️ Removed: {}", name.to_uppercase())).await;
            }
            Command::Help => self.reply(HELP_TEXT).await,
        }
    }

    async fn screenshot(&self) {
        self.reply("📸 Taking screenshot...").await;
        let path = self.scratch_dir.join("cmd_print.png");
        match self.reader.take_screenshot(&path).await {
            Some(shot) => {
                if let Err(e) = self.chat.send_photo("📸 Current screen", &shot).await {
                    tracing::warn!(error = %e, "failed to send screenshot");
                }
                let _ = tokio::fs::remove_file(&shot).await;
            }
            None => self.reply("❌ Could not take a screenshot.").await,
        }
    }

    async fn report(&self) {
        match self.events.additions_by_hour().await {
            Ok(counts) if counts.is_empty() => self.reply("ℹ️ Not enough data yet.").await,
            Ok(counts) => {
                let chart = self.renderer.render(&counts);
                self.reply(&format!("📈 <b>Opening hours</b>\n<pre>{chart}</pre>")).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to build report");
                self.reply("❌ Could not read the event history.").await;
            }
        }
    }

    async fn reply(&self, text: &str) {
        notify_best_effort(self.chat, text).await;
    }
}
