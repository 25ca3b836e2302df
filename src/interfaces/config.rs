use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::application::{GuardianConfig, IntervalBand, IntervalScheduler, SessionConfig};

/// `config.yaml`. Every field has a default so a partial file is fine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub target_url: String,
    pub data_dir: PathBuf,
    /// Used when no band matches the current hour.
    pub default_interval_minutes: u64,
    pub paused_interval_seconds: u64,
    pub intervals: Vec<IntervalBand>,
    /// Exact slot names never worth an alert in general mode.
    pub blacklist: Vec<String>,
    /// Initial sniper targets.
    pub targets: Vec<String>,
    pub read_timeout_seconds: u64,
    /// Minutes between "still alive" chat pings, 0 turns them off.
    pub alive_interval_minutes: u64,
    pub alarm_voice: Option<String>,
    pub session: SessionCfg,
    pub guardian: GuardianCfg,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_url: "https://sistemashu.hu.usp.br/reshu/paciente".to_string(),
            data_dir: PathBuf::from("data"),
            default_interval_minutes: 60,
            paused_interval_seconds: 5,
            intervals: vec![],
            blacklist: vec!["PEDIATRIA".to_string(), "ODONTOLOGIA".to_string()],
            targets: vec![],
            read_timeout_seconds: 20,
            alive_interval_minutes: 60,
            alarm_voice: None,
            session: SessionCfg::default(),
            guardian: GuardianCfg::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionCfg {
    pub restore_timeout_seconds: u64,
    pub login_timeout_seconds: u64,
}

impl Default for SessionCfg {
    fn default() -> Self {
        Self {
            restore_timeout_seconds: 5,
            login_timeout_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GuardianCfg {
    pub max_crashes: usize,
    pub crash_window_seconds: u64,
    pub initial_backoff_seconds: u64,
    pub max_backoff_seconds: u64,
}

impl Default for GuardianCfg {
    fn default() -> Self {
        Self {
            max_crashes: 5,
            crash_window_seconds: 60,
            initial_backoff_seconds: 5,
            max_backoff_seconds: 300,
        }
    }
}

impl Config {
    pub fn load_from_file(path: &str) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    /// Like `load_from_file`, but a missing file means defaults.
    pub fn load_or_default(path: &str) -> anyhow::Result<Self> {
        if !Path::new(path).exists() {
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        let raw = expand_env(raw);
        let cfg: Config = serde_yaml::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.default_interval_minutes == 0 {
            anyhow::bail!("default_interval_minutes must be at least 1");
        }
        if self.paused_interval_seconds == 0 {
            anyhow::bail!("paused_interval_seconds must be at least 1");
        }
        for b in &self.intervals {
            if b.start_hour > 24 || b.end_hour > 24 {
                anyhow::bail!("interval band hours must be within 0..=24: {b:?}");
            }
            if b.minutes == 0 {
                anyhow::bail!("interval band must poll at least every minute: {b:?}");
            }
        }
        if self.guardian.max_crashes == 0 {
            anyhow::bail!("guardian.max_crashes must be at least 1");
        }
        Ok(())
    }

    pub fn scheduler(&self, interval_override: Option<u64>) -> IntervalScheduler {
        let scheduler = IntervalScheduler::new(
            self.intervals.clone(),
            Duration::from_secs(self.default_interval_minutes * 60),
            Duration::from_secs(self.paused_interval_seconds),
        );
        match interval_override {
            Some(secs) => scheduler.with_fixed_base(Duration::from_secs(secs)),
            None => scheduler,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            restore_timeout: Duration::from_secs(self.session.restore_timeout_seconds),
            login_timeout: Duration::from_secs(self.session.login_timeout_seconds),
            ..SessionConfig::default()
        }
    }

    /// Guardian thresholds; `GUARDIAN_*` environment variables win over the file.
    pub fn guardian_config(&self) -> GuardianConfig {
        let g = &self.guardian;
        GuardianConfig {
            max_crashes: env_or("GUARDIAN_MAX_CRASHES", g.max_crashes).max(1),
            crash_window: Duration::from_secs(env_or(
                "GUARDIAN_CRASH_WINDOW_SECONDS",
                g.crash_window_seconds,
            )),
            initial_backoff: Duration::from_secs(env_or(
                "GUARDIAN_INITIAL_BACKOFF_SECONDS",
                g.initial_backoff_seconds,
            )),
            max_backoff: Duration::from_secs(env_or(
                "GUARDIAN_MAX_BACKOFF_SECONDS",
                g.max_backoff_seconds,
            )),
        }
    }

    pub fn alive_every(&self) -> Option<Duration> {
        (self.alive_interval_minutes > 0).then(|| Duration::from_secs(self.alive_interval_minutes * 60))
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn events_db_path(&self) -> PathBuf {
        self.data_dir.join("events.db")
    }

    pub fn session_token_path(&self) -> PathBuf {
        self.data_dir.join("session_token")
    }
}

/// Credentials and endpoints, read once from the environment (`.env` honoured).
#[derive(Clone, Default)]
pub struct Secrets {
    pub hu_user: Option<String>,
    pub hu_birth_date: Option<String>,
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub email_api_url: Option<String>,
    pub email_api_key: Option<String>,
    pub email_from: Option<String>,
    pub email_to: Option<String>,
    pub status_api_token: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            hu_user: var("HU_USER"),
            hu_birth_date: var("HU_DATA"),
            telegram_token: var("TELEGRAM_TOKEN"),
            telegram_chat_id: var("TELEGRAM_CHAT_ID"),
            email_api_url: var("EMAIL_API_URL"),
            email_api_key: var("EMAIL_API_KEY"),
            email_from: var("EMAIL_FROM"),
            email_to: var("EMAIL_TO"),
            status_api_token: var("STATUS_API_TOKEN"),
        }
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let set = |v: &Option<String>| if v.is_some() { "set" } else { "unset" };
        f.debug_struct("Secrets")
            .field("hu_user", &set(&self.hu_user))
            .field("telegram_token", &set(&self.telegram_token))
            .field("telegram_chat_id", &set(&self.telegram_chat_id))
            .field("email_api_url", &set(&self.email_api_url))
            .field("status_api_token", &set(&self.status_api_token))
            .finish()
    }
}

fn var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    match var(key).map(|v| v.parse::<T>()) {
        Some(Ok(v)) => v,
        Some(Err(_)) => {
            tracing::warn!(key, "ignoring unparsable environment override");
            fallback
        }
        None => fallback,
    }
}

/// very small ${VAR} expansion to keep config simple
fn expand_env(s: &str) -> String {
    let mut out = s.to_string();
    for (k, v) in std::env::vars() {
        out = out.replace(&format!("${{{}}}", k), &v);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_fills_defaults() {
        let cfg = Config::from_yaml(
            r#"
intervals:
  - { start_hour: 7, end_hour: 19, minutes: 2 }
targets: [cardio]
guardian:
  max_crashes: 3
"#,
        )
        .unwrap();
        assert_eq!(cfg.intervals.len(), 1);
        assert_eq!(cfg.targets, vec!["cardio"]);
        assert_eq!(cfg.guardian.max_crashes, 3);
        assert_eq!(cfg.guardian.crash_window_seconds, 60);
        assert_eq!(cfg.blacklist, vec!["PEDIATRIA", "ODONTOLOGIA"]);
        assert_eq!(cfg.default_interval_minutes, 60);
    }

    #[test]
    fn example_config_is_valid() {
        let cfg = Config::from_yaml(include_str!("../../config.example.yaml")).unwrap();
        let s = cfg.scheduler(None);
        assert_eq!(s.base_interval(8), Duration::from_secs(300));
        assert_eq!(s.base_interval(2), Duration::from_secs(3600));
    }

    #[test]
    fn rejects_zero_minute_band() {
        let err = Config::from_yaml("intervals: [{ start_hour: 1, end_hour: 2, minutes: 0 }]");
        assert!(err.is_err());
    }

    #[test]
    fn rejects_zero_base_and_paused_intervals() {
        assert!(Config::from_yaml("default_interval_minutes: 0").is_err());
        assert!(Config::from_yaml("paused_interval_seconds: 0").is_err());
        assert!(Config::from_yaml("default_interval_minutes: 1\npaused_interval_seconds: 1").is_ok());
    }

    #[test]
    fn alive_ping_and_log_dir_follow_config() {
        let cfg = Config::from_yaml("data_dir: /var/slotwatch\nalive_interval_minutes: 0").unwrap();
        assert_eq!(cfg.alive_every(), None);
        assert_eq!(cfg.log_dir(), PathBuf::from("/var/slotwatch/logs"));
        assert_eq!(Config::default().alive_every(), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn interval_override_fixes_base() {
        let cfg = Config::default();
        let s = cfg.scheduler(Some(120));
        assert_eq!(s.base_interval(3), Duration::from_secs(120));
        assert_eq!(cfg.scheduler(None).base_interval(3), Duration::from_secs(3600));
    }
}
