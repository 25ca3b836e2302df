use std::net::SocketAddr;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Local;
use clap::{Args, Parser, Subcommand};

use slotwatch::application::usecases::{HandleDiffUseCase, RunCycleUseCase};
use slotwatch::application::{
    CommandDispatcher, CommandSource, EventLog, EventPublisher, Guardian, GuardianExit,
    MonitorState, Monitor, Notifier, SessionManager, SnapshotStore,
};
use slotwatch::domain::{InterestPolicy, TargetList};
use slotwatch::infrastructure::{
    alarm_notifier::AlarmNotifier,
    console_notifier::ConsoleNotifier,
    email_notifier::EmailNotifier,
    event_bus::EventBus,
    http_page_reader::{Credentials, HttpPageReader},
    json_store::{JsonFileStore, TokenFile},
    memory_store::{InMemoryCommandQueue, InMemoryEventLog, InMemorySnapshotStore},
    multi_notifier::MultiNotifier,
    process_launcher::ProcessLauncher,
    sqlite_store::SqliteEventLog,
    telegram::TelegramBot,
    text_chart::TextChartRenderer,
};
use slotwatch::interfaces::config::{Config, Secrets};
use slotwatch::interfaces::http_api::{ApiState, build_router};
use slotwatch::interfaces::logging;

#[derive(Parser, Debug)]
#[command(name = "slotwatch", about = "Watches the HU portal for new appointment slots")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run the watch loop in this process
    Monitor(MonitorArgs),
    /// Keep a monitor process alive, with a crash-loop breaker
    Guardian(GuardianArgs),
}

#[derive(Args, Debug)]
struct MonitorArgs {
    /// Path to config.yaml
    #[arg(long, default_value = "config.yaml")]
    config: String,

    /// Fixed base interval in seconds (replaces the hourly bands)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    interval: Option<u64>,

    /// Run the page reader without a visible window
    #[arg(long)]
    headless: bool,

    /// Sniper target, repeatable
    #[arg(long = "target")]
    targets: Vec<String>,

    /// Do not send external notifications (console only)
    #[arg(long)]
    dry_run: bool,

    /// Serve the read-only status API on this address
    #[arg(long)]
    http: Option<SocketAddr>,
}

#[derive(Args, Debug)]
struct GuardianArgs {
    /// Path to config.yaml
    #[arg(long, default_value = "config.yaml")]
    config: String,

    /// Extra arguments for the monitor, after `--`
    #[arg(last = true)]
    monitor_args: Vec<String>,
}

fn main() -> ExitCode {
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_path(Path::new(env!("CARGO_MANIFEST_DIR")).join(".env"));
    }
    let cli = Cli::parse();

    // config first: it says where the log files go
    let (config_path, log_name) = match &cli.command {
        Cmd::Monitor(args) => (args.config.clone(), "monitor"),
        Cmd::Guardian(args) => (args.config.clone(), "guardian"),
    };
    let loaded = Config::load_or_default(&config_path);
    let log_dir = loaded.as_ref().ok().map(Config::log_dir);
    let _log_guard = match logging::init(log_dir.as_deref(), log_name) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("failed to set up logging: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    let cfg = match loaded {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("failed to load config {config_path}: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    if !Path::new(&config_path).exists() {
        tracing::warn!(path = %config_path, "config file not found, using defaults");
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Cmd::Monitor(args) => runtime.block_on(run_monitor(args, cfg)),
        Cmd::Guardian(args) => runtime.block_on(run_guardian(args, cfg)),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run_monitor(args: MonitorArgs, cfg: Config) -> anyhow::Result<ExitCode> {
    // 1) secrets
    let secrets = Secrets::from_env();
    tracing::debug!(?secrets, "secrets loaded");

    tokio::fs::create_dir_all(&cfg.data_dir)
        .await
        .with_context(|| format!("create {}", cfg.data_dir.display()))?;

    // 2) stores
    let (snapshots, events): (Arc<dyn SnapshotStore>, Arc<dyn EventLog>) = if args.dry_run {
        tracing::warn!("--dry-run enabled: console output only, state kept in memory");
        (
            Arc::new(InMemorySnapshotStore::new()),
            Arc::new(InMemoryEventLog::new()),
        )
    } else {
        (
            Arc::new(JsonFileStore::new(&cfg.data_dir).await?),
            Arc::new(SqliteEventLog::open(&cfg.events_db_path()).await?),
        )
    };
    let tokens = TokenFile::new(cfg.session_token_path());

    // 3) portal
    let credentials = match (&secrets.hu_user, &secrets.hu_birth_date) {
        (Some(user), Some(birth_date)) => Some(Credentials {
            user: user.clone(),
            birth_date: birth_date.clone(),
        }),
        _ => {
            tracing::warn!("HU_USER/HU_DATA not set, login will need the operator");
            None
        }
    };
    if !args.headless {
        tracing::info!("html reader has no window, running headless anyway");
    }
    let reader = HttpPageReader::new(
        cfg.target_url.clone(),
        credentials,
        Duration::from_secs(cfg.read_timeout_seconds),
    );

    // 4) notification channels, one chat client shared by all of them
    let telegram = if args.dry_run {
        None
    } else {
        telegram_bot(&secrets).map(Arc::new)
    };
    if telegram.is_none() && !args.dry_run {
        tracing::warn!("TELEGRAM_TOKEN/TELEGRAM_CHAT_ID not set, chat and commands disabled");
    }
    let console = ConsoleNotifier::new();
    let chat: &dyn Notifier = match &telegram {
        Some(bot) => bot.as_ref(),
        None => &console,
    };
    let idle_commands = InMemoryCommandQueue::new();
    let commands: &dyn CommandSource = match &telegram {
        Some(bot) => bot.as_ref(),
        None => &idle_commands,
    };

    let mut alert_channels: Vec<Box<dyn Notifier>> = vec![Box::new(ConsoleNotifier::new())];
    let mut operator_channels: Vec<Box<dyn Notifier>> = vec![Box::new(ConsoleNotifier::new())];
    if !args.dry_run {
        if let Some(bot) = &telegram {
            alert_channels.push(Box::new(bot.clone()));
            operator_channels.push(Box::new(bot.clone()));
        }
        match email_notifier(&secrets) {
            Some(email) => alert_channels.push(Box::new(email)),
            None => tracing::warn!("EMAIL_* not set, e-mail alerts disabled"),
        }
        alert_channels.push(Box::new(AlarmNotifier::new(cfg.alarm_voice.clone())));
        operator_channels.push(Box::new(AlarmNotifier::new(cfg.alarm_voice.clone())));
    }
    let alerts = MultiNotifier::new(alert_channels);
    let operator = MultiNotifier::new(operator_channels);

    // 5) optional status API
    let bus = args.http.map(|_| EventBus::new(256));
    if let Some(addr) = args.http {
        let state = ApiState {
            snapshots: snapshots.clone(),
            events: events.clone(),
            api_token: secrets.status_api_token.clone(),
            event_bus: bus.clone(),
            stale_after: stale_after(&cfg, args.interval),
        };
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("bind {addr}"))?;
        tracing::info!(%addr, "status api listening");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, build_router(state)).await {
                tracing::error!("status api stopped: {e}");
            }
        });
    }

    // 6) usecases
    let renderer = TextChartRenderer::default();
    let handle_diff = HandleDiffUseCase {
        events: &*events,
        publisher: bus.as_ref().map(|b| b as &dyn EventPublisher),
        alerts: &alerts,
        reader: &reader,
        scratch_dir: cfg.data_dir.clone(),
    };
    let cycle = RunCycleUseCase {
        reader: &reader,
        snapshots: &*snapshots,
        handle_diff,
    };
    let session = SessionManager {
        auth: &reader,
        tokens: &tokens,
        operator: &operator,
        config: cfg.session_config(),
    };
    let dispatcher = CommandDispatcher {
        chat,
        reader: &reader,
        events: &*events,
        renderer: &renderer,
        scratch_dir: cfg.data_dir.clone(),
    };
    let monitor = Monitor {
        cycle,
        session,
        commands,
        dispatcher,
        scheduler: cfg.scheduler(args.interval),
        chat,
        tick: Duration::from_secs(1),
        alive_every: cfg.alive_every(),
    };

    // 7) run
    let targets = TargetList::new(cfg.targets.iter().chain(args.targets.iter()));
    let policy = InterestPolicy::new(targets, cfg.blacklist.clone());
    let mut state = MonitorState::new(policy, Local::now());

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    match monitor.run(&mut state, shutdown).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        // already logged and reported by the monitor
        Err(_) => Ok(ExitCode::FAILURE),
    }
}

async fn run_guardian(args: GuardianArgs, cfg: Config) -> anyhow::Result<ExitCode> {
    let secrets = Secrets::from_env();

    let program = std::env::current_exe().context("cannot locate own executable")?;
    let mut monitor_args = vec!["monitor".to_string(), "--config".to_string(), args.config];
    monitor_args.extend(args.monitor_args);
    let launcher = ProcessLauncher::new(program, monitor_args);

    let mut channels: Vec<Box<dyn Notifier>> = vec![Box::new(ConsoleNotifier::new())];
    if let Some(bot) = telegram_bot(&secrets) {
        channels.push(Box::new(bot));
    }
    let notifier = MultiNotifier::new(channels);

    let guardian = Guardian {
        launcher: &launcher,
        notifier: &notifier,
        config: cfg.guardian_config(),
    };
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    match guardian.run(shutdown).await {
        GuardianExit::Interrupted => Ok(ExitCode::SUCCESS),
        GuardianExit::Tripped { crashes } => {
            tracing::error!(crashes, "guardian gave up");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn telegram_bot(secrets: &Secrets) -> Option<TelegramBot> {
    match (&secrets.telegram_token, &secrets.telegram_chat_id) {
        (Some(token), Some(chat_id)) => Some(TelegramBot::new(token.clone(), chat_id.clone())),
        _ => None,
    }
}

fn email_notifier(secrets: &Secrets) -> Option<EmailNotifier> {
    Some(EmailNotifier::new(
        secrets.email_api_url.clone()?,
        secrets.email_api_key.clone()?,
        secrets.email_from.clone()?,
        secrets.email_to.clone()?,
    ))
}

/// Two of the longest configured waits without a heartbeat means trouble.
fn stale_after(cfg: &Config, interval_override: Option<u64>) -> chrono::Duration {
    let longest_secs = match interval_override {
        Some(secs) => secs,
        None => cfg
            .intervals
            .iter()
            .map(|b| b.minutes)
            .chain([cfg.default_interval_minutes])
            .max()
            .unwrap_or(60)
            * 60,
    };
    chrono::Duration::seconds((longest_secs * 2) as i64)
}
