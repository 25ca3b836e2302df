use std::path::Path;

use anyhow::Context;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

/// Rotated log files kept next to the current one.
const KEEP_LOG_FILES: usize = 3;

/// Daily-rotated `<name>.<date>.log` under `dir`, written off-thread.
///
/// Keep the guard alive for as long as logs should reach the file.
pub fn file_writer(dir: &Path, name: &str) -> anyhow::Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(name)
        .filename_suffix("log")
        .max_log_files(KEEP_LOG_FILES)
        .build(dir)
        .with_context(|| format!("open log file in {}", dir.display()))?;
    Ok(tracing_appender::non_blocking(appender))
}

/// stderr always; a plain-text file too when `log_dir` is given.
pub fn init(log_dir: Option<&Path>, name: &str) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::from_default_env().add_directive("slotwatch=info".parse()?);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let (writer, guard) = file_writer(dir, name)?;
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    Registry::default()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .and_then(file_layer)
                .with_filter(filter),
        )
        .try_init()
        .context("setting default subscriber failed")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_writer_lands_in_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let (writer, guard) = file_writer(&dir.path().join("logs"), "monitor").unwrap();

        let subscriber = Registry::default().with(fmt::layer().with_ansi(false).with_writer(writer));
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(slot = "CARDIOLOGIA", "new slots found");
        });
        drop(guard); // flushes

        let files: Vec<_> = std::fs::read_dir(dir.path().join("logs"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1);
        let name = files[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("monitor.") && name.ends_with(".log"), "{name}");
        let body = std::fs::read_to_string(&files[0]).unwrap();
        assert!(body.contains("new slots found"));
        assert!(body.contains("slot=\"CARDIOLOGIA\""));
    }
}
