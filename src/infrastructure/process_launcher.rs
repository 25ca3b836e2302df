use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::{Child, Command};

use crate::application::{AppError, AppResult, ChildLauncher, SupervisedChild};

/// Starts the monitor as `<program> <args...>`, normally this same binary
/// with the `monitor` subcommand.
pub struct ProcessLauncher {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessLauncher {
    pub fn new(program: PathBuf, args: Vec<String>) -> Self {
        Self { program, args }
    }
}

#[async_trait]
impl ChildLauncher for ProcessLauncher {
    async fn launch(&self) -> AppResult<Box<dyn SupervisedChild>> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AppError::Child(format!("spawn {}: {e}", self.program.display())))?;
        tracing::info!(pid = child.id(), "monitor launched");
        Ok(Box::new(MonitorProcess { child }))
    }
}

struct MonitorProcess {
    child: Child,
}

#[async_trait]
impl SupervisedChild for MonitorProcess {
    async fn wait(&mut self) -> AppResult<Option<i32>> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| AppError::Child(e.to_string()))?;
        Ok(status.code())
    }

    async fn terminate(&mut self) -> AppResult<()> {
        // already gone is fine
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(error = %e, "kill failed");
        }
        self.child
            .wait()
            .await
            .map_err(|e| AppError::Child(e.to_string()))?;
        Ok(())
    }
}
