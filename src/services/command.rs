use crate::error::{OpsError, Step};
use async_trait::async_trait;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use tracing::{info, warn};

/// One external toolchain invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildCommand {
    pub step: Step,
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

impl fmt::Display for BuildCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Exit status of a finished command. `code` is `None` when the process was
/// killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStatus {
    pub code: Option<i32>,
}

impl CommandStatus {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// What to do when a toolchain exits unsuccessfully
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusPolicy {
    /// Abort the pipeline at the failing step
    #[default]
    Enforce,
    /// Log a warning and carry on with the next step
    Ignore,
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &BuildCommand) -> io::Result<CommandStatus>;
}

/// Spawns real processes with inherited stdio and waits for them to exit.
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &BuildCommand) -> io::Result<CommandStatus> {
        let status = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .current_dir(&command.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await?;
        Ok(CommandStatus {
            code: status.code(),
        })
    }
}

/// Run `command` and apply `policy` to its exit status.
pub async fn run_step(
    runner: &dyn CommandRunner,
    command: &BuildCommand,
    policy: StatusPolicy,
) -> Result<CommandStatus, OpsError> {
    info!(
        "🔨 [{}] {} (in {})",
        command.step,
        command,
        command.working_dir.display()
    );

    let status = runner
        .run(command)
        .await
        .map_err(|source| OpsError::Spawn {
            step: command.step,
            program: command.program.clone(),
            source,
        })?;

    if status.success() {
        return Ok(status);
    }

    match policy {
        StatusPolicy::Enforce => Err(OpsError::CommandFailed {
            step: command.step,
            program: command.program.clone(),
            code: status.code,
        }),
        StatusPolicy::Ignore => {
            warn!(
                "⚠️  [{}] {} exited with {:?}, continuing anyway",
                command.step, command.program, status.code
            );
            Ok(status)
        }
    }
}
