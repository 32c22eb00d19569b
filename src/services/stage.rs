use crate::config::StageConfig;
use crate::error::{OpsError, Step};
use crate::services::command::{BuildCommand, CommandRunner, CommandStatus, StatusPolicy, run_step};
use crate::utils::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// What the rotation step did to the publish directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RotationOutcome {
    pub removed_backup: bool,
    pub rotated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub rotation: RotationOutcome,
    /// Entries of the publish directory after the run, sorted by name
    pub entries: Vec<PathBuf>,
}

fn fs_err(step: Step, path: &Path) -> impl FnOnce(std::io::Error) -> OpsError + '_ {
    move |source| OpsError::Filesystem {
        step,
        path: path.to_path_buf(),
        source,
    }
}

/// Keep at most one previous publish directory.
///
/// The backup is deleted only when a current publish directory exists to
/// replace it. A backup without a current directory is left alone.
pub async fn rotate_publish_dir(config: &StageConfig) -> Result<RotationOutcome, OpsError> {
    let current = &config.publish_dir;
    let backup = &config.backup_dir;
    let mut outcome = RotationOutcome::default();

    if backup.exists() && current.exists() {
        info!("🗑️  Removing old backup {}", backup.display());
        outcome.removed_backup = fs::remove_dir_if_exists(backup)
            .await
            .map_err(fs_err(Step::Rotate, backup))?;
    }

    if current.exists() {
        info!("🔄 {} -> {}", current.display(), backup.display());
        fs::move_path(current, backup)
            .await
            .map_err(fs_err(Step::Rotate, current))?;
        outcome.rotated = true;
    }

    Ok(outcome)
}

pub fn frontend_command(config: &StageConfig) -> BuildCommand {
    BuildCommand {
        step: Step::BuildFrontend,
        program: config.frontend.program.clone(),
        args: config.frontend.args.clone(),
        working_dir: config.frontend_project(),
    }
}

pub fn backend_command(config: &StageConfig) -> BuildCommand {
    BuildCommand {
        step: Step::BuildBackend,
        program: config.backend.program.clone(),
        args: config.backend.args.clone(),
        working_dir: config.backend_project(),
    }
}

pub async fn build_frontend(
    config: &StageConfig,
    runner: &dyn CommandRunner,
    policy: StatusPolicy,
) -> Result<CommandStatus, OpsError> {
    run_step(runner, &frontend_command(config), policy).await
}

pub async fn build_backend(
    config: &StageConfig,
    runner: &dyn CommandRunner,
    policy: StatusPolicy,
) -> Result<CommandStatus, OpsError> {
    run_step(runner, &backend_command(config), policy).await
}

/// Move the front-end publish output into place as the publish directory and
/// give its executable the name the launcher expects.
pub async fn stage_frontend(config: &StageConfig) -> Result<(), OpsError> {
    let output = config.frontend_output();
    info!(
        "📁 Moving {} -> {}",
        output.display(),
        config.publish_dir.display()
    );
    fs::move_path(&output, &config.publish_dir)
        .await
        .map_err(fs_err(Step::StageFrontend, &output))?;

    let binary = config.publish_dir.join(&config.frontend.binary_name);
    let staged = config.publish_dir.join(&config.frontend.staged_name);
    fs::move_path(&binary, &staged)
        .await
        .map_err(fs_err(Step::StageFrontend, &binary))?;
    Ok(())
}

pub async fn stage_backend(config: &StageConfig) -> Result<(), OpsError> {
    let artifact = config.backend_artifact();
    let file_name = artifact
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("backend"));
    let dest = config.publish_dir.join(file_name);

    info!("📁 Moving {} -> {}", artifact.display(), dest.display());
    fs::move_path(&artifact, &dest)
        .await
        .map_err(fs_err(Step::StageBackend, &artifact))
}

pub async fn copy_launcher(config: &StageConfig) -> Result<(), OpsError> {
    let launcher = config.launcher_source();
    let file_name = launcher
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("onboard"));
    let dest = config.publish_dir.join(file_name);

    info!("📄 Copying {} -> {}", launcher.display(), dest.display());
    fs::copy_file(&launcher, &dest)
        .await
        .map_err(fs_err(Step::CopyLauncher, &launcher))?;
    Ok(())
}

/// Rotate, build both components, stage their artifacts and copy the
/// launcher. Stops at the first failing step.
pub async fn run_pipeline(
    config: &StageConfig,
    runner: &dyn CommandRunner,
    policy: StatusPolicy,
) -> Result<StageReport, OpsError> {
    let rotation = rotate_publish_dir(config).await?;

    build_frontend(config, runner, policy).await?;
    stage_frontend(config).await?;

    build_backend(config, runner, policy).await?;
    stage_backend(config).await?;

    copy_launcher(config).await?;

    let entries = fs::list_entries(&config.publish_dir)
        .await
        .map_err(fs_err(Step::CopyLauncher, &config.publish_dir))?;
    info!(
        "✅ Staged {} entries in {}",
        entries.len(),
        config.publish_dir.display()
    );

    Ok(StageReport { rotation, entries })
}
