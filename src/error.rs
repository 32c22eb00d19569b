use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A named stage of the build & stage pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Rotate,
    BuildFrontend,
    StageFrontend,
    BuildBackend,
    StageBackend,
    CopyLauncher,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Rotate => "rotate publish directory",
            Step::BuildFrontend => "build frontend",
            Step::StageFrontend => "stage frontend",
            Step::BuildBackend => "build backend",
            Step::StageBackend => "stage backend",
            Step::CopyLauncher => "copy launcher",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum OpsError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Cannot read {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage {step} failed: {source}")]
    Storage {
        step: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Step '{step}' failed on {}: {source}", .path.display())]
    Filesystem {
        step: Step,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Step '{step}' could not start '{program}': {source}")]
    Spawn {
        step: Step,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Step '{step}': '{program}' exited with {}", describe_code(.code))]
    CommandFailed {
        step: Step,
        program: String,
        code: Option<i32>,
    },
}

impl OpsError {
    /// The pipeline step this error belongs to, if any.
    pub fn step(&self) -> Option<Step> {
        match self {
            OpsError::Filesystem { step, .. }
            | OpsError::Spawn { step, .. }
            | OpsError::CommandFailed { step, .. } => Some(*step),
            _ => None,
        }
    }
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (terminated by signal)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_names_step() {
        let err = OpsError::CommandFailed {
            step: Step::BuildFrontend,
            program: "dotnet".to_string(),
            code: Some(1),
        };
        assert_eq!(
            err.to_string(),
            "Step 'build frontend': 'dotnet' exited with status 1"
        );
        assert_eq!(err.step(), Some(Step::BuildFrontend));
    }

    #[test]
    fn test_signal_termination_message() {
        let err = OpsError::CommandFailed {
            step: Step::BuildBackend,
            program: "cargo".to_string(),
            code: None,
        };
        assert!(err.to_string().contains("terminated by signal"));
    }

    #[test]
    fn test_missing_env_has_no_step() {
        let err = OpsError::MissingEnv("AWS_ACCESS_KEY_ID");
        assert_eq!(
            err.to_string(),
            "Missing environment variable: AWS_ACCESS_KEY_ID"
        );
        assert!(err.step().is_none());
    }
}
