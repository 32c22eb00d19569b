use crate::error::OpsError;
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_ENDPOINT: &str = "https://s3.csh.rit.edu";
pub const DEFAULT_BUCKET: &str = "devcade-games";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_HOME: &str = "/home/devcade";

pub const ACCESS_KEY_VAR: &str = "AWS_ACCESS_KEY_ID";
pub const SECRET_KEY_VAR: &str = "AWS_SECRET_ACCESS_KEY";

/// Object storage connection settings for the upload tool
#[derive(Clone)]
pub struct StorageConfig {
    /// S3-compatible endpoint (default: https://s3.csh.rit.edu)
    pub endpoint_url: String,

    /// Target bucket (default: devcade-games)
    pub bucket: String,

    /// Signing region (default: us-east-1)
    pub region: String,

    pub access_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint_url", &self.endpoint_url)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

impl StorageConfig {
    /// Load configuration from environment variables.
    ///
    /// Credentials are required; endpoint, bucket and region fall back to the
    /// fixed devcade values.
    pub fn from_env() -> Result<Self, OpsError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, OpsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let access_key = lookup(ACCESS_KEY_VAR).ok_or(OpsError::MissingEnv(ACCESS_KEY_VAR))?;
        let secret_key = lookup(SECRET_KEY_VAR).ok_or(OpsError::MissingEnv(SECRET_KEY_VAR))?;

        Ok(Self {
            endpoint_url: lookup("DEVCADE_S3_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            bucket: lookup("DEVCADE_S3_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            region: lookup("DEVCADE_S3_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            access_key,
            secret_key,
        })
    }
}

/// Front-end toolchain invocation and where its output lands
#[derive(Debug, Clone)]
pub struct FrontendBuild {
    /// Project directory, relative to the source root
    pub project_dir: PathBuf,
    pub program: String,
    pub args: Vec<String>,
    /// Publish output, relative to the project directory
    pub output_dir: PathBuf,
    /// Executable produced by the publish step
    pub binary_name: String,
    /// Name the launcher expects inside the publish directory
    pub staged_name: String,
}

impl Default for FrontendBuild {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("frontend"),
            program: "dotnet".to_string(),
            args: ["publish", "-c", "Release", "-r", "linux-x64", "--sc"]
                .map(String::from)
                .to_vec(),
            output_dir: PathBuf::from("bin/Release/net6.0/linux-x64/publish"),
            binary_name: "onboard".to_string(),
            staged_name: "frontend".to_string(),
        }
    }
}

/// Native back-end toolchain invocation
#[derive(Debug, Clone)]
pub struct BackendBuild {
    pub project_dir: PathBuf,
    pub program: String,
    pub args: Vec<String>,
    /// Release binary, relative to the project directory
    pub artifact: PathBuf,
}

impl Default for BackendBuild {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("backend"),
            program: "cargo".to_string(),
            args: ["build", "-r"].map(String::from).to_vec(),
            artifact: PathBuf::from("target/release/backend"),
        }
    }
}

/// Paths and toolchains for the build & stage pipeline
#[derive(Debug, Clone)]
pub struct StageConfig {
    pub home_dir: PathBuf,
    /// Current publish directory (default: <home>/publish)
    pub publish_dir: PathBuf,
    /// Single retained backup (default: <home>/publish.bak)
    pub backup_dir: PathBuf,
    /// Checkout holding the frontend/, backend/ projects and the launcher
    pub source_root: PathBuf,
    pub frontend: FrontendBuild,
    pub backend: BackendBuild,
    /// Launcher script, relative to the source root
    pub launcher: PathBuf,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self::for_home(DEFAULT_HOME, ".")
    }
}

impl StageConfig {
    pub fn for_home(home_dir: impl AsRef<Path>, source_root: impl AsRef<Path>) -> Self {
        let home_dir = home_dir.as_ref().to_path_buf();
        Self {
            publish_dir: home_dir.join("publish"),
            backup_dir: home_dir.join("publish.bak"),
            home_dir,
            source_root: source_root.as_ref().to_path_buf(),
            frontend: FrontendBuild::default(),
            backend: BackendBuild::default(),
            launcher: PathBuf::from("onboard"),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let home = lookup("DEVCADE_HOME").unwrap_or_else(|| DEFAULT_HOME.to_string());
        let source_root = lookup("DEVCADE_SOURCE_ROOT").unwrap_or_else(|| ".".to_string());
        Self::for_home(home, source_root)
    }

    pub fn frontend_project(&self) -> PathBuf {
        self.source_root.join(&self.frontend.project_dir)
    }

    pub fn frontend_output(&self) -> PathBuf {
        self.frontend_project().join(&self.frontend.output_dir)
    }

    pub fn backend_project(&self) -> PathBuf {
        self.source_root.join(&self.backend.project_dir)
    }

    pub fn backend_artifact(&self) -> PathBuf {
        self.backend_project().join(&self.backend.artifact)
    }

    pub fn launcher_source(&self) -> PathBuf {
        self.source_root.join(&self.launcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_storage_config_defaults() {
        let config = StorageConfig::from_lookup(lookup_from(&[
            (ACCESS_KEY_VAR, "access"),
            (SECRET_KEY_VAR, "secret"),
        ]))
        .unwrap();
        assert_eq!(config.endpoint_url, "https://s3.csh.rit.edu");
        assert_eq!(config.bucket, "devcade-games");
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.access_key, "access");
    }

    #[test]
    fn test_storage_config_requires_credentials() {
        let err = StorageConfig::from_lookup(lookup_from(&[(SECRET_KEY_VAR, "secret")]))
            .unwrap_err();
        assert!(matches!(err, OpsError::MissingEnv(ACCESS_KEY_VAR)));

        let err = StorageConfig::from_lookup(lookup_from(&[(ACCESS_KEY_VAR, "access")]))
            .unwrap_err();
        assert!(matches!(err, OpsError::MissingEnv(SECRET_KEY_VAR)));
    }

    #[test]
    fn test_storage_config_debug_hides_secret() {
        let config = StorageConfig::from_lookup(lookup_from(&[
            (ACCESS_KEY_VAR, "access"),
            (SECRET_KEY_VAR, "hunter2"),
        ]))
        .unwrap();
        assert!(!format!("{:?}", config).contains("hunter2"));
    }

    #[test]
    fn test_stage_config_default_paths() {
        let config = StageConfig::default();
        assert_eq!(config.publish_dir, PathBuf::from("/home/devcade/publish"));
        assert_eq!(config.backup_dir, PathBuf::from("/home/devcade/publish.bak"));
        assert_eq!(
            config.frontend_output(),
            PathBuf::from("./frontend/bin/Release/net6.0/linux-x64/publish")
        );
        assert_eq!(
            config.backend_artifact(),
            PathBuf::from("./backend/target/release/backend")
        );
        assert_eq!(config.launcher_source(), PathBuf::from("./onboard"));
    }

    #[test]
    fn test_stage_config_env_overrides() {
        let config = StageConfig::from_lookup(lookup_from(&[
            ("DEVCADE_HOME", "/srv/arcade"),
            ("DEVCADE_SOURCE_ROOT", "/src/onboard"),
        ]));
        assert_eq!(config.publish_dir, PathBuf::from("/srv/arcade/publish"));
        assert_eq!(config.source_root, PathBuf::from("/src/onboard"));
    }
}
