//! Deployment configuration

use crate::error::{Result, StevedoreError};
use std::path::PathBuf;
use std::time::Duration;

/// Default deployment directory, relative to the working directory
pub const DEFAULT_PROJECT_DIR: &str = "deploy";

/// Default host probed for readiness
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default port probed for readiness
pub const DEFAULT_PORT: u16 = 8080;

/// Default readiness attempt budget
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

/// Default pause between readiness attempts
pub const DEFAULT_READY_INTERVAL: Duration = Duration::from_secs(2);

/// Default pause between crash watchdog polls
pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(10);

/// Default timeout for a single port probe strategy
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Default number of log lines replayed before following
pub const DEFAULT_LOG_TAIL: usize = 100;

/// Cloud-preview hostname fragment, only used to print the access URL
pub const PREVIEW_HOST_ENV: &str = "CODESPACE_NAME";

/// Overrides the deployment directory
pub const PROJECT_DIR_ENV: &str = "STEVEDORE_DIR";

/// Overrides the target port
pub const PORT_ENV: &str = "STEVEDORE_PORT";

/// Immutable configuration for one deployment.
///
/// Built once at startup and handed to every component that needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentConfig {
    /// Directory holding the compose manifest
    pub project_dir: PathBuf,
    /// Host probed for readiness
    pub host: String,
    /// Port probed for readiness
    pub port: u16,
    /// Readiness attempt budget
    pub max_attempts: u32,
    /// Pause between readiness attempts
    pub ready_interval: Duration,
    /// Pause between watchdog polls
    pub watch_interval: Duration,
    /// Timeout for each probe strategy
    pub probe_timeout: Duration,
    /// Log lines replayed by `logs`
    pub log_tail: usize,
    /// Transient file receiving the output of `up`
    pub log_file: PathBuf,
    /// Cloud-preview hostname fragment
    pub preview_host: Option<String>,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        let log_dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("stevedore");

        Self {
            project_dir: PathBuf::from(DEFAULT_PROJECT_DIR),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            ready_interval: DEFAULT_READY_INTERVAL,
            watch_interval: DEFAULT_WATCH_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            log_tail: DEFAULT_LOG_TAIL,
            log_file: log_dir.join("startup.log"),
            preview_host: None,
        }
    }
}

impl DeploymentConfig {
    /// Build the configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(dir) = var(PROJECT_DIR_ENV) {
            config.project_dir = PathBuf::from(dir);
        }

        if let Some(port) = var(PORT_ENV) {
            config.port = port.trim().parse().map_err(|_| {
                StevedoreError::InvalidConfig(format!("{} is not a valid port: {}", PORT_ENV, port))
            })?;
        }

        config.preview_host = var(PREVIEW_HOST_ENV);

        Ok(config)
    }

    /// Set the deployment directory
    pub fn with_project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = dir.into();
        self
    }

    /// Set the transient log file
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = path.into();
        self
    }

    /// Set the readiness budget
    pub fn with_readiness(mut self, max_attempts: u32, interval: Duration) -> Self {
        self.max_attempts = max_attempts;
        self.ready_interval = interval;
        self
    }

    /// URL printed for humans to reach the deployment
    pub fn access_url(&self) -> String {
        match self.preview_host {
            Some(ref name) => format!("https://{}-{}.app.github.dev", name, self.port),
            None => format!("http://localhost:{}", self.port),
        }
    }
}
