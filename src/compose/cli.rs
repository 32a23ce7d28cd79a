//! docker-compose command driver
//!
//! Every operation shells out to `docker-compose` (or `docker compose`) with
//! the deployment directory as working directory.

use super::stats::{parse_stats, ResourceUsage};
use crate::config::DeploymentConfig;
use crate::error::{Result, StevedoreError};
use crate::monitor::{Service, ServiceStatusProvider};
use crate::supervisor::Orchestrator;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{ExitStatus, Output, Stdio};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Candidate compose commands, in order of preference
const COMPOSE_COMMANDS: &[(&str, &[&str])] = &[("docker-compose", &[]), ("docker", &["compose"])];

/// Lines of command output kept in error messages
const ERROR_TAIL_LINES: usize = 20;

/// Driver for the compose command line tool
#[derive(Debug, Clone)]
pub struct ComposeCli {
    program: String,
    base_args: Vec<String>,
    project_dir: PathBuf,
    log_file: PathBuf,
    log_tail: usize,
}

impl ComposeCli {
    /// Find a working compose command on this machine
    pub async fn detect(config: &DeploymentConfig) -> Result<Self> {
        for (program, base_args) in COMPOSE_COMMANDS {
            let available = Command::new(program)
                .args(*base_args)
                .arg("version")
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map(|status| status.success())
                .unwrap_or(false);

            if available {
                let cli = Self::with_command(program, base_args, config);
                tracing::debug!("Using {}", cli.display(&[]));
                return Ok(cli);
            }
        }

        Err(StevedoreError::MissingDependency(
            "docker-compose (or the docker compose plugin) is not installed".to_string(),
        ))
    }

    /// Use an explicit program and leading arguments
    pub fn with_command(program: &str, base_args: &[&str], config: &DeploymentConfig) -> Self {
        Self {
            program: program.to_string(),
            base_args: base_args.iter().map(|s| s.to_string()).collect(),
            project_dir: config.project_dir.clone(),
            log_file: config.log_file.clone(),
            log_tail: config.log_tail,
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.base_args)
            .args(args)
            .current_dir(&self.project_dir)
            .kill_on_drop(true);
        cmd
    }

    fn display(&self, args: &[&str]) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.base_args.iter().map(String::as_str))
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ")
    }

    async fn run(&self, args: &[&str]) -> Result<Output> {
        self.command(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| StevedoreError::Command(format!("failed to run {}: {}", self.display(args), e)))
    }

    async fn run_checked(&self, args: &[&str]) -> Result<String> {
        let output = self.run(args).await?;

        if !output.status.success() {
            return Err(StevedoreError::Command(format!(
                "{} exited with {}: {}",
                self.display(args),
                output.status,
                tail(&String::from_utf8_lossy(&output.stderr), ERROR_TAIL_LINES)
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Bring the deployment up in the background.
    ///
    /// The command output is written to the transient log file.
    pub async fn up(&self) -> Result<()> {
        let args = ["up", "-d"];
        tracing::info!("Running {}", self.display(&args));

        let output = self
            .run(&args)
            .await
            .map_err(|e| StevedoreError::StartFailed(e.to_string()))?;

        self.write_log(&args, &output).await;

        if !output.status.success() {
            return Err(StevedoreError::StartFailed(format!(
                "{} exited with {}: {}",
                self.display(&args),
                output.status,
                tail(&String::from_utf8_lossy(&output.stderr), ERROR_TAIL_LINES)
            )));
        }

        Ok(())
    }

    /// Bring the deployment down
    pub async fn down(&self) -> Result<()> {
        tracing::info!("Running {}", self.display(&["down"]));
        self.run_checked(&["down"]).await.map(|_| ())
    }

    async fn list_services(&self, filter: &[&str]) -> Result<Vec<String>> {
        let mut args = vec!["ps", "--services"];
        args.extend_from_slice(filter);

        let stdout = self.run_checked(&args).await?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }

    /// Human-readable service table
    pub async fn ps_table(&self) -> Result<String> {
        self.run_checked(&["ps"]).await
    }

    /// Resource usage of the deployment's containers
    pub async fn resource_usage(&self) -> Result<Vec<ResourceUsage>> {
        let ids = self.run_checked(&["ps", "-q"]).await?;
        let ids: Vec<&str> = ids.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let output = Command::new("docker")
            .args(["stats", "--no-stream", "--format", "{{json .}}"])
            .args(&ids)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| StevedoreError::Command(format!("failed to run docker stats: {}", e)))?;

        if !output.status.success() {
            return Err(StevedoreError::Command(format!(
                "docker stats exited with {}: {}",
                output.status,
                tail(&String::from_utf8_lossy(&output.stderr), ERROR_TAIL_LINES)
            )));
        }

        parse_stats(&String::from_utf8_lossy(&output.stdout))
    }

    /// Stream the deployment's logs to the terminal until cancelled
    pub async fn follow_logs(&self, cancel: &CancellationToken) -> Result<()> {
        let tail_lines = self.log_tail.to_string();
        let args = ["logs", "-f", "--tail", tail_lines.as_str()];

        let mut child = self
            .command(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| StevedoreError::Command(format!("failed to run {}: {}", self.display(&args), e)))?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Stopped following logs");
                let _ = child.kill().await;
                Ok(())
            }
            status = child.wait() => {
                let status = status?;
                if status.success() || cancel.is_cancelled() || interrupted(&status) {
                    Ok(())
                } else {
                    Err(StevedoreError::Command(format!(
                        "{} exited with {}",
                        self.display(&args),
                        status
                    )))
                }
            }
        }
    }

    async fn write_log(&self, args: &[&str], output: &Output) {
        if let Some(parent) = self.log_file.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                tracing::warn!("Failed to create {}: {}", parent.display(), e);
                return;
            }
        }

        let mut content = format!("$ {}\n", self.display(args));
        content.push_str(&String::from_utf8_lossy(&output.stdout));
        content.push_str(&String::from_utf8_lossy(&output.stderr));

        if let Err(e) = tokio::fs::write(&self.log_file, content).await {
            tracing::warn!("Failed to write {}: {}", self.log_file.display(), e);
        }
    }
}

/// Whether a child ended because of an interrupt, either killed by a signal
/// or exiting with the shell convention 128 + SIGINT
fn interrupted(status: &ExitStatus) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if status.signal().is_some() {
            return true;
        }
    }

    status.code() == Some(130)
}

/// Last `lines` non-empty lines of command output
fn tail(text: &str, lines: usize) -> String {
    let kept: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if kept.is_empty() {
        return "no output".to_string();
    }
    kept[kept.len().saturating_sub(lines)..].join("\n")
}

#[async_trait]
impl ServiceStatusProvider for ComposeCli {
    async fn services(&self) -> Result<Vec<Service>> {
        let all = self.list_services(&[]).await?;
        let running = self
            .list_services(&["--filter", "status=running"])
            .await?;

        let mut services: Vec<Service> = all
            .iter()
            .map(|name| Service::new(name, running.contains(name)))
            .collect();

        for name in running.iter().filter(|name| !all.contains(name)) {
            services.push(Service::new(name, true));
        }

        Ok(services)
    }
}

#[async_trait]
impl Orchestrator for ComposeCli {
    async fn up(&self) -> Result<()> {
        ComposeCli::up(self).await
    }

    async fn down(&self) -> Result<()> {
        ComposeCli::down(self).await
    }
}
