//! Deployment supervisor
//!
//! Runs the lifecycle of one deployment: start it, wait until it is ready,
//! then watch it for crashes. Cancellation (normally from a signal) at any
//! point of a start, including while `up` runs, triggers
//! [`Supervisor::shutdown`].

use crate::compose::ComposeManifest;
use crate::config::DeploymentConfig;
use crate::error::{Result, StevedoreError};
use crate::monitor::{
    Clock, CrashWatchdog, PortProbe, PortTarget, Readiness, ReadinessMonitor,
    ServiceStatusProvider, WatchOutcome,
};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Something that can bring a deployment up and down
#[async_trait]
pub trait Orchestrator: ServiceStatusProvider {
    async fn up(&self) -> Result<()>;
    async fn down(&self) -> Result<()>;
}

/// Bring a deployment down.
///
/// Best effort: a missing directory or manifest is only a warning and a
/// failing stop is logged, never returned.
pub async fn stop_deployment<O>(config: &DeploymentConfig, orchestrator: &O)
where
    O: Orchestrator + ?Sized,
{
    let dir = &config.project_dir;
    if !dir.is_dir() {
        tracing::warn!(
            "Deployment directory {} not found, attempting best-effort stop",
            dir.display()
        );
    } else if ComposeManifest::find_compose_file(dir).is_none() {
        tracing::warn!(
            "No compose manifest in {}, attempting best-effort stop",
            dir.display()
        );
    }

    match orchestrator.down().await {
        Ok(()) => tracing::info!("Deployment stopped"),
        Err(e) => tracing::warn!("Best-effort stop failed: {}", e),
    }
}

/// Deployment supervisor
pub struct Supervisor<O, P, C> {
    config: DeploymentConfig,
    orchestrator: O,
    probe: P,
    clock: C,
}

impl<O, P, C> Supervisor<O, P, C>
where
    O: Orchestrator,
    P: PortProbe,
    C: Clock,
{
    pub fn new(config: DeploymentConfig, orchestrator: O, probe: P, clock: C) -> Self {
        Self {
            config,
            orchestrator,
            probe,
            clock,
        }
    }

    pub fn config(&self) -> &DeploymentConfig {
        &self.config
    }

    pub fn orchestrator(&self) -> &O {
        &self.orchestrator
    }

    /// Start the deployment and supervise it until it crashes or `cancel` fires
    pub async fn start(&self, cancel: &CancellationToken) -> Result<()> {
        let manifest = ComposeManifest::load(&self.config.project_dir)?;
        tracing::info!(
            "Starting deployment from {} ({} services declared)",
            manifest.path.display(),
            manifest.services.len()
        );

        let started = tokio::select! {
            biased;
            _ = cancel.cancelled() => return self.shutdown().await,
            started = self.orchestrator.up() => started,
        };

        if let Err(e) = started {
            // An interrupt also kills the compose child, so its failure is expected
            if cancel.is_cancelled() {
                tracing::warn!("Start interrupted: {}", e);
                return self.shutdown().await;
            }
            return Err(e);
        }

        let target = PortTarget::new(&self.config.host, self.config.port);
        let monitor = ReadinessMonitor::new(&self.orchestrator, &self.probe, &self.clock);

        let readiness = tokio::select! {
            biased;
            _ = cancel.cancelled() => return self.shutdown().await,
            readiness = monitor.await_ready(
                self.config.max_attempts,
                self.config.ready_interval,
                &target,
            ) => readiness,
        };

        match readiness {
            Readiness::Ready { attempts } => tracing::info!(
                "Deployment ready after {} attempt(s), available at {}",
                attempts,
                self.config.access_url()
            ),
            Readiness::DegradedTimeout { attempts } => tracing::warn!(
                "Deployment not ready after {} attempts, continuing to monitor",
                attempts
            ),
        }

        let watchdog = CrashWatchdog::new(&self.orchestrator, &self.clock);
        match watchdog.watch(self.config.watch_interval, cancel).await {
            WatchOutcome::Cancelled => self.shutdown().await,
            WatchOutcome::Crashed { polls, services } => Err(StevedoreError::CrashDetected(
                format!(
                    "no services running after {} poll(s) (services: {})",
                    polls,
                    if services.is_empty() {
                        "none".to_string()
                    } else {
                        services.join(", ")
                    }
                ),
            )),
        }
    }

    /// Bring the deployment down, see [`stop_deployment`]
    pub async fn stop(&self) {
        stop_deployment(&self.config, &self.orchestrator).await;
    }

    /// Stop, then start and supervise
    pub async fn restart(&self, cancel: &CancellationToken) -> Result<()> {
        tracing::info!("Restarting deployment");
        self.stop().await;
        self.start(cancel).await
    }

    /// Cleanup after cancellation: stop the deployment and drop the
    /// transient log file
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Shutting down");
        self.stop().await;

        match tokio::fs::remove_file(&self.config.log_file).await {
            Ok(()) => tracing::debug!("Removed {}", self.config.log_file.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to remove {}: {}",
                self.config.log_file.display(),
                e
            ),
        }

        tracing::info!("Cleanup complete");
        Ok(())
    }
}
