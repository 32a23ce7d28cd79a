//! Deployment monitoring
//!
//! Two polling loops watch a running deployment: the readiness monitor waits
//! for every service to come up after a start, and the crash watchdog keeps
//! polling afterwards until nothing is running anymore. Both read service
//! state through [`ServiceStatusProvider`] and suspend through [`Clock`], so
//! tests can drive them without containers or real time.

pub mod probe;
pub mod readiness;
pub mod watchdog;

#[cfg(test)]
pub(crate) mod fakes;

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub use probe::{NetworkProbe, PortProbe, PortTarget, ProbeStrategy};
pub use readiness::{Readiness, ReadinessMonitor};
pub use watchdog::{CrashWatchdog, WatchOutcome};

/// A service of the deployment as reported at query time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    /// Service name from the compose manifest
    pub name: String,
    /// Whether the service currently runs
    pub running: bool,
}

impl Service {
    pub fn new(name: &str, running: bool) -> Self {
        Self {
            name: name.to_string(),
            running,
        }
    }
}

/// Running and total service counts of one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceCounts {
    pub total: usize,
    pub running: usize,
}

impl ServiceCounts {
    pub fn from_services(services: &[Service]) -> Self {
        Self {
            total: services.len(),
            running: services.iter().filter(|s| s.running).count(),
        }
    }

    /// An empty deployment is never considered fully running
    pub fn all_running(&self) -> bool {
        self.total > 0 && self.running == self.total
    }

    pub fn any_running(&self) -> bool {
        self.running > 0
    }
}

/// Source of live service state for a deployment.
///
/// Implementations must query on every call; nothing is cached.
#[async_trait]
pub trait ServiceStatusProvider: Send + Sync {
    async fn services(&self) -> Result<Vec<Service>>;
}

/// Suspension point of the polling loops
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Clock backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
