//! Readiness monitor
//!
//! Polls the deployment after a start until every service runs and the
//! target port answers, or until the attempt budget runs out. Running out of
//! attempts is not an error: the caller keeps going in degraded mode.

use super::probe::{PortProbe, PortTarget};
use super::{Clock, ServiceCounts, ServiceStatusProvider};
use std::time::Duration;

/// Outcome of a readiness wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Everything came up on the given attempt
    Ready { attempts: u32 },
    /// The budget ran out; monitoring continues best effort
    DegradedTimeout { attempts: u32 },
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready { .. })
    }
}

/// Attempt following a failed one, or `None` once the budget is spent
fn next_attempt(attempt: u32, max_attempts: u32) -> Option<u32> {
    (attempt < max_attempts).then(|| attempt + 1)
}

enum PollState {
    Polling { attempt: u32 },
    Done(Readiness),
}

/// Readiness monitor
pub struct ReadinessMonitor<'a> {
    provider: &'a dyn ServiceStatusProvider,
    probe: &'a dyn PortProbe,
    clock: &'a dyn Clock,
}

impl<'a> ReadinessMonitor<'a> {
    pub fn new(
        provider: &'a dyn ServiceStatusProvider,
        probe: &'a dyn PortProbe,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            provider,
            probe,
            clock,
        }
    }

    /// Poll up to `max_attempts` times, `interval` apart, until the
    /// deployment is fully running and `target` answers.
    pub async fn await_ready(
        &self,
        max_attempts: u32,
        interval: Duration,
        target: &PortTarget,
    ) -> Readiness {
        let mut state = if max_attempts == 0 {
            PollState::Done(Readiness::DegradedTimeout { attempts: 0 })
        } else {
            PollState::Polling { attempt: 1 }
        };

        loop {
            state = match state {
                PollState::Done(readiness) => return readiness,
                PollState::Polling { attempt } => {
                    if self.attempt(attempt, max_attempts, target).await {
                        PollState::Done(Readiness::Ready { attempts: attempt })
                    } else {
                        match next_attempt(attempt, max_attempts) {
                            Some(next) => {
                                self.clock.sleep(interval).await;
                                PollState::Polling { attempt: next }
                            }
                            None => PollState::Done(Readiness::DegradedTimeout {
                                attempts: max_attempts,
                            }),
                        }
                    }
                }
            };
        }
    }

    async fn attempt(&self, attempt: u32, max_attempts: u32, target: &PortTarget) -> bool {
        let services = match self.provider.services().await {
            Ok(services) => services,
            Err(e) => {
                tracing::warn!(
                    "Attempt {}/{}: failed to query services: {}",
                    attempt,
                    max_attempts,
                    e
                );
                return false;
            }
        };

        let counts = ServiceCounts::from_services(&services);
        tracing::info!(
            "Attempt {}/{}: {}/{} services running",
            attempt,
            max_attempts,
            counts.running,
            counts.total
        );

        if !counts.all_running() {
            return false;
        }

        let open = self.probe.probe(&target.host, target.port).await;
        if !open {
            tracing::debug!("Port {} not answering yet", target);
        }
        open
    }
}
