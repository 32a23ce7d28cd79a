//! Crash watchdog

use super::{Clock, ServiceCounts, ServiceStatusProvider};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Why the watchdog stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    /// No service was running on poll number `polls`
    Crashed { polls: u64, services: Vec<String> },
    /// The cancellation token fired
    Cancelled,
}

enum WatchState {
    Watching { poll: u64 },
    Finished(WatchOutcome),
}

/// Polls the deployment until nothing runs anymore or it is cancelled.
///
/// There is no successful terminal state: the loop only ends on a crash or
/// on cancellation.
pub struct CrashWatchdog<'a> {
    provider: &'a dyn ServiceStatusProvider,
    clock: &'a dyn Clock,
}

impl<'a> CrashWatchdog<'a> {
    pub fn new(provider: &'a dyn ServiceStatusProvider, clock: &'a dyn Clock) -> Self {
        Self { provider, clock }
    }

    pub async fn watch(&self, poll_interval: Duration, cancel: &CancellationToken) -> WatchOutcome {
        let mut state = WatchState::Watching { poll: 1 };

        loop {
            state = match state {
                WatchState::Finished(outcome) => return outcome,
                WatchState::Watching { .. } if cancel.is_cancelled() => {
                    WatchState::Finished(WatchOutcome::Cancelled)
                }
                WatchState::Watching { poll } => match self.provider.services().await {
                    Ok(services) if !ServiceCounts::from_services(&services).any_running() => {
                        tracing::error!("No services running on poll {}", poll);
                        WatchState::Finished(WatchOutcome::Crashed {
                            polls: poll,
                            services: services.into_iter().map(|s| s.name).collect(),
                        })
                    }
                    Ok(services) => {
                        let counts = ServiceCounts::from_services(&services);
                        tracing::debug!(
                            "Poll {}: {}/{} services running",
                            poll,
                            counts.running,
                            counts.total
                        );
                        self.pause(poll, poll_interval, cancel).await
                    }
                    Err(e) => {
                        tracing::warn!("Poll {}: failed to query services: {}", poll, e);
                        self.pause(poll, poll_interval, cancel).await
                    }
                },
            };
        }
    }

    async fn pause(&self, poll: u64, interval: Duration, cancel: &CancellationToken) -> WatchState {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => WatchState::Finished(WatchOutcome::Cancelled),
            _ = self.clock.sleep(interval) => WatchState::Watching { poll: poll + 1 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::fakes::{services, RecordingClock, ScriptedProvider};

    const INTERVAL: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn test_crash_on_first_poll_without_running_services() {
        let provider = ScriptedProvider::new(vec![
            Some(services(&[("web", true), ("db", true)])),
            Some(services(&[("web", false), ("db", true)])),
            Some(services(&[("web", false), ("db", false)])),
            Some(services(&[("web", true), ("db", true)])),
        ]);
        let clock = RecordingClock::new();
        let cancel = CancellationToken::new();

        let watchdog = CrashWatchdog::new(&provider, &clock);
        let outcome = watchdog.watch(INTERVAL, &cancel).await;

        assert_eq!(
            outcome,
            WatchOutcome::Crashed {
                polls: 3,
                services: vec!["web".to_string(), "db".to_string()],
            }
        );
        assert_eq!(provider.polls(), 3);
        assert_eq!(clock.sleeps(), vec![INTERVAL; 2]);
    }

    #[tokio::test]
    async fn test_empty_deployment_is_a_crash() {
        let provider = ScriptedProvider::constant(Vec::new());
        let clock = RecordingClock::new();
        let cancel = CancellationToken::new();

        let outcome = CrashWatchdog::new(&provider, &clock)
            .watch(INTERVAL, &cancel)
            .await;

        assert!(matches!(outcome, WatchOutcome::Crashed { polls: 1, .. }));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_poll() {
        let provider = ScriptedProvider::constant(services(&[("web", true)]));
        let clock = RecordingClock::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = CrashWatchdog::new(&provider, &clock)
            .watch(INTERVAL, &cancel)
            .await;

        assert_eq!(outcome, WatchOutcome::Cancelled);
        assert_eq!(provider.polls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_while_sleeping() {
        let provider = ScriptedProvider::constant(services(&[("web", true)]));
        let cancel = CancellationToken::new();
        let clock = RecordingClock::cancelling_after(3, cancel.clone());

        let outcome = CrashWatchdog::new(&provider, &clock)
            .watch(INTERVAL, &cancel)
            .await;

        assert_eq!(outcome, WatchOutcome::Cancelled);
        assert_eq!(provider.polls(), 3);
    }

    #[tokio::test]
    async fn test_provider_failure_is_not_a_crash() {
        let provider = ScriptedProvider::new(vec![
            None,
            None,
            Some(services(&[("web", false)])),
        ]);
        let clock = RecordingClock::new();
        let cancel = CancellationToken::new();

        let outcome = CrashWatchdog::new(&provider, &clock)
            .watch(INTERVAL, &cancel)
            .await;

        assert!(matches!(outcome, WatchOutcome::Crashed { polls: 3, .. }));
    }
}
