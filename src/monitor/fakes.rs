//! Scripted collaborators for driving the monitor loops in tests

use super::{Clock, PortProbe, Service, ServiceStatusProvider};
use crate::error::{Result, StevedoreError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub fn services(entries: &[(&str, bool)]) -> Vec<Service> {
    entries
        .iter()
        .map(|(name, running)| Service::new(name, *running))
        .collect()
}

/// Replays one snapshot per poll, repeating the last one when exhausted.
/// `None` makes that poll fail.
pub struct ScriptedProvider {
    script: Vec<Option<Vec<Service>>>,
    polls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Option<Vec<Service>>>) -> Self {
        Self {
            script,
            polls: AtomicUsize::new(0),
        }
    }

    pub fn constant(services: Vec<Service>) -> Self {
        Self::new(vec![Some(services)])
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceStatusProvider for ScriptedProvider {
    async fn services(&self) -> Result<Vec<Service>> {
        let poll = self.polls.fetch_add(1, Ordering::SeqCst);
        self.script
            .get(poll)
            .or_else(|| self.script.last())
            .cloned()
            .flatten()
            .ok_or_else(|| StevedoreError::Command("scripted provider failure".to_string()))
    }
}

/// Replays one answer per probe, repeating the last one when exhausted
pub struct ScriptedProbe {
    answers: Vec<bool>,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new(answers: Vec<bool>) -> Self {
        Self {
            answers,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(open: bool) -> Self {
        Self::new(vec![open])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PortProbe for ScriptedProbe {
    async fn probe(&self, _host: &str, _port: u16) -> bool {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.answers
            .get(call)
            .or_else(|| self.answers.last())
            .copied()
            .unwrap_or(false)
    }
}

/// Records requested sleeps and returns immediately.
/// Optionally cancels a token once a given number of sleeps was requested.
#[derive(Default)]
pub struct RecordingClock {
    sleeps: Mutex<Vec<Duration>>,
    cancel_on: Option<(usize, CancellationToken)>,
}

impl RecordingClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancelling_after(sleeps: usize, token: CancellationToken) -> Self {
        Self {
            sleeps: Mutex::new(Vec::new()),
            cancel_on: Some((sleeps, token)),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for RecordingClock {
    async fn sleep(&self, duration: Duration) {
        let count = {
            let mut sleeps = self.sleeps.lock().unwrap();
            sleeps.push(duration);
            sleeps.len()
        };

        if let Some((after, token)) = &self.cancel_on {
            if count >= *after {
                token.cancel();
            }
        }

        tokio::task::yield_now().await;
    }
}
