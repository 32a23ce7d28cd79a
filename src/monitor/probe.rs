//! Port probing
//!
//! A port counts as open when either a raw TCP connect succeeds or an HTTP
//! request to its root answers with one of [`READY_STATUS_CODES`].

use crate::error::Result;
use async_trait::async_trait;
use reqwest::redirect::Policy;
use std::time::Duration;
use tokio::net::TcpStream;

/// HTTP status codes accepted as a live endpoint
pub const READY_STATUS_CODES: &[u16] = &[200, 301, 302];

/// Host/port pair checked for readiness
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortTarget {
    pub host: String,
    pub port: u16,
}

impl PortTarget {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
        }
    }
}

impl std::fmt::Display for PortTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Checks whether a port answers
#[async_trait]
pub trait PortProbe: Send + Sync {
    async fn probe(&self, host: &str, port: u16) -> bool;
}

/// Probe strategy, tried in the order configured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStrategy {
    /// Raw TCP connect
    Tcp,
    /// `GET http://host:port/` with an accepted status code
    Http,
}

/// Probe that talks to the network
pub struct NetworkProbe {
    strategies: Vec<ProbeStrategy>,
    client: reqwest::Client,
    timeout: Duration,
}

impl NetworkProbe {
    /// Probe trying TCP first, then HTTP
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_strategies(&[ProbeStrategy::Tcp, ProbeStrategy::Http], timeout)
    }

    /// Probe restricted to the given strategies. An empty list never succeeds.
    pub fn with_strategies(strategies: &[ProbeStrategy], timeout: Duration) -> Result<Self> {
        // Redirects must surface as 301/302 instead of being followed
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .no_proxy()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            strategies: strategies.to_vec(),
            client,
            timeout,
        })
    }

    async fn tcp_connect(&self, host: &str, port: u16) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!("TCP connect to {}:{} failed: {}", host, port, e);
                false
            }
            Err(_) => {
                tracing::debug!("TCP connect to {}:{} timed out", host, port);
                false
            }
        }
    }

    async fn http_status(&self, host: &str, port: u16) -> bool {
        let url = format!("http://{}:{}/", host, port);

        match self.client.get(&url).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                tracing::debug!("GET {} answered {}", url, status);
                READY_STATUS_CODES.contains(&status)
            }
            Err(e) => {
                tracing::debug!("GET {} failed: {}", url, e);
                false
            }
        }
    }
}

#[async_trait]
impl PortProbe for NetworkProbe {
    async fn probe(&self, host: &str, port: u16) -> bool {
        for strategy in &self.strategies {
            let open = match strategy {
                ProbeStrategy::Tcp => self.tcp_connect(host, port).await,
                ProbeStrategy::Http => self.http_status(host, port).await,
            };

            if open {
                return true;
            }
        }

        false
    }
}
