//! Stevedore - a supervisor for a single docker-compose deployment
//!
//! Stevedore drives `docker-compose` (or the `docker compose` plugin) through
//! the lifecycle of one deployment and keeps an eye on it afterwards:
//!
//! - Start, stop and restart the deployment
//! - Poll until every service runs and the target port answers
//! - Watch for crashes and exit when nothing is running anymore
//! - Clean up on SIGINT/SIGTERM/SIGQUIT

pub mod compose;
pub mod config;
pub mod error;
pub mod monitor;
pub mod supervisor;

pub use config::DeploymentConfig;
pub use error::{Result, StevedoreError};
pub use supervisor::{Orchestrator, Supervisor};
