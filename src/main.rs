//! Stevedore - a supervisor for a single docker-compose deployment
//!
//! This is the main CLI entry point for Stevedore.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use stevedore::compose::{stats, ComposeCli};
use stevedore::monitor::{NetworkProbe, TokioClock};
use stevedore::supervisor::stop_deployment;
use stevedore::{DeploymentConfig, Supervisor};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Stevedore - docker-compose deployment supervisor
#[derive(Parser)]
#[command(name = "stevedore")]
#[command(author = "Evoker Industries")]
#[command(version)]
#[command(
    about = "Start, watch and stop a docker-compose deployment",
    long_about = None
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy, Default)]
enum Commands {
    /// Start the deployment and watch it for crashes (default)
    #[default]
    Start,
    /// Stop the deployment
    Stop,
    /// Stop, then start the deployment and watch it for crashes
    Restart,
    /// Show services, resource usage and the access URL
    Status,
    /// Follow the deployment logs
    Logs,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version requests are not failures
            let code = if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
            let _ = e.print();
            return code;
        }
    };

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(cli.command.unwrap_or_default()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> anyhow::Result<()> {
    let config = DeploymentConfig::from_env().context("failed to load configuration")?;
    let compose = ComposeCli::detect(&config).await?;

    match command {
        Commands::Start | Commands::Restart => {
            let cancel = CancellationToken::new();
            listen_for_shutdown(cancel.clone())?;

            let probe = NetworkProbe::new(config.probe_timeout)
                .context("failed to build port probe")?;
            let supervisor = Supervisor::new(config, compose, probe, TokioClock);

            if matches!(command, Commands::Restart) {
                supervisor.restart(&cancel).await?;
            } else {
                supervisor.start(&cancel).await?;
            }
        }

        Commands::Stop => {
            stop_deployment(&config, &compose).await;
        }

        Commands::Status => {
            println!("Services:");
            match compose.ps_table().await {
                Ok(table) => print!("{}", table),
                Err(e) => tracing::warn!("Failed to list services: {}", e),
            }

            println!();
            println!("Resource usage:");
            match compose.resource_usage().await {
                Ok(rows) if rows.is_empty() => println!("No running containers"),
                Ok(rows) => print!("{}", stats::render_table(&rows)),
                Err(e) => tracing::warn!("Failed to read resource usage: {}", e),
            }

            println!();
            println!("Access URL: {}", config.access_url());
        }

        Commands::Logs => {
            let cancel = CancellationToken::new();
            listen_for_shutdown(cancel.clone())?;
            compose.follow_logs(&cancel).await?;
        }
    }

    Ok(())
}

/// Exit code when a second signal abandons cleanup
const FORCE_QUIT_EXIT_CODE: i32 = 1;

/// Cancel `token` on the first signal received, then wait for another.
///
/// Returns the name of the second signal, or `None` once the sender is gone.
async fn relay_signals(
    mut signals: mpsc::Receiver<&'static str>,
    token: CancellationToken,
) -> Option<&'static str> {
    let first = signals.recv().await?;
    tracing::info!("Received {}, cleaning up (repeat to force quit)", first);
    token.cancel();

    signals.recv().await
}

/// Cancel `token` on SIGINT, SIGTERM or SIGQUIT; a second signal exits at once
fn listen_for_shutdown(token: CancellationToken) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::channel(4);
    forward_signals(tx)?;

    tokio::spawn(async move {
        if let Some(name) = relay_signals(rx, token).await {
            tracing::error!("Received {} again, exiting without cleanup", name);
            std::process::exit(FORCE_QUIT_EXIT_CODE);
        }
    });

    Ok(())
}

#[cfg(unix)]
fn forward_signals(tx: mpsc::Sender<&'static str>) -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt =
        signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;
    let mut terminate =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    let mut quit = signal(SignalKind::quit()).context("failed to install SIGQUIT handler")?;

    tokio::spawn(async move {
        loop {
            let name = tokio::select! {
                _ = interrupt.recv() => "SIGINT",
                _ = terminate.recv() => "SIGTERM",
                _ = quit.recv() => "SIGQUIT",
            };
            if tx.send(name).await.is_err() {
                break;
            }
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn forward_signals(tx: mpsc::Sender<&'static str>) -> anyhow::Result<()> {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send("Ctrl-C").await.is_err() {
                break;
            }
        }
    });

    Ok(())
}
