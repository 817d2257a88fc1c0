//! dbcell: drive database containers from the command line.
//!
//! ## Commands
//!
//! - `exec`: run a command in a container and print its outcome as JSON
//! - `wait-ready`: block until a container's health check passes
//! - `mounts`: print the mounts that expose a data directory
//! - `logs`: print the container's recent logs
//!
//! Ctrl-C cancels the running operation and exits with status 130.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dbcell::{
    ContainerRef, ContainerSupervisor, DbcellError, DockerOptions, ExecSpec, HostEnvironment,
    LoggingOptions, SupervisorOptions, init_logging,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

const EXIT_CANCELLED: u8 = 130;

// ============================================================================
// CLI Types
// ============================================================================

#[derive(Parser)]
#[command(name = "dbcell")]
#[command(about = "Exec supervision and readiness checks for database containers")]
struct Cli {
    /// Docker endpoint (overrides DBCELL_DOCKER_HOST and DOCKER_HOST)
    #[arg(long, global = true)]
    docker_host: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a command and print {"exit_code", "stdout"} on success
    Exec {
        /// Container ID or name
        container: String,

        /// User to run the command as
        #[arg(long)]
        user: Option<String>,

        /// Allocate a pseudo-terminal
        #[arg(long)]
        tty: bool,

        /// Environment variable, KEY=VALUE (repeatable)
        #[arg(long = "env", value_parser = parse_env_var)]
        env: Vec<(String, String)>,

        /// Attach recent container logs to a non-zero exit
        #[arg(long)]
        foreground: bool,

        /// Start without attaching; only the exit code is checked
        #[arg(long, conflicts_with = "foreground")]
        detach: bool,

        /// Command and arguments
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },

    /// Wait until the container's health check reports healthy
    WaitReady {
        /// Container ID or name
        container: String,
    },

    /// Print the mounts a database container needs for DATA_DIR
    Mounts {
        /// Absolute data directory path, as seen by this process
        data_dir: PathBuf,
    },

    /// Print the container's recent logs
    Logs {
        /// Container ID or name
        container: String,
    },
}

fn parse_env_var(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {:?}", raw)),
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&LoggingOptions::default()) {
        eprintln!("Warning: failed to initialize logging: {}", e);
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    match run(cli, &cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            let cancelled = e
                .downcast_ref::<DbcellError>()
                .is_some_and(|e| e.is_cancelled());
            if cancelled {
                ExitCode::from(EXIT_CANCELLED)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(cli: Cli, cancel: &CancellationToken) -> Result<()> {
    let mut docker = DockerOptions::from_env()?;
    if cli.docker_host.is_some() {
        docker.host = cli.docker_host;
    }
    let supervisor = ContainerSupervisor::docker(&docker, SupervisorOptions::default())
        .context("Failed to connect to Docker")?;

    match cli.command {
        Commands::Exec {
            container,
            user,
            tty,
            env,
            foreground,
            detach,
            command,
        } => {
            let container = ContainerRef::new(container);
            let mut spec = ExecSpec::from_argv(command)?.tty(tty);
            if let Some(user) = user {
                spec = spec.user(user);
            }
            for (key, value) in env {
                spec = spec.env(key, value);
            }

            if detach {
                supervisor.run_detached(&container, spec, cancel).await?;
                return Ok(());
            }

            let outcome = if foreground {
                supervisor.execute_foreground(&container, spec, cancel).await?
            } else {
                supervisor.execute(&container, spec, cancel).await?
            };
            let json = serde_json::json!({
                "exit_code": outcome.exit_code,
                "stdout": outcome.stdout_str(),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }

        Commands::WaitReady { container } => {
            supervisor
                .wait_ready(&ContainerRef::new(container), cancel)
                .await?;
        }

        Commands::Mounts { data_dir } => {
            let host = HostEnvironment::detect()?;
            let mounts = supervisor.compute_mounts(&data_dir, &host).await?;
            println!("{}", serde_json::to_string_pretty(&mounts)?);
        }

        Commands::Logs { container } => {
            let logs = supervisor
                .recent_logs(&ContainerRef::new(container), cancel)
                .await?;
            print!("{}", logs);
        }
    }

    Ok(())
}
