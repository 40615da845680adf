//! Claims API command-line client
//!
//! Single binary that:
//! 1. Loads the gateway configuration (TOML + env overrides)
//! 2. Opens the persisted session file
//! 3. Runs one command (login, logout, status, request) through the gateway
//! 4. Exits with a status that tells scripts what happened

mod cli;
mod commands;
mod config;
mod metrics;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use claims_auth::CredentialStore;
use claims_gateway::{Gateway, http_client};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};
use crate::config::Config;

#[tokio::main]
async fn main() -> ExitCode {
    // JSON logs on stderr so stdout carries only response bodies
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version also arrive here and are not failures
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(commands::EXIT_FAILURE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("error: {e:#}");
            ExitCode::from(commands::EXIT_FAILURE)
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let metrics_handle = if cli.print_metrics {
        Some(metrics::install_recorder()?)
    } else {
        None
    };

    let source = Config::resolve_path(cli.config.as_deref());
    let config = Config::load(&source)
        .with_context(|| format!("failed to load config from {}", source.path.display()))?;
    debug!(
        base_url = %config.api.base_url,
        timeout_secs = config.api.timeout_secs,
        "configuration loaded"
    );

    let store = CredentialStore::load(config.auth.credentials_path.clone())
        .await
        .with_context(|| {
            format!(
                "failed to open session file {}",
                config.auth.credentials_path.display()
            )
        })?;
    let client = http_client(config.timeout()).context("failed to build HTTP client")?;
    let gateway = Gateway::new(client, config.endpoints(), Arc::new(store));

    let code = match cli.command {
        Command::Login {
            username,
            password_file,
        } => commands::login(&gateway, &username, password_file.as_deref()).await?,
        Command::Logout => commands::logout(&gateway).await?,
        Command::Status => commands::status(&gateway).await?,
        Command::Request { method, path, body } => {
            commands::request(&gateway, method, &path, body, &mut std::io::stdout().lock())
                .await?
        }
    };

    if let Some(handle) = metrics_handle {
        eprint!("{}", handle.render());
    }

    Ok(code)
}
