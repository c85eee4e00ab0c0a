// ABOUTME: Entry point for the cwal companion: settings persistence plus the SC:R web API client.
// ABOUTME: Loads config, starts the AppContext, and serves line commands from stdin until quit or a signal.

mod client;
mod commands;
mod config;
mod context;
mod download;
mod error;
mod host;
mod replay;
mod settings;
mod store;
#[cfg(test)]
mod test_support;

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use client::ScrClientFactory;
use commands::Command;
use config::Config;
use context::AppContext;
use host::SystemHost;

type DynError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tokio::select! {
        result = run() => {
            if let Err(e) = result {
                tracing::error!("Fatal: {e}");
                std::process::exit(1);
            }
        }
        _ = terminate() => {
            tracing::info!("Received SIGTERM, shutting down");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received SIGINT, shutting down");
        }
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!("Failed to register SIGTERM handler: {e}");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

async fn run() -> Result<(), DynError> {
    let config = Config::load()?;
    tracing::info!("Configuration loaded");

    let host = SystemHost::from_config(&config);
    let factory = ScrClientFactory::from_config(&config.scr_api);
    let ctx = AppContext::start(host, factory, config.initial_port());

    ctx.settings().wait_until_ready().await;
    match ctx.settings().settings_file() {
        Some(path) => tracing::info!("Settings file: {}", path.display()),
        None => tracing::warn!("No settings file location; changes stay in memory"),
    }

    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(config.scr_api.request_timeout_secs))
        .build()?;

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match commands::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                stdout.write_all(format!("{e}\n").as_bytes()).await?;
                stdout.flush().await?;
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        let output = commands::execute(&ctx, &http, command).await;
        stdout.write_all(format!("{output}\n").as_bytes()).await?;
        stdout.flush().await?;
    }

    tracing::info!("Shutting down");
    ctx.shutdown().await;
    Ok(())
}
