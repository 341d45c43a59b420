mod bootstrap;
mod console;
mod health;
mod sweeper;

use std::time::Duration;

use anyhow::Result;
use gradedesk_core::config::{AppConfig, LoadOptions, TransportMode};
use tracing_subscriber::EnvFilter;

use crate::health::HealthState;

fn init_logging(config: &AppConfig) {
    use gradedesk_core::config::LogFormat::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    let builder = tracing_subscriber::fmt().with_target(false).with_env_filter(filter);

    // Replies go to stdout in console mode; keep logs off it.
    let to_stderr = config.transport.mode == TransportMode::Console;
    match (config.logging.format, to_stderr) {
        (Compact, false) => builder.compact().init(),
        (Compact, true) => builder.compact().with_writer(std::io::stderr).init(),
        (Pretty, false) => builder.pretty().init(),
        (Pretty, true) => builder.pretty().with_writer(std::io::stderr).init(),
        (Json, false) => builder.json().init(),
        (Json, true) => builder.json().with_writer(std::io::stderr).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        HealthState::new(app.db_pool.clone(), app.sessions.clone()),
    )
    .await?;

    let sweeper = sweeper::spawn(
        app.sessions.clone(),
        Duration::from_secs(app.config.sessions.sweep_interval_secs),
    );

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        transport_mode = ?app.config.transport.mode,
        "gradedesk-server started"
    );

    app.runner.start().await?;

    // The console stream ending is the shutdown signal in console mode.
    if app.config.transport.mode != TransportMode::Console {
        wait_for_shutdown().await?;
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "gradedesk-server stopping"
    );
    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    app.db_pool.close().await;

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
