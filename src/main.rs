use clap::Parser;
use regex::Regex;
use std::net::SocketAddr;
use wallet_presence::app::{self, Services};
use wallet_presence::config::{Cli, Settings};
use wallet_presence::error::{AppError, ConfigError};
use wallet_presence::hypr::HyprFocusSource;
use wallet_presence::idle::{SLEEP_STEP, TICK_INTERVAL};
use wallet_presence::logging::init_logging;
use wallet_presence::native_messaging::run_native_host;
use wallet_presence::ws::start_websocket_server;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_logging(cli.log.as_deref(), cli.verbose)?;

    let settings = Settings::load_or_default(cli.settings.as_deref())?;

    tracing::info!(
        event = "app.started",
        sleep_step_secs = SLEEP_STEP.as_secs(),
        tick_secs = TICK_INTERVAL.as_secs(),
        max_sleep = cli.max_sleep(&settings)
    );

    if cli.daemon {
        return run_daemon_mode(&cli, settings).await;
    }
    if cli.native_host {
        return run_native_host_mode(&cli, settings).await;
    }
    run_hypr_mode(&cli, settings).await
}

/// WebSocket server for the desktop/web front-end.
async fn run_daemon_mode(cli: &Cli, settings: Settings) -> Result<(), AppError> {
    let addr: SocketAddr = cli.listen.parse()?;
    let services = Services::start(cli, settings);

    let result = tokio::select! {
        result = start_websocket_server(addr, services.inbound_tx.clone(), services.events_tx.clone()) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(event = "app.shutdown_requested");
            Ok(())
        }
    };

    services.shutdown();
    result
}

/// Native messaging host for the browser extension; runs until stdin closes.
async fn run_native_host_mode(cli: &Cli, settings: Settings) -> Result<(), AppError> {
    let services = Services::start(cli, settings);
    let result = run_native_host(
        std::io::stdin(),
        std::io::stdout(),
        services.inbound_tx.clone(),
        services.events_tx.subscribe(),
    )
    .await;
    services.shutdown();
    Ok(result?)
}

/// Follows the wallet window under Hyprland and logs sleep/wake transitions.
async fn run_hypr_mode(cli: &Cli, settings: Settings) -> Result<(), AppError> {
    let pattern = Regex::new(&cli.window_match).map_err(ConfigError::from)?;
    tracing::info!(event = "app.hypr.watching", pattern = %cli.window_match);

    let idle = app::spawn_idle_tracker(HyprFocusSource::new(pattern), cli.max_sleep(&settings));
    let logger = tokio::spawn(app::log_signals(idle.signals));

    tokio::select! {
        _ = idle.task => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(event = "app.shutdown_requested");
        }
    }
    logger.abort();
    Ok(())
}
