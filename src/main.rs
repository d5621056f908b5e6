//! # CO2 Monitor
//!
//! Continuously sample indoor CO2, log readings to rotating CSV files,
//! and serve a small web dashboard.
//!
//! Three cooperative tasks share one runtime thread: the acquisition
//! loop (sample, publish, log, refresh display), the low-frequency
//! PM2.5 fetch, and the HTTP responder. They communicate only through
//! [`SharedState`]; the loops sleep between iterations so the responder
//! stays responsive.

use std::env;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tracing::{info, warn};

use co2_monitor::clock::{ClockSource, SystemClock};
use co2_monitor::config::Config;
use co2_monitor::display::ConsoleDisplay;
use co2_monitor::fetch::{run_fetch_loop, OpenAqSource};
use co2_monitor::monitor::{MonitorLoop, MonitorSettings};
use co2_monitor::sensor::SimulatedCo2Sensor;
use co2_monitor::server::{self, ServerContext};
use co2_monitor::state::SharedState;
use co2_monitor::storage::LogStore;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Main entry point for the CO2 monitor
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Set up logging with tracing subscriber
///    - Load configuration (falling back to built-in defaults)
///    - Check the system clock and open the readings directory; either
///      failing is fatal
///
/// 2. **Main Loop**
///    - Run the acquisition loop, the PM2.5 fetch loop (if enabled),
///      and the dashboard server concurrently
///    - Handle Ctrl+C for graceful shutdown
///
/// # Errors
///
/// Returns error if:
/// - The system clock reports an implausible date (battery-backed RTC
///   lost its charge, or no time sync yet)
/// - The readings directory cannot be created
/// - The server cannot bind its address
#[actix_web::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("CO2 Monitor v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => {
            info!("Loaded configuration from {}", config_path);
            config
        }
        Err(e) => {
            warn!(
                "Could not load {}: {} (using built-in defaults)",
                config_path, e
            );
            Config::default()
        }
    };

    // Startup checks: a bad clock would route readings into wrong files,
    // a missing readings dir would fail every cycle
    let clock: Arc<dyn ClockSource> =
        Arc::new(SystemClock::new().context("system clock check failed")?);
    let store = LogStore::open(config.storage.readings_dir.clone())
        .await
        .with_context(|| format!("cannot open readings dir {}", config.storage.readings_dir))?;
    let state = Arc::new(SharedState::new());

    let address = format!("{}:{}", config.server.bind, config.server.port);
    let settings = MonitorSettings {
        cycle_interval: Duration::from_secs(config.sensor.acquisition_interval_s),
        max_retries: config.sensor.max_retries,
        retry_delay: Duration::from_millis(config.sensor.retry_delay_ms),
        address: address.clone(),
    };

    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(1);
    let monitor = MonitorLoop::new(
        SimulatedCo2Sensor::new(seed),
        ConsoleDisplay,
        clock.clone(),
        store.clone(),
        config.rotation_policy(),
        state.clone(),
        settings,
    );

    if config.fetch.enabled {
        let source = OpenAqSource::new(config.fetch.url.clone(), config.fetch.api_key.clone());
        tokio::spawn(run_fetch_loop(
            source,
            state.clone(),
            Duration::from_secs(config.fetch.interval_s),
        ));
    }

    let ctx = ServerContext {
        state: state.clone(),
        store: store.clone(),
        clock: clock.clone(),
    };

    info!("Dashboard at http://{}", address);
    info!("Press Ctrl+C to exit");

    tokio::select! {
        result = server::run_server(ctx, config.server.bind.clone(), config.server.port) => {
            result.context("web server terminated")?;
        }

        _ = monitor.run() => {}

        // Handle Ctrl+C for graceful shutdown
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    Ok(())
}
