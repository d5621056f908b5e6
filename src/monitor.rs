//! # Monitoring Loop Module
//!
//! The core acquisition cycle and the loop around it. One cycle is:
//! timestamp capture, sensor acquisition with bounded retry, whole-unit
//! shared-state update, conditional log append per the rotation policy,
//! rotation-state update, display refresh. The loop then sleeps for the
//! acquisition interval — the dominant suspension point of the process.
//!
//! A failed cycle is logged and contained: the loop continues on the next
//! iteration and shared state keeps whichever fields the cycle actually
//! produced. Cycle N's effects are fully ordered before cycle N+1 begins.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::clock::ClockSource;
use crate::display::{render_panel, DisplayDevice};
use crate::error::Result;
use crate::rotation::{RotationPolicy, RotationState};
use crate::sensor::{Acquisition, Co2Sensor};
use crate::state::SharedState;
use crate::storage::LogStore;

/// Timing and presentation parameters for the loop, read once at startup.
pub struct MonitorSettings {
    /// Sleep between cycles
    pub cycle_interval: Duration,
    /// Data-ready poll budget per cycle
    pub max_retries: u32,
    /// Sleep between data-ready polls
    pub retry_delay: Duration,
    /// Address line shown on the display panel
    pub address: String,
}

/// The monitoring loop task.
///
/// Owns the sensor, the display, and the rotation state exclusively;
/// shares only [`SharedState`] with the other tasks.
pub struct MonitorLoop<S: Co2Sensor, D: DisplayDevice> {
    sensor: S,
    display: D,
    clock: Arc<dyn ClockSource>,
    store: LogStore,
    policy: RotationPolicy,
    state: Arc<SharedState>,
    rotation: RotationState,
    acquisition: Acquisition,
    settings: MonitorSettings,
}

impl<S: Co2Sensor, D: DisplayDevice> MonitorLoop<S, D> {
    pub fn new(
        sensor: S,
        display: D,
        clock: Arc<dyn ClockSource>,
        store: LogStore,
        policy: RotationPolicy,
        state: Arc<SharedState>,
        settings: MonitorSettings,
    ) -> Self {
        let acquisition = Acquisition::new(settings.max_retries, settings.retry_delay);
        Self {
            sensor,
            display,
            clock,
            store,
            policy,
            state,
            rotation: RotationState::new(),
            acquisition,
            settings,
        }
    }

    /// Run the loop until the process terminates.
    pub async fn run(mut self) {
        info!(
            "Starting CO2 monitor loop (interval {:?})",
            self.settings.cycle_interval
        );
        loop {
            if let Err(e) = self.run_cycle().await {
                warn!("Cycle failed: {} (continuing next cycle)", e);
            }
            sleep(self.settings.cycle_interval).await;
        }
    }

    /// Run one acquisition cycle.
    ///
    /// # Errors
    ///
    /// Sensor I/O faults and log-write faults fail the cycle; the caller
    /// contains them. A cycle that fails before acquiring leaves shared
    /// state untouched.
    pub async fn run_cycle(&mut self) -> Result<()> {
        let now = self.clock.now();
        debug!("Cycle timestamp: {}", now);

        let reading = self.acquisition.acquire(&mut self.sensor, now).await?;
        if reading.valid {
            info!("CO2: {} ppm", reading.co2_ppm);
        } else {
            warn!(
                "Sensor poll timed out; using last register value {} ppm",
                reading.co2_ppm
            );
        }

        // Whole-unit replace, no suspension between acquire and publish
        self.state.publish_reading(reading);

        if self.policy.is_due(&now, &self.rotation) {
            let key = self.policy.route(&now);
            let filename = key.filename();
            self.store.ensure_log_file(&filename).await?;
            self.store
                .append_reading(&filename, &now.to_string(), reading.co2_ppm)
                .await?;
            self.rotation.record_write(key, &now);
            debug!("Logged {} ppm to {}", reading.co2_ppm, filename);
        }

        let panel = render_panel(Some(reading.co2_ppm), &self.settings.address);
        self.display.show(&panel).await?;

        Ok(())
    }
}
