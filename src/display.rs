//! # Display Refresher Module
//!
//! Formats the shared state into the small fixed-layout text panel shown
//! on the local display after each acquisition cycle.
//!
//! Formatting is a stateless pure function; pixel-level rendering belongs
//! to the [`DisplayDevice`] collaborator behind the trait. There is no
//! retry here — a device error propagates per the device's own contract
//! and the cycle logs it.

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;

/// Number of text lines on the panel.
pub const PANEL_LINES: usize = 2;

/// Render the two-line panel.
///
/// Line 1 shows the CO2 value or `--` before the first reading; line 2
/// shows the address/status string.
///
/// # Examples
///
/// ```
/// use co2_monitor::display::render_panel;
///
/// let panel = render_panel(Some(612), "192.168.1.23:8080");
/// assert_eq!(panel[0], "CO2: 612");
/// ```
pub fn render_panel(co2: Option<u16>, address: &str) -> [String; PANEL_LINES] {
    let value_line = match co2 {
        Some(ppm) => format!("CO2: {}", ppm),
        None => "CO2: --".to_string(),
    };
    [value_line, address.to_string()]
}

/// Trait for the display collaborator
#[async_trait]
pub trait DisplayDevice: Send {
    /// Render the panel lines on the device
    async fn show(&mut self, lines: &[String; PANEL_LINES]) -> Result<()>;
}

/// Display device that writes the panel to the log.
///
/// Stands in for the OLED on headless or bench runs; the OLED driver
/// implements the same trait on the device.
pub struct ConsoleDisplay;

#[async_trait]
impl DisplayDevice for ConsoleDisplay {
    async fn show(&mut self, lines: &[String; PANEL_LINES]) -> Result<()> {
        info!("[panel] {} | {}", lines[0], lines[1]);
        Ok(())
    }
}
