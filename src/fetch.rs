//! # External Pollutant Fetch Module
//!
//! Low-frequency fetch of an outdoor PM2.5 index from an OpenAQ-style
//! API: once immediately at startup, then once per configured interval.
//!
//! A failed fetch is swallowed — the previous value stays published and
//! the next scheduled attempt retries. Only the shape of the upstream
//! JSON is known here (`results[0].latest.{value, datetime.local}`);
//! everything else about the API stays outside the core.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{MonitorError, Result};
use crate::state::{ExternalReading, SharedState};

/// Trait for the upstream pollutant data source
#[async_trait]
pub trait PollutantSource: Send + Sync {
    /// Fetch the latest pollutant measurement
    async fn fetch(&self) -> Result<ExternalReading>;
}

/// OpenAQ sensor endpoint client.
pub struct OpenAqSource {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl OpenAqSource {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl PollutantSource for OpenAqSource {
    async fn fetch(&self) -> Result<ExternalReading> {
        let response = self
            .client
            .get(&self.url)
            .header("X-API-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| MonitorError::Fetch(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(MonitorError::Fetch(format!(
                "unexpected status {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| MonitorError::Fetch(format!("invalid JSON body: {}", e)))?;

        parse_latest(&body)
            .ok_or_else(|| MonitorError::Fetch("no latest measurement in response".to_string()))
    }
}

/// Extract `results[0].latest` from an OpenAQ sensor response.
///
/// Returns `None` when the expected fields are absent; the value is
/// rounded to a whole µg/m³ as the dashboard displays it.
pub fn parse_latest(body: &Value) -> Option<ExternalReading> {
    let latest = body.get("results")?.get(0)?.get("latest")?;
    let value = latest.get("value")?.as_f64()?;
    let measured_at = latest.get("datetime")?.get("local")?.as_str()?;

    Some(ExternalReading {
        value: value.round().clamp(0.0, u16::MAX as f64) as u16,
        measured_at: measured_at.to_string(),
    })
}

/// Run one fetch attempt, publishing on success.
///
/// Returns whether the attempt succeeded. On failure the previously
/// published value is left untouched.
pub async fn fetch_once<S: PollutantSource + ?Sized>(source: &S, state: &SharedState) -> bool {
    match source.fetch().await {
        Ok(reading) => {
            info!(
                "PM2.5 updated: {} µg/m³ at {}",
                reading.value, reading.measured_at
            );
            state.publish_external(reading);
            true
        }
        Err(e) => {
            warn!("PM2.5 fetch failed: {} (retrying next interval)", e);
            false
        }
    }
}

/// Fetch loop task: fire once immediately, then once per `interval`.
///
/// Runs until the process terminates; every iteration's failure is
/// contained to that iteration.
pub async fn run_fetch_loop<S: PollutantSource>(
    source: S,
    state: Arc<SharedState>,
    interval: Duration,
) {
    info!("Starting PM2.5 fetch loop (interval {:?})", interval);
    loop {
        fetch_once(&source, &state).await;
        sleep(interval).await;
    }
}
