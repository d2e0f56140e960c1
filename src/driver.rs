//! Core poll loop
//!
//! A fixed one-minute tick walks all configured devices and runs every
//! fetch routine that is both enabled in the configuration and due on the
//! schedule board. Each routine advances its own schedule entry as its
//! first action, so a failing fetch never tight-loops; the error is logged
//! and the cycle moves on.

use crate::config::Config;
use crate::error::Result;
use crate::logging::{LogContext, get_logger_with_context};
use crate::schedule::ScheduleBoard;
use crate::store::{Device, DeviceKind, DeviceStore};
use crate::{moon, precipitation, uv, weather};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, interval};

/// Seconds between scheduling passes
pub const POLL_INTERVAL_SECONDS: u64 = 60;

/// Upper bound on any single upstream request
const HTTP_TIMEOUT_SECONDS: u64 = 10;

/// Main driver for Boreas
pub struct PollDriver {
    config: Config,

    /// Host-side device/state store
    store: Arc<dyn DeviceStore>,

    /// Next-run bookkeeping, one slot per device kind
    schedule: ScheduleBoard,

    /// Shared HTTP client for all fetchers
    client: reqwest::Client,

    logger: crate::logging::StructuredLogger,

    /// Shutdown signal
    shutdown_tx: mpsc::UnboundedSender<()>,
    shutdown_rx: mpsc::UnboundedReceiver<()>,
}

impl PollDriver {
    /// Create a new driver instance
    pub fn new(config: Config, store: Arc<dyn DeviceStore>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECONDS))
            .build()?;
        let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel();
        let logger = get_logger_with_context(LogContext::new("driver"));

        Ok(Self {
            config,
            store,
            schedule: ScheduleBoard::new(),
            client,
            logger,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Run the driver main loop until a shutdown signal arrives
    pub async fn run(&mut self) -> Result<()> {
        self.logger.info("Starting weather driver main loop");

        let mut poll_interval = interval(Duration::from_secs(POLL_INTERVAL_SECONDS));

        loop {
            tokio::select! {
                _ = poll_interval.tick() => {
                    self.poll_cycle().await;
                }
                _ = self.shutdown_rx.recv() => {
                    self.logger.info("Shutdown signal received");
                    break;
                }
            }
        }

        self.logger.info("Driver shutdown complete");
        Ok(())
    }

    /// One scheduling pass over all devices
    ///
    /// Fetch errors are logged per device and never abort the pass; the
    /// failed routine has already moved its own next-run moment forward.
    pub async fn poll_cycle(&mut self) {
        self.logger.debug("Starting poll cycle");
        let now = chrono::Local::now().naive_local();

        for device in self.store.devices() {
            if !device.enabled {
                continue;
            }
            if !self.schedule.is_due(device.kind, now) {
                continue;
            }
            if let Err(e) = self.service_device(&device).await {
                self.logger.error(&format!(
                    "{} update for '{}' failed: {}",
                    device.kind.as_str(),
                    device.name,
                    e
                ));
            }
        }

        self.logger.debug("Poll cycle completed");
    }

    /// Dispatch one due device to its fetch routine
    ///
    /// A kind disabled in the configuration is skipped even when its
    /// device exists and is enabled on the host side.
    async fn service_device(&mut self, device: &Device) -> Result<()> {
        let store = Arc::clone(&self.store);
        match device.kind {
            DeviceKind::Weather if self.config.weather.enabled => {
                weather::run(
                    &self.config,
                    &self.client,
                    store.as_ref(),
                    device,
                    &mut self.schedule,
                )
                .await
            }
            DeviceKind::Precipitation if self.config.precipitation.enabled => {
                precipitation::run(
                    &self.config,
                    &self.client,
                    store.as_ref(),
                    device,
                    &mut self.schedule,
                )
                .await
            }
            DeviceKind::UvNow if self.config.uv_index.enabled => {
                uv::run_uv_now(
                    &self.config,
                    &self.client,
                    store.as_ref(),
                    device,
                    &mut self.schedule,
                )
                .await
            }
            DeviceKind::UvForecast if self.config.uv_forecast.enabled => {
                uv::run_uv_forecast(
                    &self.config,
                    &self.client,
                    store.as_ref(),
                    device,
                    &mut self.schedule,
                )
                .await
            }
            DeviceKind::Moon if self.config.moon.enabled => {
                moon::run(&self.config, store.as_ref(), device, &mut self.schedule);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Sender half of the shutdown channel, for signal handlers
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<()> {
        self.shutdown_tx.clone()
    }

    /// Request shutdown
    pub fn request_shutdown(&self) {
        self.shutdown_tx.send(()).ok();
    }

    /// Get configuration reference
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Scheduling state, read-only
    pub fn schedule(&self) -> &ScheduleBoard {
        &self.schedule
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Coordinates, MemoryStore};

    fn moon_device(id: u32, enabled: bool) -> Device {
        Device {
            id,
            name: format!("moon{}", id),
            kind: DeviceKind::Moon,
            enabled,
            coords: Coordinates::default(),
            forecast_coords: Coordinates::default(),
        }
    }

    fn driver_with(store: Arc<MemoryStore>) -> PollDriver {
        PollDriver::new(Config::default(), store).unwrap()
    }

    #[tokio::test]
    async fn poll_cycle_services_due_devices() {
        let store = Arc::new(MemoryStore::new());
        store.add_device(moon_device(1, true));

        let mut driver = driver_with(Arc::clone(&store));
        driver.poll_cycle().await;

        assert!(store.state(1, "moonPhaseName").is_some());
        assert!(driver.schedule().next_run(DeviceKind::Moon).is_some());
    }

    #[tokio::test]
    async fn disabled_devices_are_skipped() {
        let store = Arc::new(MemoryStore::new());
        store.add_device(moon_device(2, false));

        let mut driver = driver_with(Arc::clone(&store));
        driver.poll_cycle().await;

        assert!(store.state(2, "moonPhaseName").is_none());
    }

    #[tokio::test]
    async fn scheduled_kinds_wait_their_turn() {
        let store = Arc::new(MemoryStore::new());
        store.add_device(moon_device(3, true));

        let mut driver = driver_with(Arc::clone(&store));
        driver.poll_cycle().await;
        let first_run = store.state_record(3, "lastSuccessfullRun");

        // The moon routine pushed its next run an hour out, so an
        // immediate second pass does nothing
        store.update_state(3, crate::store::StateUpdate::new("lastSuccessfullRun", "x"));
        driver.poll_cycle().await;
        assert_eq!(
            store.state(3, "lastSuccessfullRun"),
            Some(serde_json::json!("x"))
        );
        assert!(first_run.is_some());
    }

    #[tokio::test]
    async fn kind_disabled_in_config_is_not_serviced() {
        let store = Arc::new(MemoryStore::new());
        store.add_device(moon_device(4, true));

        let mut config = Config::default();
        config.moon.enabled = false;
        let mut driver = PollDriver::new(config, store.clone()).unwrap();
        driver.poll_cycle().await;

        assert!(store.state(4, "moonPhaseName").is_none());
    }
}
