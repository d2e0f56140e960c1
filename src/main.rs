use anyhow::Result;
use boreas::driver::PollDriver;
use boreas::store::{Device, MemoryStore};
use boreas::{Config, logging};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    logging::init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Starting Boreas weather driver; version {}",
        env!("CARGO_PKG_VERSION")
    );
    info!("For detailed logging, set logging.level to DEBUG in the configuration");

    // Devices come from the configuration; ids are handed out in file order
    let store = Arc::new(MemoryStore::new());
    for (index, device) in config.devices.iter().enumerate() {
        store.add_device(Device {
            id: index as u32 + 1,
            name: device.name.clone(),
            kind: device.kind,
            enabled: device.enabled,
            coords: device.coords(),
            forecast_coords: device.forecast_coords(),
        });
    }
    if config.devices.is_empty() {
        info!("No devices configured; the poll loop will idle");
    }

    let mut driver = PollDriver::new(config, store)
        .map_err(|e| anyhow::anyhow!("Failed to create driver: {}", e))?;

    // Ctrl-C feeds the driver's shutdown channel
    let shutdown = driver.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.send(()).ok();
        }
    });

    match driver.run().await {
        Ok(_) => {
            info!("Driver shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("Driver failed with error: {}", e);
            Err(anyhow::anyhow!("Driver error: {}", e))
        }
    }
}
