//! Device and state store contract
//!
//! The home-automation host owns the device objects and their persistent
//! key/value state. This module models that collaborator as an explicit
//! trait the poll loop and fetchers depend on, plus an in-memory
//! implementation used by the binary and by tests.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Timestamp format used for all state values that carry a wall-clock moment
pub const MINUTE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// The five device kinds this driver services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceKind {
    Weather,
    Precipitation,
    UvNow,
    UvForecast,
    Moon,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Weather => "weather",
            DeviceKind::Precipitation => "precipitation",
            DeviceKind::UvNow => "uv-now",
            DeviceKind::UvForecast => "uv-forecast",
            DeviceKind::Moon => "moon",
        }
    }
}

/// Geographic coordinates as the host hands them over: strings coercible
/// to decimal degrees
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: String,
    pub lon: String,
}

/// One configured data source instance
#[derive(Debug, Clone)]
pub struct Device {
    pub id: u32,
    pub name: String,
    pub kind: DeviceKind,
    pub enabled: bool,
    pub coords: Coordinates,
    /// Second independent coordinate pair, used by UV-forecast devices only
    pub forecast_coords: Coordinates,
}

/// One named state value write, with optional display variant
#[derive(Debug, Clone, PartialEq)]
pub struct StateUpdate {
    pub key: String,
    pub value: serde_json::Value,
    pub ui_value: Option<String>,
    pub decimal_places: Option<u8>,
}

impl StateUpdate {
    pub fn new<K: Into<String>, V: Into<serde_json::Value>>(key: K, value: V) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ui_value: None,
            decimal_places: None,
        }
    }

    pub fn with_ui<S: Into<String>>(mut self, ui_value: S) -> Self {
        self.ui_value = Some(ui_value.into());
        self
    }

    pub fn with_decimals(mut self, decimal_places: u8) -> Self {
        self.decimal_places = Some(decimal_places);
        self
    }
}

/// Host-side device/state store
///
/// The host creates and destroys devices; this core only enumerates them,
/// reads back state values it wrote earlier (the UV fetcher derives its
/// schedule from sunrise/sunset state) and writes new state values.
pub trait DeviceStore: Send + Sync {
    /// Enumerate all known devices
    fn devices(&self) -> Vec<Device>;

    /// Read a single state value of a device, if present
    fn state(&self, device_id: u32, key: &str) -> Option<serde_json::Value>;

    /// Write a single state value
    fn update_state(&self, device_id: u32, update: StateUpdate);

    /// Write a batch of state values
    fn update_states(&self, device_id: u32, updates: Vec<StateUpdate>) {
        for update in updates {
            self.update_state(device_id, update);
        }
    }
}

/// In-memory store backing the standalone binary and the test suite
#[derive(Default)]
pub struct MemoryStore {
    devices: Mutex<Vec<Device>>,
    states: Mutex<HashMap<(u32, String), StateUpdate>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device; ids are handed out by the host, so callers pick them
    pub fn add_device(&self, device: Device) {
        self.devices.lock().expect("devices lock").push(device);
    }

    /// Full state update record, including display variant (for tests)
    pub fn state_record(&self, device_id: u32, key: &str) -> Option<StateUpdate> {
        self.states
            .lock()
            .expect("states lock")
            .get(&(device_id, key.to_string()))
            .cloned()
    }
}

impl DeviceStore for MemoryStore {
    fn devices(&self) -> Vec<Device> {
        self.devices.lock().expect("devices lock").clone()
    }

    fn state(&self, device_id: u32, key: &str) -> Option<serde_json::Value> {
        self.states
            .lock()
            .expect("states lock")
            .get(&(device_id, key.to_string()))
            .map(|u| u.value.clone())
    }

    fn update_state(&self, device_id: u32, update: StateUpdate) {
        self.states
            .lock()
            .expect("states lock")
            .insert((device_id, update.key.clone()), update);
    }
}
