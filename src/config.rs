//! Configuration management for Boreas
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files. The host validates preferences before the
//! poll loop runs; `validate()` mirrors those checks so a standalone run
//! rejects the same inputs the host would.

use crate::error::{BoreasError, Result};
use crate::store::{Coordinates, DeviceKind};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_true() -> bool {
    true
}

fn default_interval_minutes() -> u32 {
    10
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Weerlive weather feed configuration
    pub weather: WeatherConfig,

    /// Buienradar precipitation feed configuration
    pub precipitation: PrecipitationConfig,

    /// OpenUV current-index feed configuration
    pub uv_index: UvIndexConfig,

    /// OpenUV forecast feed configuration
    pub uv_forecast: UvForecastConfig,

    /// Moon phase calculation configuration
    pub moon: MoonConfig,

    /// Localized day names, indexed by weekday number (Monday = 0)
    pub day_names: Vec<String>,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Devices to service; stands in for the host's device enumeration
    pub devices: Vec<DeviceConfig>,
}

/// Weerlive weather feed settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Whether the weather feed is polled at all
    pub enabled: bool,

    /// Weerlive API key
    pub api_key: String,

    /// Minutes between fetches (minimum 10)
    pub interval_minutes: u32,
}

/// Buienradar precipitation feed settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrecipitationConfig {
    /// Whether the precipitation feed is polled at all
    pub enabled: bool,

    /// Minutes between fetches (minimum 10)
    pub interval_minutes: u32,

    /// Also write a CSV table for the companion plotting tool
    pub plot_enabled: bool,

    /// Path to the companion plotting tool's XML preferences file,
    /// from which its data directory is discovered
    pub plot_prefs_file: String,
}

/// OpenUV current-index settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UvIndexConfig {
    /// Whether the UV index feed is polled at all
    pub enabled: bool,

    /// OpenUV access token, sent as the x-access-token header
    pub api_key: String,

    /// Daily request quota to spread evenly across daylight
    pub daily_max: u32,
}

/// OpenUV forecast settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UvForecastConfig {
    /// Whether the UV forecast feed is polled at all
    pub enabled: bool,

    /// Preferred time of day (HH:MM) for the daily forecast fetch
    pub time: String,
}

/// Moon phase settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MoonConfig {
    /// Whether the moon phase is calculated at all
    pub enabled: bool,

    /// Language for phase names (NL or EN)
    pub language: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Path to log file or directory
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

/// One device entry, standing in for host-created device objects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Display name
    pub name: String,

    /// Device kind tag
    pub kind: DeviceKind,

    /// Whether the device participates in polling
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Geographic coordinates
    #[serde(default)]
    pub lat: String,
    #[serde(default)]
    pub lon: String,

    /// Second coordinate pair, for uv-forecast devices
    #[serde(default)]
    pub forecast_lat: String,
    #[serde(default)]
    pub forecast_lon: String,
}

impl DeviceConfig {
    pub fn coords(&self) -> Coordinates {
        Coordinates {
            lat: self.lat.clone(),
            lon: self.lon.clone(),
        }
    }

    pub fn forecast_coords(&self) -> Coordinates {
        Coordinates {
            lat: self.forecast_lat.clone(),
            lon: self.forecast_lon.clone(),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            interval_minutes: default_interval_minutes(),
        }
    }
}

impl Default for PrecipitationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_minutes: default_interval_minutes(),
            plot_enabled: false,
            plot_prefs_file: String::new(),
        }
    }
}

impl Default for UvIndexConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            daily_max: 50,
        }
    }
}

impl Default for UvForecastConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            time: "12:08".to_string(),
        }
    }
}

impl Default for MoonConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            language: "NL".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: "/tmp/boreas.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

fn default_day_names() -> Vec<String> {
    [
        "maandag",
        "dinsdag",
        "woensdag",
        "donderdag",
        "vrijdag",
        "zaterdag",
        "zondag",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            weather: WeatherConfig::default(),
            precipitation: PrecipitationConfig::default(),
            uv_index: UvIndexConfig::default(),
            uv_forecast: UvForecastConfig::default(),
            moon: MoonConfig::default(),
            day_names: default_day_names(),
            logging: LoggingConfig::default(),
            devices: Vec::new(),
        }
    }
}

fn is_decimal(value: &str) -> bool {
    value.parse::<f64>().is_ok()
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default locations
    pub fn load() -> Result<Self> {
        let default_paths = [
            "boreas.yaml",
            "/data/boreas.yaml",
            "/etc/boreas/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        // Fall back to default configuration
        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.weather.enabled {
            if self.weather.api_key.is_empty() {
                return Err(BoreasError::validation(
                    "weather.api_key",
                    "The ApiKey seems empty",
                ));
            }
            if self.weather.interval_minutes < 10 {
                return Err(BoreasError::validation(
                    "weather.interval_minutes",
                    "Interval between measurements should be min. 10 minutes",
                ));
            }
        }

        if self.precipitation.enabled {
            if self.precipitation.interval_minutes < 10 {
                return Err(BoreasError::validation(
                    "precipitation.interval_minutes",
                    "Interval between measurements should be min. 10 minutes",
                ));
            }
            if self.precipitation.plot_enabled && self.precipitation.plot_prefs_file.is_empty() {
                return Err(BoreasError::validation(
                    "precipitation.plot_prefs_file",
                    "Plotting enabled without a preferences file to locate the data directory",
                ));
            }
        }

        if self.uv_index.enabled {
            if self.uv_index.api_key.is_empty() {
                return Err(BoreasError::validation(
                    "uv_index.api_key",
                    "The UVindex Access Token seems empty",
                ));
            }
            // Daily max of 1 would leave zero intervals to divide daylight over
            if self.uv_index.daily_max < 2 {
                return Err(BoreasError::validation(
                    "uv_index.daily_max",
                    "Daily request max should be at least 2",
                ));
            }
        }

        if chrono::NaiveTime::parse_from_str(&self.uv_forecast.time, "%H:%M").is_err() {
            return Err(BoreasError::validation(
                "uv_forecast.time",
                "Use time in 24-hour HH:MM format",
            ));
        }

        if self.day_names.len() != 7 {
            return Err(BoreasError::validation(
                "day_names",
                "Not all 7 days of the week are filled",
            ));
        }

        match self.moon.language.as_str() {
            "NL" | "EN" => {}
            _ => {
                return Err(BoreasError::validation(
                    "moon.language",
                    "Supported moon phase languages are NL and EN",
                ));
            }
        }

        for device in &self.devices {
            if !device.enabled {
                continue;
            }
            match device.kind {
                DeviceKind::Moon => {}
                DeviceKind::UvForecast => {
                    if !is_decimal(&device.forecast_lat) || !is_decimal(&device.forecast_lon) {
                        return Err(BoreasError::validation(
                            "devices",
                            "Forecast latitude/longitude is not numeric",
                        ));
                    }
                }
                _ => {
                    if !is_decimal(&device.lat) || !is_decimal(&device.lon) {
                        return Err(BoreasError::validation(
                            "devices",
                            "Latitude/longitude is not numeric",
                        ));
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.weather.interval_minutes, 10);
        assert_eq!(config.uv_index.daily_max, 50);
        assert_eq!(config.uv_forecast.time, "12:08");
        assert_eq!(config.day_names.len(), 7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_enabled_feeds_require_keys_and_sane_intervals() {
        let mut config = Config::default();
        config.weather.enabled = true;
        assert!(config.validate().is_err());

        config.weather.api_key = "demo".to_string();
        assert!(config.validate().is_ok());

        config.weather.interval_minutes = 5;
        assert!(config.validate().is_err());

        config = Config::default();
        config.uv_index.enabled = true;
        config.uv_index.api_key = "token".to_string();
        config.uv_index.daily_max = 1;
        assert!(config.validate().is_err());
        config.uv_index.daily_max = 50;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_forecast_time_and_day_names() {
        let mut config = Config::default();
        config.uv_forecast.time = "25:99".to_string();
        assert!(config.validate().is_err());

        config = Config::default();
        config.day_names.pop();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_device_coordinates_must_be_numeric() {
        let mut config = Config::default();
        config.devices.push(DeviceConfig {
            name: "weer".to_string(),
            kind: DeviceKind::Weather,
            enabled: true,
            lat: "not-a-number".to_string(),
            lon: "5.2".to_string(),
            forecast_lat: String::new(),
            forecast_lon: String::new(),
        });
        assert!(config.validate().is_err());

        config.devices[0].lat = "52.1".to_string();
        assert!(config.validate().is_ok());

        // Disabled devices are skipped
        config.devices[0].lat = "x".to_string();
        config.devices[0].enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let deserialized: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(
            config.weather.interval_minutes,
            deserialized.weather.interval_minutes
        );
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "weather:\n  enabled: true\n  api_key: demo\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.weather.enabled);
        assert_eq!(config.weather.interval_minutes, 10);
        assert!(!config.precipitation.enabled);
        assert!(config.moon.enabled);
    }
}
