//! Simulator settings from the environment (and an optional `.env` file).
//!
//! | Variable                | Meaning                                           |
//! |-------------------------|---------------------------------------------------|
//! | `SPECTRO_CONFIG`        | Path to a JSON node configuration                 |
//! | `WIFI_SSID`             | Network name (default `sim-net`)                  |
//! | `WIFI_PASSWORD`         | Network password                                  |
//! | `MQTT_HOST`             | Broker host (default `loopback`)                  |
//! | `MQTT_PORT`             | Broker port                                       |
//! | `BATCH_SIZE`            | Batches per wake cycle                            |
//! | `LED_INTENSITY`         | Light intensity in percent                        |
//! | `WAKE_INTERVAL_S`       | Timer wake interval                               |
//! | `SIM_CYCLES`            | Wake cycles to run before exiting (default 6)     |
//! | `SIM_TIME_SCALE`        | Real seconds per simulated second (default 0.01)  |
//! | `SIM_TRIGGER_EVERY`     | Every n-th wake is a sample insertion (default 2) |
//! | `SIM_SENSOR_FAIL_EVERY` | Fail every n-th sensor read, 0 = never            |
//! | `SIM_WIFI_DOWN`         | `1` to keep the network unreachable               |
//! | `SIM_BROKER_DOWN`       | `1` to refuse broker connections                  |

use std::env;
use std::fmt::Debug;
use std::str::FromStr;

use log::{info, warn};

use spectro_core::config::{Config, ConfigError};

pub struct SimSettings {
    pub cycles: u32,
    pub time_scale: f64,
    pub trigger_every: u32,
    pub sensor_fail_every: u32,
    pub wifi_down: bool,
    pub broker_down: bool,
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn parsed<T>(name: &str) -> Option<T>
where
    T: FromStr,
    T::Err: Debug,
{
    let raw = var(name)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring {}={:?}: {:?}", name, raw, e);
            None
        }
    }
}

fn flag(name: &str) -> bool {
    matches!(var(name).as_deref(), Some("1" | "true" | "yes"))
}

/// Strings in the node configuration are borrowed for the lifetime of the
/// process, as they are from flash on the device.
fn leak(value: String) -> &'static str {
    value.leak()
}

/// Build the node configuration: JSON file first, then individual overrides.
pub fn load_config() -> Result<Config<'static>, ConfigError> {
    let mut config = match var("SPECTRO_CONFIG") {
        Some(path) => {
            let json = std::fs::read_to_string(&path).map_err(|e| {
                warn!("Cannot read {}: {}", path, e);
                ConfigError::Parse
            })?;
            info!("Loaded node configuration from {}", path);
            Config::from_json(leak(json))?
        }
        None => Config::default(),
    };

    config.internet.ssid = leak(var("WIFI_SSID").unwrap_or_else(|| "sim-net".into()));
    if let Some(password) = var("WIFI_PASSWORD") {
        config.internet.password = leak(password);
    }
    config.broker.host = leak(var("MQTT_HOST").unwrap_or_else(|| "loopback".into()));
    if let Some(port) = parsed("MQTT_PORT") {
        config.broker.port = port;
    }
    if let Some(batch_size) = parsed("BATCH_SIZE") {
        config.acquisition.batch_size = batch_size;
    }
    if let Some(intensity) = parsed("LED_INTENSITY") {
        config.acquisition.led_intensity = intensity;
    }
    if let Some(interval) = parsed("WAKE_INTERVAL_S") {
        config.schedule.wake_interval_s = interval;
    }

    config.validate()?;
    Ok(config)
}

impl SimSettings {
    pub fn from_env() -> Self {
        Self {
            cycles: parsed("SIM_CYCLES").unwrap_or(6),
            time_scale: parsed("SIM_TIME_SCALE").unwrap_or(0.01),
            trigger_every: parsed("SIM_TRIGGER_EVERY").unwrap_or(2),
            sensor_fail_every: parsed("SIM_SENSOR_FAIL_EVERY").unwrap_or(0),
            wifi_down: flag("SIM_WIFI_DOWN"),
            broker_down: flag("SIM_BROKER_DOWN"),
        }
    }
}
