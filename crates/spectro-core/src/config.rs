//! Static node configuration.
//!
//! Every field has a reference default; overrides come from a JSON document
//! (`Config::from_json`) or are filled in field by field by the host binary.

use serde::Deserialize;
use thiserror_no_std::Error;

use crate::light::LedPolarity;
use crate::sensors::SensorGain;
use crate::storage::SAMPLES_PER_GROUP;

/// Topic for batched sample data
pub const TOPIC_BATCH: &str = "spectrumdatapoints";
/// Topic for diagnostic/log messages
pub const TOPIC_LOG: &str = "devicelogs";
/// Topic for device vitals
pub const TOPIC_VITALS: &str = "devicevitals";

#[derive(Deserialize, Debug, Default, Clone, Copy)]
#[serde(bound(deserialize = "'de: 'a"), default)]
pub struct Config<'a> {
    pub internet: InternetConfig<'a>,
    pub broker: BrokerConfig<'a>,
    pub acquisition: AcquisitionConfig,
    pub schedule: ScheduleConfig,
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(default)]
pub struct InternetConfig<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
    /// Seconds to wait for association, polled once per second
    pub link_timeout_s: u32,
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(default)]
pub struct BrokerConfig<'a> {
    pub host: &'a str,
    pub port: u16,
    pub client_id: &'a str,
    pub session_retries: u32,
    /// Wall-clock budget for flushing the session before disconnect
    pub drain_budget_ms: u32,
    pub batch_topic: &'a str,
    pub log_topic: &'a str,
    pub vitals_topic: &'a str,
}

impl Default for BrokerConfig<'_> {
    fn default() -> Self {
        Self {
            host: "",
            port: 1883,
            client_id: "spectro-node",
            session_retries: 3,
            drain_budget_ms: 1000,
            batch_topic: TOPIC_BATCH,
            log_topic: TOPIC_LOG,
            vitals_topic: TOPIC_VITALS,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Batches (four-color groups) collected per wake cycle at most
    pub batch_size: u32,
    pub sensor_gain: SensorGain,
    /// Light intensity in percent
    pub led_intensity: u8,
    pub led_polarity: LedPolarity,
    /// Time the light is left on before reading
    pub settle_ms: u32,
    /// Pause between two batches
    pub inter_batch_ms: u32,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            sensor_gain: SensorGain::X128,
            led_intensity: 50,
            led_polarity: LedPolarity::CommonAnode,
            settle_ms: 1000,
            inter_batch_ms: 500,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Periodic timer wake interval
    pub wake_interval_s: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            wake_interval_s: 900,
        }
    }
}

impl Default for InternetConfig<'_> {
    fn default() -> Self {
        Self {
            ssid: "",
            password: "",
            link_timeout_s: 10,
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid configuration document")]
    Parse,
    #[error("{field} is out of range: {details}")]
    OutOfRange {
        field: &'static str,
        details: &'static str,
    },
}

impl<'a> Config<'a> {
    /// Parse a JSON configuration document. Missing sections and fields keep
    /// their defaults.
    pub fn from_json(json: &'a str) -> Result<Self, ConfigError> {
        let (config, _) =
            serde_json_core::from_str::<Config<'a>>(json).map_err(|_| ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the acquisition engine cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let acq = &self.acquisition;

        if acq.batch_size == 0 {
            return Err(ConfigError::OutOfRange {
                field: "acquisition.batch_size",
                details: "must be at least 1",
            });
        }
        if acq.led_intensity > 100 {
            return Err(ConfigError::OutOfRange {
                field: "acquisition.led_intensity",
                details: "must be a percentage (0-100)",
            });
        }
        if self.schedule.wake_interval_s == 0 {
            return Err(ConfigError::OutOfRange {
                field: "schedule.wake_interval_s",
                details: "must be at least 1 second",
            });
        }
        if self.broker.session_retries == 0 {
            return Err(ConfigError::OutOfRange {
                field: "broker.session_retries",
                details: "must be at least 1",
            });
        }
        Ok(())
    }

    /// True if one full cycle of batches fits in a store of `capacity` samples
    /// without overwriting its own first samples.
    pub fn cycle_fits(&self, capacity: usize) -> bool {
        (self.acquisition.batch_size as usize).saturating_mul(SAMPLES_PER_GROUP) <= capacity
    }
}
