//! Wire shapes of the published JSON documents.
//!
//! Field names are part of the broker contract and must not change:
//!
//! - batch: `{ "batch": [ { timestamp, batch, flag, ledcolor, ledintensity, channels[12] } ] }`
//! - vitals: `{ mac_address, timestamp, uptime_ms, cpu_frequency, ram_usage, temp, wifi_ssid,
//!   wifi_signal, ip, firmware_checksum, firmware_size }`
//! - log: `{ mac_address, timestamp, error_code, error_message }`

use serde::{Deserialize, Serialize};

use crate::sensors::Channels;
use crate::storage::Sample;

/// One sample as it appears inside a batch payload.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRecord<'a> {
    pub timestamp: u32,
    pub batch: u32,
    /// 1 = first, 0 = middle, -1 = last
    pub flag: i8,
    pub ledcolor: &'a str,
    pub ledintensity: u8,
    pub channels: Channels,
}

impl From<&Sample> for SampleRecord<'static> {
    fn from(sample: &Sample) -> Self {
        Self {
            timestamp: sample.timestamp,
            batch: sample.batch_id,
            flag: sample.position_flag.wire_value(),
            ledcolor: sample.led_color.label(),
            ledintensity: sample.led_intensity,
            channels: sample.channels,
        }
    }
}

/// Serializes a slice of samples as `{"batch":[...]}` without copying them into
/// intermediate records.
pub struct BatchPayload<'a> {
    pub samples: &'a [Sample],
}

impl Serialize for BatchPayload<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::{SerializeSeq, SerializeStruct};

        struct Records<'a>(&'a [Sample]);

        impl Serialize for Records<'_> {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
                for sample in self.0 {
                    seq.serialize_element(&SampleRecord::from(sample))?;
                }
                seq.end()
            }
        }

        let mut doc = serializer.serialize_struct("BatchPayload", 1)?;
        doc.serialize_field("batch", &Records(self.samples))?;
        doc.end()
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct VitalsPayload<'a> {
    pub mac_address: &'a str,
    pub timestamp: u32,
    pub uptime_ms: u64,
    /// MHz
    pub cpu_frequency: u32,
    /// Percent of heap in use
    pub ram_usage: f32,
    /// Die temperature in °C, `null` when the board has no sensor
    pub temp: Option<f32>,
    pub wifi_ssid: &'a str,
    /// dBm, `null` when not associated
    pub wifi_signal: Option<i8>,
    pub ip: &'a str,
    pub firmware_checksum: &'a str,
    pub firmware_size: u32,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogPayload<'a> {
    pub mac_address: &'a str,
    pub timestamp: u32,
    pub error_code: &'a str,
    pub error_message: &'a str,
}
