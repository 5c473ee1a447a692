//! Payload building and publishing for batches, vitals and device logs.

mod assembler;
mod payload;
mod vitals;

pub use assembler::*;
pub use payload::*;
pub use vitals::*;

use log::{debug, info, warn};
use thiserror_no_std::Error;

use crate::connectivity::{ConnectivityError, ConnectivityManager, MqttSession, WifiLink};
use crate::storage::{SAMPLES_PER_GROUP, Sample, SampleStore};

/// Serialization buffer for one batch message. A full cycle of the reference
/// configuration does not fit and is split on group boundaries.
pub const BATCH_PAYLOAD_CAPACITY: usize = 4096;

pub const VITALS_PAYLOAD_CAPACITY: usize = 512;

pub const LOG_PAYLOAD_CAPACITY: usize = 256;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("{samples} sample(s) exceed the {capacity} byte payload buffer")]
    PayloadTooLarge { samples: usize, capacity: usize },
    #[error("failed to serialize {payload} payload")]
    Serialize { payload: &'static str },
    #[error("publish failed: {0}")]
    Publish(ConnectivityError),
}

impl From<ConnectivityError> for TelemetryError {
    fn from(value: ConnectivityError) -> Self {
        Self::Publish(value)
    }
}

/// Outcome of a report that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Published { messages: u32, samples: usize },
    /// No broker session; nothing was sent and nothing was consumed
    NoSession,
    /// Nothing to send
    Nothing,
}

/// Tag carried in the `error_code` field of device log messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCode {
    SensorRead,
    ClockRead,
    PayloadTooLarge,
    BufferOverwrite,
}

impl LogCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SensorRead => "SENSOR_READ",
            Self::ClockRead => "CLOCK_READ",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::BufferOverwrite => "BUFFER_OVERWRITE",
        }
    }
}

/// Serializes and publishes telemetry. Owns its output buffers so payloads are
/// never built on the stack.
pub struct TelemetryReporter {
    batch_buf: [u8; BATCH_PAYLOAD_CAPACITY],
    vitals_buf: [u8; VITALS_PAYLOAD_CAPACITY],
    log_buf: [u8; LOG_PAYLOAD_CAPACITY],
}

impl TelemetryReporter {
    pub const fn new() -> Self {
        Self {
            batch_buf: [0; BATCH_PAYLOAD_CAPACITY],
            vitals_buf: [0; VITALS_PAYLOAD_CAPACITY],
            log_buf: [0; LOG_PAYLOAD_CAPACITY],
        }
    }

    /// Publish the newest `sample_groups` batches from the store.
    ///
    /// The store is only read. Without an open session this is a logged no-op.
    pub fn send_batch<W, M, const CAP: usize>(
        &mut self,
        conn: &mut ConnectivityManager<'_, W, M>,
        store: &SampleStore<CAP>,
        sample_groups: usize,
    ) -> Result<Delivery, TelemetryError>
    where
        W: WifiLink,
        M: MqttSession,
    {
        let groups = sample_groups.min(store.groups_available());
        if groups == 0 {
            debug!("No complete batches to report");
            return Ok(Delivery::Nothing);
        }
        if !conn.is_session_open() {
            warn!("No broker session, {} batch(es) not reported", groups);
            return Ok(Delivery::NoSession);
        }

        let samples = store.latest(groups * SAMPLES_PER_GROUP);
        let (topic, _, _) = conn.topics();
        let mut messages = 0;
        self.publish_samples(conn, topic, &samples, &mut messages)?;

        info!(
            "Reported {} sample(s) in {} message(s) on '{}'",
            samples.len(),
            messages,
            topic
        );
        Ok(Delivery::Published {
            messages,
            samples: samples.len(),
        })
    }

    /// Serialize and publish `samples`, halving on group boundaries until each
    /// part fits the buffer.
    fn publish_samples<W, M>(
        &mut self,
        conn: &mut ConnectivityManager<'_, W, M>,
        topic: &str,
        samples: &[Sample],
        messages: &mut u32,
    ) -> Result<(), TelemetryError>
    where
        W: WifiLink,
        M: MqttSession,
    {
        match serde_json_core::to_slice(&BatchPayload { samples }, &mut self.batch_buf) {
            Ok(len) => {
                conn.publish(topic, &self.batch_buf[..len])?;
                *messages += 1;
                Ok(())
            }
            Err(serde_json_core::ser::Error::BufferFull) => {
                let groups = samples.len() / SAMPLES_PER_GROUP;
                if groups <= 1 {
                    return Err(TelemetryError::PayloadTooLarge {
                        samples: samples.len(),
                        capacity: BATCH_PAYLOAD_CAPACITY,
                    });
                }
                let (head, tail) = samples.split_at(groups / 2 * SAMPLES_PER_GROUP);
                debug!(
                    "Batch of {} sample(s) does not fit, splitting {} + {}",
                    samples.len(),
                    head.len(),
                    tail.len()
                );
                self.publish_samples(conn, topic, head, messages)?;
                self.publish_samples(conn, topic, tail, messages)
            }
            Err(_) => Err(TelemetryError::Serialize { payload: "batch" }),
        }
    }

    /// Publish a device health snapshot. Independent of the sample store.
    pub fn send_vitals<W, M, S>(
        &mut self,
        conn: &mut ConnectivityManager<'_, W, M>,
        system: &mut S,
        timestamp: u32,
    ) -> Result<Delivery, TelemetryError>
    where
        W: WifiLink,
        M: MqttSession,
        S: SystemInfo,
    {
        if !conn.is_session_open() {
            warn!("No broker session, vitals not reported");
            return Ok(Delivery::NoSession);
        }

        let mac = conn.mac();
        let ssid = conn.ssid();
        let rssi = conn.rssi();
        let ip = conn.ip();
        let vitals = DeviceVitals::collect(system, timestamp, mac, ssid, rssi, ip);

        let len = serde_json_core::to_slice(&vitals.as_payload(), &mut self.vitals_buf)
            .map_err(|_| TelemetryError::Serialize { payload: "vitals" })?;
        let (_, _, topic) = conn.topics();
        conn.publish(topic, &self.vitals_buf[..len])?;

        debug!("Vitals published ({} bytes)", len);
        Ok(Delivery::Published {
            messages: 1,
            samples: 0,
        })
    }

    /// Publish a diagnostic message to the device log topic.
    pub fn send_log<W, M>(
        &mut self,
        conn: &mut ConnectivityManager<'_, W, M>,
        timestamp: u32,
        code: LogCode,
        message: &str,
    ) -> Result<Delivery, TelemetryError>
    where
        W: WifiLink,
        M: MqttSession,
    {
        if !conn.is_session_open() {
            warn!("No broker session, dropping {} log", code.as_str());
            return Ok(Delivery::NoSession);
        }

        let mac = conn.mac().map(|m| m.to_heapless()).unwrap_or_default();
        let payload = LogPayload {
            mac_address: mac.as_str(),
            timestamp,
            error_code: code.as_str(),
            error_message: message,
        };
        let len = serde_json_core::to_slice(&payload, &mut self.log_buf)
            .map_err(|_| TelemetryError::Serialize { payload: "log" })?;
        let (_, topic, _) = conn.topics();
        conn.publish(topic, &self.log_buf[..len])?;

        Ok(Delivery::Published {
            messages: 1,
            samples: 0,
        })
    }
}

impl Default for TelemetryReporter {
    fn default() -> Self {
        Self::new()
    }
}
