//! Sensor trait definitions for the optical sensor and the real-time clock.
//!
//! Concrete drivers live outside this crate; the collector only needs a full
//! 12-slot channel readout and a wall-clock timestamp.

use serde::Deserialize;
use thiserror_no_std::Error;

/// Number of channel slots produced by one full readout.
pub const CHANNEL_COUNT: usize = 12;

/// One full channel readout, in sensor slot order.
pub type Channels = [u16; CHANNEL_COUNT];

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor} not detected on the bus")]
    NotDetected { sensor: &'static str },
    #[error("{sensor} initialization failed: {details}")]
    InitializationFailed {
        sensor: &'static str,
        details: &'static str,
    },
    #[error("{sensor} read failed during {operation}: {details}")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
        details: &'static str,
    },
    #[error("{sensor} timed out during {operation}")]
    Timeout {
        sensor: &'static str,
        operation: &'static str,
    },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockError {
    #[error("real-time clock not detected")]
    NotDetected,
    #[error("real-time clock lost power, time is not valid")]
    TimeNotSet,
}

/// Analog gain applied by the optical sensor front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum SensorGain {
    X0_5,
    X1,
    X2,
    X4,
    X8,
    X16,
    X32,
    X64,
    X128,
    X256,
    X512,
}

impl SensorGain {
    /// Register value for the gain field (`AGAIN`), 0 = 0.5x up to 10 = 512x.
    pub const fn register_value(self) -> u8 {
        match self {
            Self::X0_5 => 0,
            Self::X1 => 1,
            Self::X2 => 2,
            Self::X4 => 3,
            Self::X8 => 4,
            Self::X16 => 5,
            Self::X32 => 6,
            Self::X64 => 7,
            Self::X128 => 8,
            Self::X256 => 9,
            Self::X512 => 10,
        }
    }
}

/// Multi-channel optical sensor.
pub trait SpectralSensor {
    /// Bring the sensor up and apply the configured gain.
    fn init(&mut self, gain: SensorGain) -> Result<(), SensorError>;

    /// Perform one full readout of all channel slots.
    fn read_all_channels(&mut self) -> Result<Channels, SensorError>;
}

/// Battery-backed real-time clock.
pub trait Clock {
    /// Seconds since the Unix epoch.
    fn now(&mut self) -> Result<u32, ClockError>;
}
