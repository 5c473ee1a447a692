pub mod ring;
pub mod sample_store;
pub mod shared;

pub use sample_store::*;
pub use shared::SharedSampleStore;

use crate::light::LedColor;
use crate::sensors::{CHANNEL_COUNT, Channels};

/// Number of samples held in RAM in the reference configuration
pub const DEFAULT_STORE_CAPACITY: usize = 50;

/// Samples produced per batch (one per illumination color)
pub const SAMPLES_PER_GROUP: usize = LedColor::SEQUENCE.len();

/// Role of a sample within the batches of one wake cycle.
///
/// Downstream consumers open a new sample session on `First` and close it on `Last`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionFlag {
    First,
    Middle,
    Last,
}

impl PositionFlag {
    /// Compute the flag for the batch at `position` of a cycle configured for
    /// `batch_size` batches.
    ///
    /// A single-batch cycle is tagged `First`.
    pub const fn for_position(position: u32, batch_size: u32) -> Self {
        if position == 0 {
            Self::First
        } else if position + 1 == batch_size {
            Self::Last
        } else {
            Self::Middle
        }
    }

    /// Value carried in the `flag` field of batch payloads
    pub const fn wire_value(self) -> i8 {
        match self {
            Self::First => 1,
            Self::Middle => 0,
            Self::Last => -1,
        }
    }

    pub const fn from_wire(value: i8) -> Option<Self> {
        match value {
            1 => Some(Self::First),
            0 => Some(Self::Middle),
            -1 => Some(Self::Last),
            _ => None,
        }
    }
}

/// Whether the channel values came from a successful readout.
///
/// A failed read is stored with zeroed channels so the batch keeps its shape;
/// this marker keeps it distinguishable from a genuine all-dark reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleStatus {
    Valid,
    ReadFailed,
}

/// One optical reading under one illumination condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// Seconds since epoch, from the RTC
    pub timestamp: u32,
    /// Batch counter within the wake cycle
    pub batch_id: u32,
    pub position_flag: PositionFlag,
    pub led_color: LedColor,
    /// Light intensity in percent (0-100)
    pub led_intensity: u8,
    pub channels: Channels,
    pub status: SampleStatus,
}

impl Sample {
    pub const fn zeroed_channels() -> Channels {
        [0; CHANNEL_COUNT]
    }

    pub fn is_valid(&self) -> bool {
        self.status == SampleStatus::Valid
    }
}
