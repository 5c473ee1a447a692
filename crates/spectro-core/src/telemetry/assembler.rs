//! Receiving side of the batch protocol.
//!
//! A consumer subscribed to the batch topic sees a stream of records whose `flag`
//! marks where a wake cycle's data starts (`1`) and ends (`-1`). The assembler
//! regroups that stream into one session per cycle.

use heapless::Vec;
use log::{debug, warn};
use serde::Deserialize;
use thiserror_no_std::Error;

use super::payload::SampleRecord;
use crate::light::LedColor;
use crate::storage::{PositionFlag, SAMPLES_PER_GROUP, Sample, SampleStatus};

/// Upper bound on records accepted from one batch payload
pub const MAX_DECODED_RECORDS: usize = 64;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("payload is not a batch document")]
    Malformed,
    #[error("record has invalid {field}")]
    InvalidRecord { field: &'static str },
}

#[derive(Deserialize)]
struct BatchDocument<'a> {
    #[serde(borrow)]
    batch: Vec<SampleRecord<'a>, MAX_DECODED_RECORDS>,
}

impl TryFrom<&SampleRecord<'_>> for Sample {
    type Error = DecodeError;

    fn try_from(record: &SampleRecord<'_>) -> Result<Self, Self::Error> {
        Ok(Sample {
            timestamp: record.timestamp,
            batch_id: record.batch,
            position_flag: PositionFlag::from_wire(record.flag)
                .ok_or(DecodeError::InvalidRecord { field: "flag" })?,
            led_color: LedColor::from_label(record.ledcolor)
                .ok_or(DecodeError::InvalidRecord { field: "ledcolor" })?,
            led_intensity: record.ledintensity,
            channels: record.channels,
            status: SampleStatus::Valid,
        })
    }
}

/// Parse a `{"batch":[...]}` payload back into samples, in payload order.
pub fn decode_batch(payload: &[u8]) -> Result<Vec<Sample, MAX_DECODED_RECORDS>, DecodeError> {
    let (doc, _) = serde_json_core::from_slice::<BatchDocument<'_>>(payload)
        .map_err(|_| DecodeError::Malformed)?;

    let mut samples = Vec::new();
    for record in doc.batch.iter() {
        // same bound as the document, cannot overflow
        let _ = samples.push(Sample::try_from(record)?);
    }
    Ok(samples)
}

/// Regroups flagged samples into complete per-cycle sessions.
///
/// A session opens with the `First` group and closes once the whole `Last`
/// group has arrived. A new `First` group while a session is still open
/// means the previous cycle never sent its end; that session is discarded.
pub struct BatchAssembler<const N: usize> {
    open: Option<Vec<Sample, N>>,
    first_seen: usize,
    last_seen: usize,
    discarded: u32,
}

impl<const N: usize> BatchAssembler<N> {
    pub const fn new() -> Self {
        Self {
            open: None,
            first_seen: 0,
            last_seen: 0,
            discarded: 0,
        }
    }

    /// Feed one sample; returns the finished session when this sample closes it.
    pub fn accept(&mut self, sample: Sample) -> Option<Vec<Sample, N>> {
        match sample.position_flag {
            PositionFlag::First => {
                let starts_new_group = match &self.open {
                    None => true,
                    Some(session) => {
                        self.first_seen >= SAMPLES_PER_GROUP || session.len() > self.first_seen
                    }
                };
                if starts_new_group {
                    if let Some(stale) = self.open.take() {
                        warn!(
                            "New session started before the previous one closed, discarding {} sample(s)",
                            stale.len()
                        );
                        self.discarded += 1;
                    }
                    debug!("Session opened at {}", sample.timestamp);
                    self.open = Some(Vec::new());
                    self.first_seen = 0;
                    self.last_seen = 0;
                }
                self.first_seen += 1;
            }
            PositionFlag::Middle | PositionFlag::Last => {
                if self.open.is_none() {
                    warn!(
                        "Dropping batch {} sample outside of a session",
                        sample.batch_id
                    );
                    return None;
                }
            }
        }

        let session = self.open.as_mut()?;
        if session.push(sample).is_err() {
            warn!("Session full at {} samples, dropping sample", N);
        }

        if sample.position_flag == PositionFlag::Last {
            self.last_seen += 1;
            if self.last_seen >= SAMPLES_PER_GROUP {
                debug!("Session closed at {}", sample.timestamp);
                self.first_seen = 0;
                self.last_seen = 0;
                return self.open.take();
            }
        }
        None
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Sessions dropped because a new one began first
    pub const fn discarded(&self) -> u32 {
        self.discarded
    }
}

impl<const N: usize> Default for BatchAssembler<N> {
    fn default() -> Self {
        Self::new()
    }
}
