//! Batch acquisition: cycle the light through R, G, B, W and read the sensor
//! under each color while the sample-present trigger is held.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::InputPin;
use log::{debug, info, warn};

use crate::board::{Board, Platform};
use crate::config::AcquisitionConfig;
use crate::light::{LedColor, LightSource};
use crate::sensors::{Clock, SpectralSensor};
use crate::storage::{PositionFlag, PushOutcome, Sample, SampleStatus, SampleStore};

/// Timing and shape of one collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorSettings {
    /// Batches per wake cycle, used to compute position flags
    pub batch_size: u32,
    /// Light intensity in percent
    pub intensity: u8,
    pub settle_ms: u32,
    pub inter_batch_ms: u32,
}

impl From<&AcquisitionConfig> for CollectorSettings {
    fn from(config: &AcquisitionConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            intensity: config.led_intensity,
            settle_ms: config.settle_ms,
            inter_batch_ms: config.inter_batch_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectReport {
    /// Complete four-color batches pushed to the store
    pub batches: u32,
    /// Readouts that failed and were stored zeroed
    pub read_failures: u32,
    /// Samples stamped with 0 because the clock could not be read
    pub clock_failures: u32,
    /// Older samples evicted while storing this run
    pub overwrites: u32,
}

/// Read the active-low trigger. A pin error counts as released.
pub fn trigger_asserted<T: InputPin>(trigger: &mut T) -> bool {
    match trigger.is_low() {
        Ok(low) => low,
        Err(e) => {
            warn!("Trigger read failed, treating as released: {:?}", e);
            false
        }
    }
}

pub struct SampleCollector {
    settings: CollectorSettings,
}

impl SampleCollector {
    pub const fn new(settings: CollectorSettings) -> Self {
        Self { settings }
    }

    pub const fn settings(&self) -> &CollectorSettings {
        &self.settings
    }

    /// Collect batches until the trigger is released or `limit` batches are stored.
    ///
    /// The trigger is checked before each batch only, so a release mid-batch
    /// still completes all four colors.
    pub fn collect_batch<P: Platform, const CAP: usize>(
        &self,
        board: &mut Board<P>,
        store: &mut SampleStore<CAP>,
        limit: u32,
    ) -> CollectReport {
        let mut report = CollectReport::default();
        let mut counter = 0;

        while counter < limit && trigger_asserted(&mut board.trigger) {
            let flag = PositionFlag::for_position(counter, self.settings.batch_size);
            debug!("Collecting batch {} ({:?})", counter, flag);

            for color in LedColor::SEQUENCE {
                let sample = self.read_one(board, counter, flag, color, &mut report);
                if let PushOutcome::Overwrote(_) = store.push(sample) {
                    report.overwrites += 1;
                }
            }

            counter += 1;
            report.batches = counter;
            board.delay.delay_ms(self.settings.inter_batch_ms);
        }

        info!(
            "Collected {} batch(es), {} failed read(s), {} sample(s) stored",
            report.batches,
            report.read_failures,
            store.len()
        );
        report
    }

    fn read_one<P: Platform>(
        &self,
        board: &mut Board<P>,
        batch_id: u32,
        position_flag: PositionFlag,
        color: LedColor,
        report: &mut CollectReport,
    ) -> Sample {
        board.light.set_color(color, self.settings.intensity);
        board.delay.delay_ms(self.settings.settle_ms);

        let reading = board.sensor.read_all_channels();
        board.light.off();

        let (channels, status) = match reading {
            Ok(channels) => (channels, SampleStatus::Valid),
            Err(e) => {
                warn!("Sensor read under {} light failed: {}", color.label(), e);
                report.read_failures += 1;
                (Sample::zeroed_channels(), SampleStatus::ReadFailed)
            }
        };

        let timestamp = board.clock.now().unwrap_or_else(|e| {
            warn!("Clock read failed, stamping sample with 0: {}", e);
            report.clock_failures += 1;
            0
        });

        Sample {
            timestamp,
            batch_id,
            position_flag,
            led_color: color,
            led_intensity: self.settings.intensity,
            channels,
            status,
        }
    }
}
