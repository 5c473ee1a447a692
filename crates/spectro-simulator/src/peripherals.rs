//! Simulated local peripherals: optical sensor, RTC, RGB light, trigger input,
//! delay, system figures and sleep control.

use std::cell::Cell;
use std::convert::Infallible;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin};
use log::{debug, info, warn};

use spectro_core::light::{LedColor, LedPolarity, LightSource, duty_for};
use spectro_core::scheduler::{WakeCause, WakeControl, WakeSources};
use spectro_core::sensors::{
    CHANNEL_COUNT, Channels, Clock, ClockError, SensorError, SensorGain, SpectralSensor,
};
use spectro_core::telemetry::SystemInfo;

/// Longest real sleep the simulator performs for a single wait
const MAX_REAL_SLEEP: Duration = Duration::from_secs(2);

/// Real time spent per simulated millisecond.
#[derive(Debug, Clone, Copy)]
pub struct TimeScale(pub f64);

impl TimeScale {
    fn sleep_ms(self, ms: u64) {
        let real = Duration::from_secs_f64(ms as f64 / 1000.0 * self.0).min(MAX_REAL_SLEEP);
        if !real.is_zero() {
            thread::sleep(real);
        }
    }
}

pub struct SimDelay {
    pub scale: TimeScale,
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.scale.sleep_ms(u64::from(ns) / 1_000_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.scale.sleep_ms(u64::from(ms));
    }
}

/// Relative response of each channel slot under each light color, in percent.
const RESPONSE: [(LedColor, [u16; CHANNEL_COUNT]); 4] = [
    (LedColor::Red, [2, 3, 4, 6, 60, 30, 10, 35, 90, 70, 60, 30]),
    (LedColor::Green, [5, 15, 40, 85, 55, 5, 90, 40, 10, 4, 55, 5]),
    (LedColor::Blue, [40, 90, 70, 30, 50, 3, 8, 3, 2, 2, 50, 3]),
    (LedColor::White, [45, 80, 75, 80, 100, 35, 85, 70, 80, 65, 100, 35]),
];

/// Synthetic optical sensor. Readings follow the color currently shown by the
/// light, scaled by gain and intensity, with a little noise.
pub struct SimSensor {
    light: Rc<Cell<Option<(LedColor, u8)>>>,
    gain: SensorGain,
    reads: u32,
    fail_every: u32,
    seed: u32,
}

impl SimSensor {
    pub fn new(light: Rc<Cell<Option<(LedColor, u8)>>>, fail_every: u32) -> Self {
        Self {
            light,
            gain: SensorGain::X1,
            reads: 0,
            fail_every,
            seed: 0x2545_f491,
        }
    }

    fn noise(&mut self) -> u32 {
        // xorshift32
        self.seed ^= self.seed << 13;
        self.seed ^= self.seed >> 17;
        self.seed ^= self.seed << 5;
        self.seed % 64
    }
}

impl SpectralSensor for SimSensor {
    fn init(&mut self, gain: SensorGain) -> Result<(), SensorError> {
        info!("Simulated sensor online (gain {:?})", gain);
        self.gain = gain;
        Ok(())
    }

    fn read_all_channels(&mut self) -> Result<Channels, SensorError> {
        self.reads += 1;
        if self.fail_every > 0 && self.reads % self.fail_every == 0 {
            return Err(SensorError::ReadFailed {
                sensor: "SimSensor",
                operation: "read all channels",
                details: "injected failure",
            });
        }

        let (color, intensity) = self.light.get().unwrap_or((LedColor::White, 0));
        let response = RESPONSE
            .iter()
            .find(|(c, _)| *c == color)
            .map(|(_, r)| *r)
            .unwrap_or([0; CHANNEL_COUNT]);

        // 0.5x is register value 0
        let gain = 1u32 << self.gain.register_value();
        let mut channels = [0u16; CHANNEL_COUNT];
        for (slot, pct) in channels.iter_mut().zip(response) {
            let signal = u32::from(pct) * u32::from(intensity) * gain / 64;
            *slot = (signal + self.noise()).min(u32::from(u16::MAX)) as u16;
        }
        Ok(channels)
    }
}

/// RTC backed by the host clock.
pub struct SimClock;

impl Clock for SimClock {
    fn now(&mut self) -> Result<u32, ClockError> {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .map_err(|_| ClockError::TimeNotSet)
    }
}

/// RGB LED on three PWM channels.
pub struct SimLight {
    polarity: LedPolarity,
    max_duty: u16,
    /// Shared with the sensor so readings match the illumination
    shown: Rc<Cell<Option<(LedColor, u8)>>>,
}

impl SimLight {
    pub fn new(polarity: LedPolarity, max_duty: u16) -> Self {
        Self {
            polarity,
            max_duty,
            shown: Rc::new(Cell::new(None)),
        }
    }

    pub fn shown(&self) -> Rc<Cell<Option<(LedColor, u8)>>> {
        self.shown.clone()
    }

    fn write_duties(&self, (r, g, b): (u8, u8, u8)) -> [u16; 3] {
        [r, g, b].map(|pct| duty_for(pct, self.max_duty, self.polarity))
    }
}

impl LightSource for SimLight {
    fn set_color(&mut self, color: LedColor, intensity: u8) {
        let duties = self.write_duties(color.rgb_mix(intensity));
        debug!("LED {} at {}% -> duty {:?}", color.label(), intensity, duties);
        self.shown.set(Some((color, intensity)));
    }

    fn off(&mut self) {
        let duties = self.write_duties((0, 0, 0));
        debug!("LED off -> duty {:?}", duties);
        self.shown.set(None);
    }
}

/// Sample-present input. Reads low while a simulated sample is inserted.
///
/// The wake controller inserts a sample for a number of reads; each read
/// consumes one.
pub struct SimTrigger {
    low_reads: Rc<Cell<u32>>,
}

impl SimTrigger {
    pub fn new(low_reads: Rc<Cell<u32>>) -> Self {
        Self { low_reads }
    }
}

impl ErrorType for SimTrigger {
    type Error = Infallible;
}

impl InputPin for SimTrigger {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.is_low().map(|low| !low)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        let left = self.low_reads.get();
        if left == 0 {
            return Ok(false);
        }
        self.low_reads.set(left - 1);
        Ok(true)
    }
}

pub struct SimSystem {
    started: Instant,
    checksum: String,
    size: u32,
}

impl SimSystem {
    pub fn new() -> Self {
        let size = std::env::current_exe()
            .and_then(std::fs::metadata)
            .map(|m| m.len().min(u64::from(u32::MAX)) as u32)
            .unwrap_or(0);
        Self {
            started: Instant::now(),
            checksum: format!("sim-{}", env!("CARGO_PKG_VERSION")),
            size,
        }
    }
}

impl SystemInfo for SimSystem {
    fn uptime_ms(&mut self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn cpu_frequency_mhz(&mut self) -> u32 {
        240
    }

    fn heap_usage(&mut self) -> (usize, usize) {
        (96 * 1024, 320 * 1024)
    }

    fn temperature_c(&mut self) -> Option<f32> {
        Some(38.5)
    }

    fn firmware_checksum(&mut self) -> &str {
        &self.checksum
    }

    fn firmware_size(&mut self) -> u32 {
        self.size
    }
}

/// Sleep controller that alternates timer wakes with sample insertions.
pub struct SimWake {
    scale: TimeScale,
    wakes: u32,
    trigger_every: u32,
    hold_reads: u32,
    low_reads: Rc<Cell<u32>>,
}

impl SimWake {
    /// Every `trigger_every`th wake is a sample insertion holding the trigger
    /// low for `hold_reads` reads.
    pub fn new(scale: TimeScale, trigger_every: u32, hold_reads: u32) -> Self {
        Self {
            scale,
            wakes: 0,
            trigger_every: trigger_every.max(1),
            hold_reads,
            low_reads: Rc::new(Cell::new(0)),
        }
    }

    pub fn trigger_line(&self) -> Rc<Cell<u32>> {
        self.low_reads.clone()
    }
}

impl WakeControl for SimWake {
    fn light_sleep(&mut self, sources: &WakeSources) -> WakeCause {
        self.wakes += 1;
        if sources.trigger_low && self.wakes % self.trigger_every == 0 {
            // Sample inserted shortly after falling asleep
            self.scale.sleep_ms(1000);
            self.low_reads.set(self.hold_reads);
            return WakeCause::Trigger;
        }
        self.scale.sleep_ms(u64::from(sources.timer_s) * 1000);
        WakeCause::Timer
    }

    fn restart(&mut self) -> ! {
        warn!("Restart requested, exiting simulator");
        std::process::exit(1);
    }
}
