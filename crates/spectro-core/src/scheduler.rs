//! Wake/sleep cycle orchestration.
//!
//! The node spends most of its life in light sleep. Each wake runs one cycle:
//! a liveness blink, an optional collection run while the trigger is held, a
//! report over a freshly checked link and session, a bounded drain, and back to
//! sleep. Collection is skipped on a plain timer wake with nothing left to
//! report, in which case only vitals are published.

use core::fmt::Write;

use embedded_hal::delay::DelayNs;
use heapless::String;
use log::{debug, error, info, warn};

use crate::acquisition::{CollectReport, CollectorSettings, SampleCollector, trigger_asserted};
use crate::app_state::{AppError, NodeContext, RunState};
use crate::board::{Board, Platform};
use crate::config::Config;
use crate::connectivity::ConnectivityManager;
use crate::light::{LedColor, LightSource};
use crate::sensors::{Clock, SpectralSensor};
use crate::telemetry::{Delivery, LogCode, TelemetryError, TelemetryReporter};

/// Pause between a fatal boot error and the reset, so the log can be read
pub const RESTART_DELAY_MS: u32 = 5000;

/// Duration of the white flash at the start of every wake
pub const LIVENESS_BLINK_MS: u32 = 100;

/// Wake sources armed before entering light sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeSources {
    /// Wake when the trigger input reads low
    pub trigger_low: bool,
    pub timer_s: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeCause {
    Trigger,
    Timer,
    Other,
}

/// Low-power and reset control.
pub trait WakeControl {
    /// Block in light sleep until one of `sources` fires. RAM is retained.
    fn light_sleep(&mut self, sources: &WakeSources) -> WakeCause;

    /// Full system reset. All in-memory state is lost.
    fn restart(&mut self) -> !;
}

/// What one wake cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// `None` for a vitals-only cycle
    pub collected: Option<CollectReport>,
    pub batch: Option<Result<Delivery, TelemetryError>>,
    pub vitals: Option<Result<Delivery, TelemetryError>>,
    pub session_open: bool,
    /// Batches still waiting for a broker after this cycle
    pub pending_groups: usize,
}

pub struct WakeScheduler<'a, P: Platform, const CAP: usize> {
    config: Config<'a>,
    board: Board<P>,
    conn: ConnectivityManager<'a, P::Link, P::Session>,
    collector: SampleCollector,
    reporter: TelemetryReporter,
    ctx: NodeContext<CAP>,
}

impl<'a, P: Platform, const CAP: usize> WakeScheduler<'a, P, CAP> {
    pub fn new(config: Config<'a>, board: Board<P>, link: P::Link, session: P::Session) -> Self {
        Self {
            collector: SampleCollector::new(CollectorSettings::from(&config.acquisition)),
            conn: ConnectivityManager::new(link, session, config.internet, config.broker),
            reporter: TelemetryReporter::new(),
            ctx: NodeContext::new(),
            board,
            config,
        }
    }

    /// One-time peripheral bring-up. Invalid config, sensor and clock failures are fatal.
    pub fn boot(&mut self) -> Result<(), AppError> {
        info!("Booting spectro node");
        self.board.light.off();

        self.config
            .validate()
            .inspect_err(|e| error!("Rejecting node configuration: {}", e))?;

        self.board
            .sensor
            .init(self.config.acquisition.sensor_gain)
            .inspect_err(|e| error!("Optical sensor bring-up failed: {}", e))?;
        info!(
            "Optical sensor ready (gain {:?})",
            self.config.acquisition.sensor_gain
        );

        let now = self
            .board
            .clock
            .now()
            .inspect_err(|e| error!("Real-time clock unavailable: {}", e))?;
        info!("RTC time {}", now);

        if !self.config.cycle_fits(CAP) {
            warn!(
                "{} batches per cycle exceed the {} sample store, early samples will be overwritten",
                self.config.acquisition.batch_size, CAP
            );
        }

        let timeout_s = self.conn.link_timeout_s();
        if !self.conn.ensure_link(&mut self.board.delay, timeout_s) {
            warn!("No WiFi at boot, continuing offline");
        }

        self.ctx.transition(RunState::Sleeping);
        Ok(())
    }

    /// Boot, or reset the whole system after [`RESTART_DELAY_MS`] if that fails.
    pub fn boot_or_restart(&mut self) {
        if let Err(e) = self.boot() {
            error!(
                "Boot failed: {}. Restarting in {} ms",
                e, RESTART_DELAY_MS
            );
            self.board.delay.delay_ms(RESTART_DELAY_MS);
            self.board.wake.restart();
        }
    }

    /// Run one wake cycle from `Woken` back to `Sleeping`.
    pub fn run_cycle(&mut self) -> CycleReport {
        self.ctx.transition(RunState::Woken);
        self.blink();

        let asserted = trigger_asserted(&mut self.board.trigger);
        let report = if asserted || self.ctx.pending_groups > 0 {
            if !asserted {
                info!(
                    "Trigger released, retrying {} unreported batch(es)",
                    self.ctx.pending_groups
                );
            }
            self.collect_and_report()
        } else {
            self.report_vitals_only()
        };

        self.ctx.transition(RunState::Draining);
        if self.conn.is_session_open() {
            self.conn.drain_and_close(&mut self.board.delay);
        }

        self.ctx.transition(RunState::Sleeping);
        self.ctx.cycles += 1;
        debug!("Cycle {} finished: {:?}", self.ctx.cycles, report);
        report
    }

    fn blink(&mut self) {
        self.board.light.set_color(LedColor::White, 100);
        self.board.delay.delay_ms(LIVENESS_BLINK_MS);
        self.board.light.off();
    }

    fn collect_and_report(&mut self) -> CycleReport {
        self.ctx.transition(RunState::Collecting);
        let collected = self.collector.collect_batch(
            &mut self.board,
            &mut self.ctx.store,
            self.config.acquisition.batch_size,
        );
        self.ctx.add_pending(collected.batches as usize);

        self.ctx.transition(RunState::Reporting);
        let session_open = self.connect();
        let now = self.timestamp();
        let timestamp = now.unwrap_or(0);

        let batch =
            self.reporter
                .send_batch(&mut self.conn, &self.ctx.store, self.ctx.pending_groups);
        match batch {
            Ok(Delivery::NoSession) => warn!(
                "Keeping {} batch(es) for the next cycle",
                self.ctx.pending_groups
            ),
            Ok(_) => self.ctx.pending_groups = 0,
            Err(e) => {
                // Attempted data counts as sent
                error!("Batch report failed: {}", e);
                self.ctx.pending_groups = 0;
                if let TelemetryError::PayloadTooLarge { .. } = e {
                    self.log_event(timestamp, LogCode::PayloadTooLarge, format_args!("{}", e));
                }
            }
        }

        if collected.read_failures > 0 {
            self.log_event(
                timestamp,
                LogCode::SensorRead,
                format_args!(
                    "{} of {} sensor read(s) failed",
                    collected.read_failures,
                    collected.batches as usize * LedColor::SEQUENCE.len()
                ),
            );
        }
        if collected.overwrites > 0 {
            self.log_event(
                timestamp,
                LogCode::BufferOverwrite,
                format_args!("{} sample(s) overwritten", collected.overwrites),
            );
        }
        let clock_failures = collected.clock_failures + u32::from(now.is_none());
        self.report_clock_failures(timestamp, clock_failures);

        let vitals = self.send_vitals(timestamp);

        CycleReport {
            collected: Some(collected),
            batch: Some(batch),
            vitals: Some(vitals),
            session_open,
            pending_groups: self.ctx.pending_groups,
        }
    }

    fn report_vitals_only(&mut self) -> CycleReport {
        self.ctx.transition(RunState::ReportingVitalsOnly);
        let session_open = self.connect();
        let now = self.timestamp();
        let timestamp = now.unwrap_or(0);

        self.report_clock_failures(timestamp, u32::from(now.is_none()));
        let vitals = self.send_vitals(timestamp);

        CycleReport {
            collected: None,
            batch: None,
            vitals: Some(vitals),
            session_open,
            pending_groups: self.ctx.pending_groups,
        }
    }

    /// One `CLOCK_READ` device log per cycle, however many reads failed.
    fn report_clock_failures(&mut self, timestamp: u32, failures: u32) {
        if failures > 0 {
            self.log_event(
                timestamp,
                LogCode::ClockRead,
                format_args!("{} clock read(s) failed, timestamps set to 0", failures),
            );
        }
    }

    fn connect(&mut self) -> bool {
        let timeout_s = self.conn.link_timeout_s();
        let retries = self.conn.session_retries();
        self.conn.ensure_link(&mut self.board.delay, timeout_s)
            && self.conn.ensure_session(&mut self.board.delay, retries)
    }

    fn send_vitals(&mut self, timestamp: u32) -> Result<Delivery, TelemetryError> {
        self.reporter
            .send_vitals(&mut self.conn, &mut self.board.system, timestamp)
            .inspect_err(|e| error!("Vitals report failed: {}", e))
    }

    fn log_event(&mut self, timestamp: u32, code: LogCode, message: core::fmt::Arguments<'_>) {
        let mut text: String<128> = String::new();
        if write!(text, "{}", message).is_err() {
            debug!("Log message for {} truncated", code.as_str());
        }
        if let Err(e) = self
            .reporter
            .send_log(&mut self.conn, timestamp, code, &text)
        {
            warn!("Could not publish {} log: {}", code.as_str(), e);
        }
    }

    fn timestamp(&mut self) -> Option<u32> {
        self.board
            .clock
            .now()
            .inspect_err(|e| warn!("Clock read failed: {}", e))
            .ok()
    }

    /// Arm the trigger and timer wake sources and enter light sleep.
    pub fn sleep(&mut self) -> WakeCause {
        let sources = WakeSources {
            trigger_low: true,
            timer_s: self.config.schedule.wake_interval_s,
        };
        info!(
            "Entering light sleep (timer {} s, trigger armed)",
            sources.timer_s
        );
        let cause = self.board.wake.light_sleep(&sources);
        info!("Woke up: {:?}", cause);
        cause
    }

    /// Boot, then alternate sleep and wake cycles forever.
    pub fn run(&mut self) -> ! {
        self.boot_or_restart();
        loop {
            self.sleep();
            self.run_cycle();
        }
    }

    pub fn context(&self) -> &NodeContext<CAP> {
        &self.ctx
    }

    pub fn config(&self) -> &Config<'a> {
        &self.config
    }

    pub fn connectivity(&mut self) -> &mut ConnectivityManager<'a, P::Link, P::Session> {
        &mut self.conn
    }

    pub fn board(&mut self) -> &mut Board<P> {
        &mut self.board
    }
}
