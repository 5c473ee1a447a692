//! Hand-written peripheral and transport doubles for unit tests.

extern crate std;

use alloc::collections::VecDeque;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::convert::Infallible;
use core::net::Ipv4Addr;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, ErrorKind, ErrorType, InputPin};

use crate::board::{Board, Platform};
use crate::connectivity::{MacAddress, MqttSession, WifiLink};
use crate::light::{LedColor, LightSource};
use crate::scheduler::{WakeCause, WakeControl, WakeSources};
use crate::sensors::{
    CHANNEL_COUNT, Channels, Clock, ClockError, SensorError, SensorGain, SpectralSensor,
};
use crate::storage::{PositionFlag, Sample, SampleStatus};
use crate::telemetry::SystemInfo;

std::thread_local! {
    static RECORDED: core::cell::RefCell<Vec<(log::Level, String)>> =
        const { core::cell::RefCell::new(Vec::new()) };
}

/// Logger keeping each test thread's records apart.
struct RecordingLogger;

impl log::Log for RecordingLogger {
    fn enabled(&self, _metadata: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &log::Record<'_>) {
        let line = format!("{}", record.args());
        RECORDED.with(|r| r.borrow_mut().push((record.level(), line)));
    }

    fn flush(&self) {}
}

static LOGGER: RecordingLogger = RecordingLogger;

/// Start recording log output on the current thread, discarding earlier records.
pub fn record_logs() {
    // Only the first test to get here installs the logger
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(log::LevelFilter::Trace);
    RECORDED.with(|r| r.borrow_mut().clear());
}

/// Messages recorded on this thread at `level` since [`record_logs`].
pub fn recorded(level: log::Level) -> Vec<String> {
    RECORDED.with(|r| {
        r.borrow()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, line)| line.clone())
            .collect()
    })
}

pub fn sample_with_ts(ts: u32) -> Sample {
    Sample {
        timestamp: ts,
        batch_id: 0,
        position_flag: PositionFlag::Middle,
        led_color: LedColor::Red,
        led_intensity: 50,
        channels: [ts as u16; CHANNEL_COUNT],
        status: SampleStatus::Valid,
    }
}

/// Records every millisecond wait instead of sleeping.
#[derive(Default)]
pub struct MockDelay {
    pub waits_ms: Vec<u32>,
    pub total_ms: u64,
    pub total_ns: u64,
}

impl MockDelay {
    pub fn calls_of(&self, ms: u32) -> usize {
        self.waits_ms.iter().filter(|&&w| w == ms).count()
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }

    fn delay_us(&mut self, us: u32) {
        self.total_ns += u64::from(us) * 1000;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.waits_ms.push(ms);
        self.total_ms += u64::from(ms);
    }
}

/// Station that associates after a configurable number of status polls.
pub struct MockWifi {
    pub mac: MacAddress,
    pub association_requests: u32,
    pub disassociations: u32,
    /// Polls needed after a request, `None` if never reachable
    pub polls_needed: Option<u32>,
    associated: bool,
    countdown: Option<u32>,
}

impl MockWifi {
    pub const MAC: MacAddress = MacAddress([0x24, 0x0a, 0xc4, 0x12, 0x34, 0x56]);

    /// Never associates
    pub fn never() -> Self {
        Self {
            mac: Self::MAC,
            association_requests: 0,
            disassociations: 0,
            associated: false,
            polls_needed: None,
            countdown: None,
        }
    }

    /// Associates on the `n`th status poll after a request (0 and 1 both mean the first poll)
    pub fn after_polls(n: u32) -> Self {
        Self {
            polls_needed: Some(n),
            ..Self::never()
        }
    }

    pub fn drop_association(&mut self) {
        self.associated = false;
        self.countdown = None;
    }
}

impl WifiLink for MockWifi {
    type Error = Infallible;

    fn is_associated(&mut self) -> bool {
        if self.associated {
            return true;
        }
        match self.countdown {
            Some(c) if c <= 1 => {
                self.associated = true;
                self.countdown = None;
                true
            }
            Some(c) => {
                self.countdown = Some(c - 1);
                false
            }
            None => false,
        }
    }

    fn disassociate(&mut self) {
        self.disassociations += 1;
        self.drop_association();
    }

    fn begin_association(&mut self, _ssid: &str, _password: &str) -> Result<(), Self::Error> {
        self.association_requests += 1;
        self.countdown = self.polls_needed;
        Ok(())
    }

    fn mac_address(&mut self) -> MacAddress {
        self.mac
    }

    fn rssi(&mut self) -> Option<i8> {
        self.associated.then_some(-58)
    }

    fn ip_address(&mut self) -> Option<Ipv4Addr> {
        self.associated.then_some(Ipv4Addr::new(192, 168, 1, 50))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockSessionError {
    Refused,
    NotConnected,
    Rejected,
}

/// Broker session recording every publish.
pub struct MockSession {
    pub connect_attempts: u32,
    pub buffer_size: Option<usize>,
    pub endpoint: Option<(String, u16)>,
    /// Processing ticks left before the session reports idle
    pub busy_polls: u32,
    pub disconnected: bool,
    pub published: Vec<(String, Vec<u8>)>,
    /// Fail this many publishes before accepting again
    pub reject_publishes: u32,
    connected: bool,
    refusals_left: u32,
}

impl MockSession {
    pub fn accepting() -> Self {
        Self::accept_after(0)
    }

    pub fn refusing() -> Self {
        Self::accept_after(u32::MAX)
    }

    /// Refuse the first `k` connect attempts
    pub fn accept_after(k: u32) -> Self {
        Self {
            connect_attempts: 0,
            buffer_size: None,
            endpoint: None,
            busy_polls: 0,
            disconnected: false,
            published: Vec::new(),
            reject_publishes: 0,
            connected: false,
            refusals_left: k,
        }
    }

    pub fn topics(&self) -> Vec<&str> {
        self.published.iter().map(|(t, _)| t.as_str()).collect()
    }

    pub fn payloads_on(&self, topic: &str) -> Vec<&str> {
        self.published
            .iter()
            .filter(|(t, _)| t == topic)
            .filter_map(|(_, p)| core::str::from_utf8(p).ok())
            .collect()
    }
}

impl MqttSession for MockSession {
    type Error = MockSessionError;

    fn set_endpoint(&mut self, host: &str, port: u16) {
        self.endpoint = Some((String::from(host), port));
    }

    fn connect(&mut self, _client_id: &str) -> Result<(), Self::Error> {
        self.connect_attempts += 1;
        if self.refusals_left > 0 {
            self.refusals_left -= 1;
            return Err(MockSessionError::Refused);
        }
        self.connected = true;
        self.disconnected = false;
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        self.connected
    }

    fn set_buffer_size(&mut self, bytes: usize) -> bool {
        self.buffer_size = Some(bytes);
        true
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Self::Error> {
        if !self.connected {
            return Err(MockSessionError::NotConnected);
        }
        if self.reject_publishes > 0 {
            self.reject_publishes -= 1;
            return Err(MockSessionError::Rejected);
        }
        self.published.push((String::from(topic), payload.to_vec()));
        Ok(())
    }

    fn poll(&mut self) {
        self.busy_polls = self.busy_polls.saturating_sub(1);
    }

    fn is_idle(&mut self) -> bool {
        self.busy_polls == 0
    }

    fn disconnect(&mut self) {
        self.disconnected = true;
        self.connected = false;
    }
}

/// Sensor replaying scripted readouts, then a counter pattern.
#[derive(Default)]
pub struct MockSensor {
    pub script: VecDeque<Result<Channels, SensorError>>,
    pub init_error: Option<SensorError>,
    pub gain: Option<SensorGain>,
    pub reads: u32,
}

impl MockSensor {
    pub const FAILURE: SensorError = SensorError::ReadFailed {
        sensor: "mock",
        operation: "read_all_channels",
        details: "scripted failure",
    };

    pub fn failing_on(reads: &[usize]) -> Self {
        let last = reads.iter().copied().max().map_or(0, |m| m + 1);
        let script = (0..last)
            .map(|i| {
                if reads.contains(&i) {
                    Err(Self::FAILURE)
                } else {
                    Ok([i as u16 + 1; CHANNEL_COUNT])
                }
            })
            .collect();
        Self {
            script,
            ..Self::default()
        }
    }
}

impl SpectralSensor for MockSensor {
    fn init(&mut self, gain: SensorGain) -> Result<(), SensorError> {
        if let Some(e) = self.init_error {
            return Err(e);
        }
        self.gain = Some(gain);
        Ok(())
    }

    fn read_all_channels(&mut self) -> Result<Channels, SensorError> {
        self.reads += 1;
        self.script
            .pop_front()
            .unwrap_or(Ok([self.reads as u16; CHANNEL_COUNT]))
    }
}

/// Clock ticking one second per reading.
pub struct MockClock {
    pub time: u32,
    pub error: Option<ClockError>,
}

impl Default for MockClock {
    fn default() -> Self {
        Self {
            time: 1_700_000_000,
            error: None,
        }
    }
}

impl Clock for MockClock {
    fn now(&mut self) -> Result<u32, ClockError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let t = self.time;
        self.time += 1;
        Ok(t)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightEvent {
    On(LedColor, u8),
    Off,
}

#[derive(Default)]
pub struct MockLight {
    pub events: Vec<LightEvent>,
}

impl MockLight {
    pub fn is_off(&self) -> bool {
        matches!(self.events.last(), None | Some(LightEvent::Off))
    }
}

impl LightSource for MockLight {
    fn set_color(&mut self, color: LedColor, intensity: u8) {
        self.events.push(LightEvent::On(color, intensity));
    }

    fn off(&mut self) {
        self.events.push(LightEvent::Off);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockPinError;

impl digital::Error for MockPinError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Trigger input replaying scripted levels, then holding `rest_low`.
///
/// `Some(true)` is a LOW (asserted) reading, `None` a read error.
pub struct MockTrigger {
    pub script: VecDeque<Option<bool>>,
    pub rest_low: bool,
    pub reads: u32,
}

impl MockTrigger {
    pub fn held_low() -> Self {
        Self::scripted(&[], true)
    }

    pub fn released() -> Self {
        Self::scripted(&[], false)
    }

    pub fn scripted(levels: &[Option<bool>], rest_low: bool) -> Self {
        Self {
            script: levels.iter().copied().collect(),
            rest_low,
            reads: 0,
        }
    }

    /// Low for the first `n` reads, released afterwards
    pub fn low_for(n: usize) -> Self {
        Self {
            script: core::iter::repeat_n(Some(true), n).collect(),
            rest_low: false,
            reads: 0,
        }
    }

    fn next_low(&mut self) -> Result<bool, MockPinError> {
        self.reads += 1;
        match self.script.pop_front() {
            Some(Some(low)) => Ok(low),
            Some(None) => Err(MockPinError),
            None => Ok(self.rest_low),
        }
    }
}

impl ErrorType for MockTrigger {
    type Error = MockPinError;
}

impl InputPin for MockTrigger {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.next_low().map(|low| !low)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.next_low()
    }
}

pub struct MockSystem {
    pub checksum: &'static str,
}

impl Default for MockSystem {
    fn default() -> Self {
        Self {
            checksum: "9f86d081",
        }
    }
}

impl SystemInfo for MockSystem {
    fn uptime_ms(&mut self) -> u64 {
        123_456
    }

    fn cpu_frequency_mhz(&mut self) -> u32 {
        240
    }

    fn heap_usage(&mut self) -> (usize, usize) {
        (1024, 4096)
    }

    fn temperature_c(&mut self) -> Option<f32> {
        Some(41.5)
    }

    fn firmware_checksum(&mut self) -> &str {
        self.checksum
    }

    fn firmware_size(&mut self) -> u32 {
        1_048_576
    }
}

/// Wake controller replaying scripted causes; restart aborts the test.
#[derive(Default)]
pub struct MockWake {
    pub causes: VecDeque<WakeCause>,
    pub sleeps: Vec<WakeSources>,
}

impl WakeControl for MockWake {
    fn light_sleep(&mut self, sources: &WakeSources) -> WakeCause {
        self.sleeps.push(*sources);
        self.causes.pop_front().unwrap_or(WakeCause::Timer)
    }

    fn restart(&mut self) -> ! {
        panic!("restart requested");
    }
}

pub struct MockPlatform;

impl Platform for MockPlatform {
    type Sensor = MockSensor;
    type Clock = MockClock;
    type Light = MockLight;
    type Trigger = MockTrigger;
    type Delay = MockDelay;
    type Link = MockWifi;
    type Session = MockSession;
    type System = MockSystem;
    type Wake = MockWake;
}

pub fn mock_board(sensor: MockSensor, trigger: MockTrigger) -> Board<MockPlatform> {
    Board {
        sensor,
        clock: MockClock::default(),
        light: MockLight::default(),
        trigger,
        delay: MockDelay::default(),
        system: MockSystem::default(),
        wake: MockWake::default(),
    }
}
