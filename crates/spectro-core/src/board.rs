//! Peripheral bundle the engine runs against.
//!
//! A [`Platform`] names one concrete type per peripheral; firmware binds the real
//! drivers, the simulator and tests bind their own doubles.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::InputPin;

use crate::connectivity::{MqttSession, WifiLink};
use crate::light::LightSource;
use crate::scheduler::WakeControl;
use crate::sensors::{Clock, SpectralSensor};
use crate::telemetry::SystemInfo;

pub trait Platform {
    type Sensor: SpectralSensor;
    type Clock: Clock;
    type Light: LightSource;
    /// Sample-present input, active low
    type Trigger: InputPin;
    type Delay: DelayNs;
    type Link: WifiLink;
    type Session: MqttSession;
    type System: SystemInfo;
    type Wake: WakeControl;
}

/// Local peripherals. The radio and broker client are owned by the
/// connectivity manager instead.
pub struct Board<P: Platform> {
    pub sensor: P::Sensor,
    pub clock: P::Clock,
    pub light: P::Light,
    pub trigger: P::Trigger,
    pub delay: P::Delay,
    pub system: P::System,
    pub wake: P::Wake,
}
