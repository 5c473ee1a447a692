//! Simulated WiFi station and an in-process MQTT broker.
//!
//! The broker plays the role of the backend: batch messages are decoded and
//! regrouped into per-cycle sessions so the flag protocol can be observed.

use std::convert::Infallible;
use std::net::Ipv4Addr;

use log::{debug, info, warn};

use spectro_core::connectivity::{MacAddress, MqttSession, WifiLink};
use spectro_core::telemetry::{BatchAssembler, decode_batch};

/// Processing ticks needed to flush one published message
const TICKS_PER_MESSAGE: u32 = 2;

pub struct SimWifi {
    reachable: bool,
    polls_to_associate: u32,
    countdown: Option<u32>,
    associated: bool,
}

impl SimWifi {
    pub fn new(reachable: bool, polls_to_associate: u32) -> Self {
        Self {
            reachable,
            polls_to_associate,
            countdown: None,
            associated: false,
        }
    }
}

impl WifiLink for SimWifi {
    type Error = Infallible;

    fn is_associated(&mut self) -> bool {
        if !self.associated {
            if let Some(left) = self.countdown {
                if left <= 1 {
                    self.associated = true;
                    self.countdown = None;
                } else {
                    self.countdown = Some(left - 1);
                }
            }
        }
        self.associated
    }

    fn disassociate(&mut self) {
        self.associated = false;
        self.countdown = None;
    }

    fn begin_association(&mut self, ssid: &str, _password: &str) -> Result<(), Self::Error> {
        debug!("Simulated association request for '{}'", ssid);
        if self.reachable {
            self.countdown = Some(self.polls_to_associate);
        }
        Ok(())
    }

    fn mac_address(&mut self) -> MacAddress {
        MacAddress([0x02, 0x53, 0x50, 0x45, 0x43, 0x01])
    }

    fn rssi(&mut self) -> Option<i8> {
        self.associated.then_some(-57)
    }

    fn ip_address(&mut self) -> Option<Ipv4Addr> {
        self.associated.then_some(Ipv4Addr::new(10, 0, 0, 42))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerError {
    Unreachable,
    NotConnected,
}

pub struct LoopbackBroker {
    batch_topic: String,
    online: bool,
    connected: bool,
    endpoint: Option<(String, u16)>,
    busy_ticks: u32,
    assembler: BatchAssembler<256>,
    pub messages: u32,
    pub sessions_closed: u32,
}

impl LoopbackBroker {
    pub fn new(batch_topic: &str, online: bool) -> Self {
        Self {
            batch_topic: batch_topic.to_owned(),
            online,
            connected: false,
            endpoint: None,
            busy_ticks: 0,
            assembler: BatchAssembler::new(),
            messages: 0,
            sessions_closed: 0,
        }
    }

    fn consume_batch(&mut self, payload: &[u8]) {
        let samples = match decode_batch(payload) {
            Ok(samples) => samples,
            Err(e) => {
                warn!("Broker received an undecodable batch: {}", e);
                return;
            }
        };
        debug!("Broker received {} sample(s)", samples.len());

        for sample in samples {
            if let Some(session) = self.assembler.accept(sample) {
                self.sessions_closed += 1;
                let first = session.first().map_or(0, |s| s.timestamp);
                let last = session.last().map_or(0, |s| s.timestamp);
                let failed = session
                    .iter()
                    .filter(|s| s.channels.iter().all(|&c| c == 0))
                    .count();
                info!(
                    "Backend: sample session #{} complete, {} reading(s) from {} to {} ({} empty)",
                    self.sessions_closed,
                    session.len(),
                    first,
                    last,
                    failed
                );
            }
        }
    }
}

impl MqttSession for LoopbackBroker {
    type Error = BrokerError;

    fn set_endpoint(&mut self, host: &str, port: u16) {
        self.endpoint = Some((host.to_owned(), port));
    }

    fn connect(&mut self, client_id: &str) -> Result<(), Self::Error> {
        let reachable = self.online && self.endpoint.as_ref().is_some_and(|(h, _)| !h.is_empty());
        if !reachable {
            return Err(BrokerError::Unreachable);
        }
        debug!("Client '{}' connected", client_id);
        self.connected = true;
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        self.connected
    }

    fn set_buffer_size(&mut self, bytes: usize) -> bool {
        debug!("Client buffer resized to {} bytes", bytes);
        true
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Self::Error> {
        if !self.connected {
            return Err(BrokerError::NotConnected);
        }
        self.messages += 1;
        self.busy_ticks += TICKS_PER_MESSAGE;

        if topic == self.batch_topic {
            self.consume_batch(payload);
        } else {
            match serde_json::from_slice::<serde_json::Value>(payload) {
                Ok(doc) => info!("Backend: [{}] {}", topic, doc),
                Err(e) => warn!("Backend: [{}] invalid JSON: {}", topic, e),
            }
        }
        Ok(())
    }

    fn poll(&mut self) {
        self.busy_ticks = self.busy_ticks.saturating_sub(1);
    }

    fn is_idle(&mut self) -> bool {
        self.busy_ticks == 0
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }
}
