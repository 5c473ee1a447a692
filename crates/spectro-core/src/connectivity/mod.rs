//! Connect / retry / flush policy around the WiFi and MQTT primitives.
//!
//! The primitives themselves (radio driver, TCP stack, MQTT client) are reached
//! through [`WifiLink`] and [`MqttSession`]. Every operation here is a soft
//! failure: outcomes are reported as `bool` and logged, never raised.

mod mac;

pub use mac::{MAC_STRING_LEN, MacAddress};

use core::net::Ipv4Addr;

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};
use thiserror_no_std::Error;

use crate::config::{BrokerConfig, InternetConfig};

/// Pause between association status polls and between session attempts
pub const RETRY_BACKOFF_MS: u32 = 1000;

/// Polling step while draining the session before disconnect
pub const DRAIN_POLL_MS: u32 = 10;

/// Outbound buffer requested from the MQTT client once a session is open.
/// Sized for the largest batch payload plus topic and packet framing.
pub const SESSION_BUFFER_BYTES: usize = crate::telemetry::BATCH_PAYLOAD_CAPACITY + 128;

/// WiFi station primitives.
pub trait WifiLink {
    type Error: core::fmt::Debug;

    fn is_associated(&mut self) -> bool;

    /// Drop any current or half-open association.
    fn disassociate(&mut self);

    /// Start associating; completion is observed through [`WifiLink::is_associated`].
    fn begin_association(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error>;

    fn mac_address(&mut self) -> MacAddress;

    /// Received signal strength in dBm, if associated
    fn rssi(&mut self) -> Option<i8>;

    fn ip_address(&mut self) -> Option<Ipv4Addr>;
}

/// MQTT client primitives.
pub trait MqttSession {
    type Error: core::fmt::Debug;

    fn set_endpoint(&mut self, host: &str, port: u16);

    fn connect(&mut self, client_id: &str) -> Result<(), Self::Error>;

    fn is_connected(&mut self) -> bool;

    /// Resize the outbound packet buffer. Returns false if the client refused.
    fn set_buffer_size(&mut self, bytes: usize) -> bool;

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Self::Error>;

    /// Service the client's internal processing tick.
    fn poll(&mut self);

    /// True when nothing is waiting to be written out.
    fn is_idle(&mut self) -> bool;

    fn disconnect(&mut self);
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    #[error("no open broker session")]
    NoSession,
    #[error("broker rejected publish")]
    PublishFailed,
}

/// Link and session status as last observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub link_up: bool,
    pub session_open: bool,
    /// Captured on the first successful association, reused afterwards
    pub mac: Option<MacAddress>,
}

pub struct ConnectivityManager<'a, W, M>
where
    W: WifiLink,
    M: MqttSession,
{
    link: W,
    session: M,
    internet: InternetConfig<'a>,
    broker: BrokerConfig<'a>,
    state: ConnectionState,
}

impl<'a, W, M> ConnectivityManager<'a, W, M>
where
    W: WifiLink,
    M: MqttSession,
{
    pub fn new(link: W, session: M, internet: InternetConfig<'a>, broker: BrokerConfig<'a>) -> Self {
        Self {
            link,
            session,
            internet,
            broker,
            state: ConnectionState::default(),
        }
    }

    /// Make sure the station is associated, waiting up to `timeout_s` one-second polls.
    pub fn ensure_link<D: DelayNs>(&mut self, delay: &mut D, timeout_s: u32) -> bool {
        if self.link.is_associated() {
            self.state.link_up = true;
            self.capture_mac();
            return true;
        }

        self.link.disassociate();
        self.state.link_up = false;
        self.state.session_open = false;

        if self.internet.ssid.is_empty() {
            warn!("No WiFi credentials configured, waiting for association anyway");
        } else {
            info!("Associating with WiFi network '{}'", self.internet.ssid);
            if let Err(e) = self
                .link
                .begin_association(self.internet.ssid, self.internet.password)
            {
                warn!("WiFi association request failed: {:?}", e);
            }
        }

        for attempt in 1..=timeout_s {
            delay.delay_ms(RETRY_BACKOFF_MS);
            if self.link.is_associated() {
                self.state.link_up = true;
                self.capture_mac();
                info!(
                    "WiFi associated after {} s (ip {:?}, rssi {:?})",
                    attempt,
                    self.link.ip_address(),
                    self.link.rssi()
                );
                return true;
            }
            debug!("WiFi not associated yet ({}/{})", attempt, timeout_s);
        }

        warn!("WiFi association timed out after {} s", timeout_s);
        false
    }

    fn capture_mac(&mut self) {
        if self.state.mac.is_none() {
            let mac = self.link.mac_address();
            info!("Device MAC address {}", mac);
            self.state.mac = Some(mac);
        }
    }

    /// Open a broker session, trying up to `retries` times one second apart.
    pub fn ensure_session<D: DelayNs>(&mut self, delay: &mut D, retries: u32) -> bool {
        if !self.state.link_up {
            warn!("Skipping broker session, WiFi link is down");
            self.state.session_open = false;
            return false;
        }

        if self.session.is_connected() {
            self.state.session_open = true;
            return true;
        }

        self.session.set_endpoint(self.broker.host, self.broker.port);

        for attempt in 1..=retries {
            match self.session.connect(self.broker.client_id) {
                Ok(()) => {
                    info!(
                        "Broker session open at {}:{} as '{}' (attempt {}/{})",
                        self.broker.host, self.broker.port, self.broker.client_id, attempt, retries
                    );
                    if !self.session.set_buffer_size(SESSION_BUFFER_BYTES) {
                        warn!(
                            "MQTT client refused {} byte buffer, large batches may be split",
                            SESSION_BUFFER_BYTES
                        );
                    }
                    self.state.session_open = true;
                    return true;
                }
                Err(e) => {
                    warn!(
                        "Broker connect to {}:{} failed (attempt {}/{}): {:?}",
                        self.broker.host, self.broker.port, attempt, retries, e
                    );
                    if attempt < retries {
                        delay.delay_ms(RETRY_BACKOFF_MS);
                    }
                }
            }
        }

        self.state.session_open = false;
        false
    }

    /// Best-effort flush of queued publishes, then disconnect.
    ///
    /// Gives the client up to `drain_budget_ms` of processing ticks; whatever is
    /// still in flight when the budget runs out is dropped.
    pub fn drain_and_close<D: DelayNs>(&mut self, delay: &mut D) {
        let budget_ms = self.broker.drain_budget_ms;
        let mut elapsed_ms = 0;

        loop {
            self.session.poll();
            if self.session.is_idle() {
                debug!("Session idle after {} ms of draining", elapsed_ms);
                break;
            }
            if elapsed_ms >= budget_ms {
                warn!(
                    "Drain budget of {} ms exhausted, in-flight messages may be lost",
                    budget_ms
                );
                break;
            }
            delay.delay_ms(DRAIN_POLL_MS);
            elapsed_ms += DRAIN_POLL_MS;
        }

        self.session.disconnect();
        self.state.session_open = false;
    }

    /// Publish on an open session.
    pub fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), ConnectivityError> {
        if !self.state.session_open || !self.session.is_connected() {
            self.state.session_open = false;
            return Err(ConnectivityError::NoSession);
        }

        self.session.publish(topic, payload).map_err(|e| {
            warn!("Publish of {} bytes on '{}' failed: {:?}", payload.len(), topic, e);
            ConnectivityError::PublishFailed
        })
    }

    pub fn is_session_open(&self) -> bool {
        self.state.session_open
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn mac(&self) -> Option<MacAddress> {
        self.state.mac
    }

    pub fn rssi(&mut self) -> Option<i8> {
        self.link.rssi()
    }

    pub fn ip(&mut self) -> Option<Ipv4Addr> {
        self.link.ip_address()
    }

    pub fn ssid(&self) -> &'a str {
        self.internet.ssid
    }

    pub fn link_timeout_s(&self) -> u32 {
        self.internet.link_timeout_s
    }

    pub fn session_retries(&self) -> u32 {
        self.broker.session_retries
    }

    pub fn topics(&self) -> (&'a str, &'a str, &'a str) {
        (
            self.broker.batch_topic,
            self.broker.log_topic,
            self.broker.vitals_topic,
        )
    }

    pub fn link_mut(&mut self) -> &mut W {
        &mut self.link
    }

    pub fn session_mut(&mut self) -> &mut M {
        &mut self.session
    }
}
