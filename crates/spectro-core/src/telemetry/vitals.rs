use core::fmt::Write;
use core::net::Ipv4Addr;

use heapless::String;

use super::payload::VitalsPayload;
use crate::connectivity::{MAC_STRING_LEN, MacAddress};

/// Board-level health figures the reporter cannot derive itself.
pub trait SystemInfo {
    fn uptime_ms(&mut self) -> u64;

    fn cpu_frequency_mhz(&mut self) -> u32;

    /// `(used, total)` heap bytes
    fn heap_usage(&mut self) -> (usize, usize);

    /// Internal temperature in °C, if the chip has a sensor
    fn temperature_c(&mut self) -> Option<f32>;

    /// Digest of the running firmware image
    fn firmware_checksum(&mut self) -> &str;

    fn firmware_size(&mut self) -> u32;
}

/// Snapshot of device health, built at report time and never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceVitals {
    pub mac_address: String<MAC_STRING_LEN>,
    pub timestamp: u32,
    pub uptime_ms: u64,
    pub cpu_frequency: u32,
    pub ram_usage: f32,
    pub temp: Option<f32>,
    pub wifi_ssid: String<32>,
    pub wifi_signal: Option<i8>,
    pub ip: String<15>,
    pub firmware_checksum: String<64>,
    pub firmware_size: u32,
}

impl DeviceVitals {
    /// Gather a snapshot from the board and the last known link figures.
    pub fn collect<S: SystemInfo>(
        system: &mut S,
        timestamp: u32,
        mac: Option<MacAddress>,
        ssid: &str,
        rssi: Option<i8>,
        ip: Option<Ipv4Addr>,
    ) -> Self {
        let (used, total) = system.heap_usage();

        let mut wifi_ssid = String::new();
        for c in ssid.chars() {
            if wifi_ssid.push(c).is_err() {
                break;
            }
        }

        let mut ip_text = String::new();
        if let Some(ip) = ip {
            let _ = write!(ip_text, "{}", ip);
        }

        let mut firmware_checksum = String::new();
        for c in system.firmware_checksum().chars() {
            if firmware_checksum.push(c).is_err() {
                break;
            }
        }

        Self {
            mac_address: mac.map(|m| m.to_heapless()).unwrap_or_default(),
            timestamp,
            uptime_ms: system.uptime_ms(),
            cpu_frequency: system.cpu_frequency_mhz(),
            ram_usage: ram_usage_percent(used, total),
            temp: system.temperature_c(),
            wifi_ssid,
            wifi_signal: rssi,
            ip: ip_text,
            firmware_checksum,
            firmware_size: system.firmware_size(),
        }
    }

    pub fn as_payload(&self) -> VitalsPayload<'_> {
        VitalsPayload {
            mac_address: self.mac_address.as_str(),
            timestamp: self.timestamp,
            uptime_ms: self.uptime_ms,
            cpu_frequency: self.cpu_frequency,
            ram_usage: self.ram_usage,
            temp: self.temp,
            wifi_ssid: self.wifi_ssid.as_str(),
            wifi_signal: self.wifi_signal,
            ip: self.ip.as_str(),
            firmware_checksum: self.firmware_checksum.as_str(),
            firmware_size: self.firmware_size,
        }
    }
}

/// Heap usage ratio in percent, rounded to one decimal.
fn ram_usage_percent(used: usize, total: usize) -> f32 {
    if total == 0 {
        return 0.0;
    }
    let per_mille = (used as u64 * 1000) / total as u64;
    per_mille as f32 / 10.0
}
