use core::fmt::{self, Write};

use heapless::String;

/// Length of `AA:BB:CC:DD:EE:FF`
pub const MAC_STRING_LEN: usize = 17;

/// Station hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Colon-separated upper-case form used in payloads.
    pub fn to_heapless(&self) -> String<MAC_STRING_LEN> {
        let mut out = String::new();
        // 17 characters always fit
        let _ = write!(out, "{}", self);
        out
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_formatting() {
        let mac = MacAddress([0x24, 0x0a, 0xc4, 0x00, 0xff, 0x01]);
        assert_eq!(mac.to_heapless().as_str(), "24:0A:C4:00:FF:01");
    }
}
