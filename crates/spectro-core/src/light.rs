//! Light source abstraction and intensity scaling.

use serde::Deserialize;

/// Illumination colors, in the fixed order they are cycled during a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedColor {
    Red,
    Green,
    Blue,
    White,
}

impl LedColor {
    /// Canonical acquisition order for one batch.
    pub const SEQUENCE: [LedColor; 4] = [Self::Red, Self::Green, Self::Blue, Self::White];

    /// Wire label used in batch payloads
    pub const fn label(self) -> &'static str {
        match self {
            Self::Red => "R",
            Self::Green => "G",
            Self::Blue => "B",
            Self::White => "W",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "R" => Some(Self::Red),
            "G" => Some(Self::Green),
            "B" => Some(Self::Blue),
            "W" => Some(Self::White),
            _ => None,
        }
    }

    /// Per-channel brightness (R, G, B) in percent for an RGB(W) emitter.
    pub const fn rgb_mix(self, intensity: u8) -> (u8, u8, u8) {
        match self {
            Self::Red => (intensity, 0, 0),
            Self::Green => (0, intensity, 0),
            Self::Blue => (0, 0, intensity),
            Self::White => (intensity, intensity, intensity),
        }
    }
}

/// How the LED is wired to the PWM pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum LedPolarity {
    /// Shared anode: a pin driven low lights the LED, so the duty is inverted.
    #[default]
    CommonAnode,
    CommonCathode,
}

/// Map a brightness percentage to a PWM duty value.
///
/// Percentages above 100 are clamped.
pub fn duty_for(percent: u8, max_duty: u16, polarity: LedPolarity) -> u16 {
    let percent = u32::from(percent.min(100));
    let duty = (u32::from(max_duty) * percent / 100) as u16;
    match polarity {
        LedPolarity::CommonCathode => duty,
        LedPolarity::CommonAnode => max_duty - duty,
    }
}

/// Multi-color light source used to illuminate the sample.
pub trait LightSource {
    fn set_color(&mut self, color: LedColor, intensity: u8);

    fn off(&mut self);
}
