use std::str::FromStr;

use crate::quality::{DeviceClass, DeviceSignals};

/// Post-physics grading. None of these touch the redshift, Doppler or
/// emissivity terms; they are applied around the tone curve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LookControls {
    pub exposure: f32,
    pub highlight_knee: f32,
    pub gamma: f32,
    pub ring_bloom_strength: f32,
    pub ring_bloom_radius: f32,
}

impl LookControls {
    pub const DEFAULT: LookControls = LookControls {
        exposure: 1.0,
        highlight_knee: 0.9,
        gamma: 2.2,
        ring_bloom_strength: 0.3,
        ring_bloom_radius: 0.5,
    };

    pub const MOBILE: LookControls = LookControls {
        exposure: 0.85,
        highlight_knee: 0.75,
        gamma: 2.0,
        ring_bloom_strength: 0.25,
        ring_bloom_radius: 0.4,
    };

    pub const OBSERVATORY: LookControls = LookControls {
        exposure: 0.95,
        highlight_knee: 0.85,
        gamma: 2.3,
        ring_bloom_strength: 0.35,
        ring_bloom_radius: 0.55,
    };

    pub const DRAMATIC: LookControls = LookControls {
        exposure: 1.2,
        highlight_knee: 1.1,
        gamma: 2.1,
        ring_bloom_strength: 0.5,
        ring_bloom_radius: 0.7,
    };

    pub fn for_device(signals: &DeviceSignals) -> Self {
        match signals.device_class() {
            DeviceClass::Phone | DeviceClass::Tablet => Self::MOBILE,
            DeviceClass::Desktop | DeviceClass::Unknown => Self::DEFAULT,
        }
    }

    /// Multiplier on the photon ring glow; 1.0 for the default preset.
    pub fn ring_gain(&self) -> f32 {
        0.7 + self.ring_bloom_strength
    }

    /// Divisor on the photon ring Gaussian sharpness; 1.0 for the default preset.
    pub fn ring_spread(&self) -> f32 {
        let width = 2.0 * self.ring_bloom_radius.max(0.05);
        width * width
    }

    /// Exponent applied to the tone-mapped color.
    pub fn inverse_gamma(&self) -> f32 {
        1.0 / self.gamma.max(0.1)
    }
}

impl Default for LookControls {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl FromStr for LookControls {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(Self::DEFAULT),
            "mobile" => Ok(Self::MOBILE),
            "observatory" => Ok(Self::OBSERVATORY),
            "dramatic" => Ok(Self::DRAMATIC),
            other => Err(format!("unknown look preset '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_preset_is_neutral_on_rings() {
        let look = LookControls::default();
        assert!((look.ring_gain() - 1.0).abs() < 1e-6);
        assert!((look.ring_spread() - 1.0).abs() < 1e-6);
        assert!((look.inverse_gamma() - 0.4545).abs() < 1e-3);
    }

    #[test]
    fn mobile_devices_get_mobile_look() {
        let phone = DeviceSignals { phone: true, ..Default::default() };
        assert_eq!(LookControls::for_device(&phone), LookControls::MOBILE);
        assert_eq!(LookControls::for_device(&DeviceSignals::default()), LookControls::DEFAULT);
    }

    #[test]
    fn presets_parse_by_name() {
        assert_eq!("Dramatic".parse::<LookControls>(), Ok(LookControls::DRAMATIC));
        assert_eq!("observatory".parse::<LookControls>(), Ok(LookControls::OBSERVATORY));
        assert!("neon".parse::<LookControls>().is_err());
    }
}
