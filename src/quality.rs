use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QualityTier {
    UltraLow,
    Low,
    Medium,
    High,
    Ultra,
}

impl QualityTier {
    pub const ALL: [QualityTier; 5] = [
        QualityTier::UltraLow,
        QualityTier::Low,
        QualityTier::Medium,
        QualityTier::High,
        QualityTier::Ultra,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            QualityTier::UltraLow => "ultra-low",
            QualityTier::Low => "low",
            QualityTier::Medium => "medium",
            QualityTier::High => "high",
            QualityTier::Ultra => "ultra",
        }
    }

    pub fn settings(&self) -> QualitySettings {
        match self {
            QualityTier::UltraLow => QualitySettings {
                max_steps: 128,
                pixel_ratio: 0.75,
                disk_samples: 2,
                jet_enabled: true,
                bloom_enabled: false,
                target_fps: 30,
                adaptive_step: 0.05,
            },
            QualityTier::Low => QualitySettings {
                max_steps: 160,
                pixel_ratio: 0.85,
                disk_samples: 2,
                jet_enabled: true,
                bloom_enabled: false,
                target_fps: 30,
                adaptive_step: 0.045,
            },
            QualityTier::Medium => QualitySettings {
                max_steps: 192,
                pixel_ratio: 0.85,
                disk_samples: 2,
                jet_enabled: true,
                bloom_enabled: false,
                target_fps: 45,
                adaptive_step: 0.04,
            },
            QualityTier::High => QualitySettings {
                max_steps: 320,
                pixel_ratio: 1.15,
                disk_samples: 3,
                jet_enabled: true,
                bloom_enabled: true,
                target_fps: 60,
                adaptive_step: 0.03,
            },
            QualityTier::Ultra => QualitySettings {
                max_steps: 450,
                pixel_ratio: 1.4,
                disk_samples: 3,
                jet_enabled: true,
                bloom_enabled: true,
                target_fps: 60,
                adaptive_step: 0.02,
            },
        }
    }

    /// Graphics context attributes requested for this tier.
    pub fn context_hints(&self) -> ContextHints {
        ContextHints {
            antialias: matches!(self, QualityTier::High | QualityTier::Ultra),
            low_power: matches!(self, QualityTier::UltraLow | QualityTier::Low),
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for QualityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QualityTier::ALL
            .into_iter()
            .find(|tier| tier.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown quality tier '{}'", s))
    }
}

/// Rendering budget for one tier. One instance is active per session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QualitySettings {
    pub max_steps: u32,
    pub pixel_ratio: f32,
    pub disk_samples: u32,
    pub jet_enabled: bool,
    pub bloom_enabled: bool,
    pub target_fps: u32,
    pub adaptive_step: f32,
}

impl QualitySettings {
    /// Minimum time between drawn frames, milliseconds.
    pub fn frame_interval_ms(&self) -> f64 {
        1000.0 / self.target_fps.max(1) as f64
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContextHints {
    pub antialias: bool,
    pub low_power: bool,
}

/// Platform signals gathered once at session start. `None` means the
/// platform did not expose the value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeviceSignals {
    pub phone: bool,
    pub tablet: bool,
    pub legacy_os: bool,
    pub cores: Option<u32>,
    pub memory_gb: Option<f32>,
    pub screen_area: Option<u64>,
}

const MOBILE_TOKENS: [&str; 8] = [
    "Android",
    "webOS",
    "iPhone",
    "iPad",
    "iPod",
    "BlackBerry",
    "IEMobile",
    "Opera Mini",
];

impl DeviceSignals {
    pub fn from_user_agent(
        user_agent: &str,
        cores: Option<u32>,
        memory_gb: Option<f32>,
        screen_width: Option<u32>,
        screen_height: Option<u32>,
    ) -> Self {
        let ua = user_agent.to_ascii_lowercase();
        let mobile = MOBILE_TOKENS
            .iter()
            .any(|token| ua.contains(&token.to_ascii_lowercase()));
        let tablet = ua.contains("ipad") || android_without_mobile_token(&ua);

        Self {
            phone: mobile && !tablet,
            tablet,
            legacy_os: android_major_version(&ua).is_some_and(|v| (1..=7).contains(&v)),
            cores: cores.filter(|&c| c > 0),
            memory_gb: memory_gb.filter(|m| m.is_finite() && *m > 0.0),
            screen_area: screen_width
                .zip(screen_height)
                .map(|(w, h)| w as u64 * h as u64)
                .filter(|&area| area > 0),
        }
    }

    pub fn device_class(&self) -> DeviceClass {
        if self.phone {
            DeviceClass::Phone
        } else if self.tablet {
            DeviceClass::Tablet
        } else if self.cores.is_none() && self.memory_gb.is_none() && self.screen_area.is_none() {
            DeviceClass::Unknown
        } else {
            DeviceClass::Desktop
        }
    }
}

fn android_without_mobile_token(ua: &str) -> bool {
    match ua.find("android") {
        Some(at) => !ua[at..].contains("mobile"),
        None => false,
    }
}

fn android_major_version(ua: &str) -> Option<u32> {
    let at = ua.find("android ")?;
    let rest = &ua[at + "android ".len()..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    // only "Android N.x" counts
    if !rest[digits.len()..].starts_with('.') {
        return None;
    }
    digits.parse().ok()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceClass {
    Phone,
    Tablet,
    Desktop,
    Unknown,
}

/// Normalised view of the signals that the rules read.
#[derive(Clone, Copy, Debug)]
struct Facts {
    class: DeviceClass,
    legacy_os: bool,
    cores: u32,
    memory_gb: f32,
    screen_area: u64,
}

const DEFAULT_CORES: u32 = 4;
const DEFAULT_MEMORY_GB: f32 = 4.0;
const FULL_HD_AREA: u64 = 1920 * 1080;

struct Rule {
    tier: QualityTier,
    applies: fn(&Facts) -> bool,
}

// Ordered, first match wins.
const RULES: &[Rule] = &[
    Rule { tier: QualityTier::Medium, applies: |f| f.class == DeviceClass::Unknown },
    Rule {
        tier: QualityTier::UltraLow,
        applies: |f| {
            f.class == DeviceClass::Phone && (f.legacy_os || f.cores <= 2 || f.memory_gb <= 1.0)
        },
    },
    Rule {
        tier: QualityTier::Low,
        applies: |f| f.class == DeviceClass::Phone && (f.cores <= 4 || f.memory_gb <= 2.0),
    },
    Rule { tier: QualityTier::Medium, applies: |f| f.class == DeviceClass::Phone },
    Rule {
        tier: QualityTier::Low,
        applies: |f| f.class == DeviceClass::Tablet && (f.cores <= 2 || f.memory_gb <= 2.0),
    },
    Rule {
        tier: QualityTier::Medium,
        applies: |f| f.class == DeviceClass::Tablet && (f.cores <= 4 || f.memory_gb <= 3.0),
    },
    Rule { tier: QualityTier::High, applies: |f| f.class == DeviceClass::Tablet },
    Rule {
        tier: QualityTier::Ultra,
        applies: |f| f.cores >= 8 && f.memory_gb >= 8.0 && f.screen_area >= FULL_HD_AREA,
    },
    Rule { tier: QualityTier::High, applies: |f| f.cores >= 4 && f.memory_gb >= 4.0 },
    Rule { tier: QualityTier::Low, applies: |f| f.cores <= 2 },
];

/// Pure decision over the device signals; evaluated once per session.
pub fn classify(signals: &DeviceSignals) -> QualityTier {
    let facts = Facts {
        class: signals.device_class(),
        legacy_os: signals.legacy_os,
        cores: signals.cores.unwrap_or(DEFAULT_CORES),
        memory_gb: signals.memory_gb.unwrap_or(DEFAULT_MEMORY_GB),
        screen_area: signals.screen_area.unwrap_or(0),
    };
    RULES
        .iter()
        .find(|rule| (rule.applies)(&facts))
        .map(|rule| rule.tier)
        .unwrap_or(QualityTier::Medium)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 Mobile/15E148";
    const OLD_ANDROID: &str = "Mozilla/5.0 (Linux; Android 7.1.2; Moto G) AppleWebKit/537.36 Mobile Safari/537.36";
    const ANDROID_TABLET: &str = "Mozilla/5.0 (Linux; Android 13; SM-X700) AppleWebKit/537.36 Safari/537.36";
    const DESKTOP: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 Chrome/126.0 Safari/537.36";

    fn desktop(cores: u32, memory: f32, w: u32, h: u32) -> DeviceSignals {
        DeviceSignals::from_user_agent(DESKTOP, Some(cores), Some(memory), Some(w), Some(h))
    }

    #[test]
    fn table_rows_are_positive_and_bounded() {
        for tier in QualityTier::ALL {
            let s = tier.settings();
            assert!(s.max_steps > 0, "{tier}");
            assert!(s.pixel_ratio > 0.0, "{tier}");
            assert!(s.target_fps > 0, "{tier}");
            assert!(s.adaptive_step > 0.0 && s.adaptive_step <= 0.1, "{tier}");
        }
    }

    #[test]
    fn budget_grows_with_tier() {
        for pair in QualityTier::ALL.windows(2) {
            let (lo, hi) = (pair[0].settings(), pair[1].settings());
            assert!(lo.max_steps < hi.max_steps);
            assert!(lo.adaptive_step >= hi.adaptive_step);
        }
    }

    #[test]
    fn tier_names_round_trip() {
        for tier in QualityTier::ALL {
            assert_eq!(tier.name().parse::<QualityTier>(), Ok(tier));
        }
        assert_eq!(" Ultra-Low ".parse::<QualityTier>(), Ok(QualityTier::UltraLow));
        assert!("extreme".parse::<QualityTier>().is_err());
    }

    #[test]
    fn user_agent_flags() {
        let phone = DeviceSignals::from_user_agent(IPHONE, None, None, None, None);
        assert!(phone.phone && !phone.tablet && !phone.legacy_os);

        let old = DeviceSignals::from_user_agent(OLD_ANDROID, None, None, None, None);
        assert!(old.phone && old.legacy_os);

        let tablet = DeviceSignals::from_user_agent(ANDROID_TABLET, None, None, None, None);
        assert!(tablet.tablet && !tablet.phone && !tablet.legacy_os);

        let pc = DeviceSignals::from_user_agent(DESKTOP, None, None, None, None);
        assert!(!pc.phone && !pc.tablet);
    }

    #[test]
    fn phone_rules() {
        let sig = |ua, cores, mem| DeviceSignals::from_user_agent(ua, Some(cores), Some(mem), None, None);
        assert_eq!(classify(&sig(OLD_ANDROID, 8, 8.0)), QualityTier::UltraLow);
        assert_eq!(classify(&sig(IPHONE, 2, 8.0)), QualityTier::UltraLow);
        assert_eq!(classify(&sig(IPHONE, 8, 1.0)), QualityTier::UltraLow);
        assert_eq!(classify(&sig(IPHONE, 4, 8.0)), QualityTier::Low);
        assert_eq!(classify(&sig(IPHONE, 8, 2.0)), QualityTier::Low);
        assert_eq!(classify(&sig(IPHONE, 6, 4.0)), QualityTier::Medium);
    }

    #[test]
    fn tablet_rules() {
        let sig = |cores, mem| DeviceSignals::from_user_agent(ANDROID_TABLET, Some(cores), Some(mem), None, None);
        assert_eq!(classify(&sig(2, 8.0)), QualityTier::Low);
        assert_eq!(classify(&sig(8, 2.0)), QualityTier::Low);
        assert_eq!(classify(&sig(4, 8.0)), QualityTier::Medium);
        assert_eq!(classify(&sig(8, 3.0)), QualityTier::Medium);
        assert_eq!(classify(&sig(8, 6.0)), QualityTier::High);
    }

    #[test]
    fn desktop_rules() {
        assert_eq!(classify(&desktop(8, 8.0, 1920, 1080)), QualityTier::Ultra);
        assert_eq!(classify(&desktop(8, 8.0, 1600, 900)), QualityTier::High);
        assert_eq!(classify(&desktop(4, 4.0, 1280, 720)), QualityTier::High);
        assert_eq!(classify(&desktop(2, 16.0, 3840, 2160)), QualityTier::Low);
        assert_eq!(classify(&desktop(4, 2.0, 1920, 1080)), QualityTier::Medium);
        assert_eq!(classify(&desktop(3, 16.0, 1920, 1080)), QualityTier::Medium);
    }

    #[test]
    fn missing_signals_default_to_medium() {
        assert_eq!(classify(&DeviceSignals::default()), QualityTier::Medium);
        let bare = DeviceSignals::from_user_agent("", None, None, None, None);
        assert_eq!(classify(&bare), QualityTier::Medium);
    }

    #[test]
    fn context_hints_follow_tier() {
        assert!(QualityTier::Ultra.context_hints().antialias);
        assert!(!QualityTier::Medium.context_hints().antialias);
        assert!(QualityTier::UltraLow.context_hints().low_power);
        assert!(!QualityTier::High.context_hints().low_power);
    }

    proptest! {
        #[test]
        fn classify_is_pure(
            phone in any::<bool>(),
            tablet in any::<bool>(),
            legacy_os in any::<bool>(),
            cores in proptest::option::of(0u32..64),
            memory in proptest::option::of(0.0f32..64.0),
            area in proptest::option::of(0u64..20_000_000),
        ) {
            let signals = DeviceSignals { phone, tablet, legacy_os, cores, memory_gb: memory, screen_area: area };
            let first = classify(&signals);
            prop_assert_eq!(first, classify(&signals.clone()));
            prop_assert!(QualityTier::ALL.contains(&first));
        }
    }
}
