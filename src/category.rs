use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde_repr::{Deserialize_repr, Serialize_repr};
use std::str::FromStr;
use thiserror::Error;

/// Device categories whose drivers can be targeted by actions and raw commands.
///
/// Sequence documents persist the category as its integer discriminant, so the
/// declaration order is part of the on-disk format and must not change.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize_repr,
    Deserialize_repr,
    IntoPrimitive,
    TryFromPrimitive,
    derive_more::Display,
)]
#[repr(u8)]
pub enum DeviceCategory {
    /// Imaging camera.
    Camera = 0,
    /// Observatory dome or roll-off roof.
    Dome = 1,
    /// Filter wheel.
    #[display("Filter wheel")]
    FilterWheel = 2,
    /// Flat panel / cover calibrator.
    #[display("Flat panel")]
    FlatDevice = 3,
    /// Focuser.
    Focuser = 4,
    /// Autoguider.
    Guider = 5,
    /// Camera rotator.
    Rotator = 6,
    /// Safety monitor.
    #[display("Safety monitor")]
    SafetyMonitor = 7,
    /// Switch device.
    Switch = 8,
    /// Telescope mount.
    #[default]
    Telescope = 9,
    /// Weather station / observing conditions.
    #[display("Weather data")]
    WeatherData = 10,
}

impl DeviceCategory {
    /// All categories in their persisted order.
    pub const ALL: [Self; 11] = [
        Self::Camera,
        Self::Dome,
        Self::FilterWheel,
        Self::FlatDevice,
        Self::Focuser,
        Self::Guider,
        Self::Rotator,
        Self::SafetyMonitor,
        Self::Switch,
        Self::Telescope,
        Self::WeatherData,
    ];

    /// Zero-based position of the category in [`Self::ALL`].
    pub fn index(self) -> usize {
        usize::from(u8::from(self))
    }

    /// Snake-case name used as a key in configuration files.
    pub const fn key(self) -> &'static str {
        match self {
            Self::Camera => "camera",
            Self::Dome => "dome",
            Self::FilterWheel => "filter_wheel",
            Self::FlatDevice => "flat_device",
            Self::Focuser => "focuser",
            Self::Guider => "guider",
            Self::Rotator => "rotator",
            Self::SafetyMonitor => "safety_monitor",
            Self::Switch => "switch",
            Self::Telescope => "telescope",
            Self::WeatherData => "weather_data",
        }
    }

    /// Device type segment of Alpaca URLs (`/api/v1/{type}/{number}/...`).
    ///
    /// Guiders have no Alpaca device type.
    pub const fn alpaca_path(self) -> Option<&'static str> {
        Some(match self {
            Self::Camera => "camera",
            Self::Dome => "dome",
            Self::FilterWheel => "filterwheel",
            Self::FlatDevice => "covercalibrator",
            Self::Focuser => "focuser",
            Self::Guider => return None,
            Self::Rotator => "rotator",
            Self::SafetyMonitor => "safetymonitor",
            Self::Switch => "switch",
            Self::Telescope => "telescope",
            Self::WeatherData => "observingconditions",
        })
    }
}

/// A category name that doesn't match any [`DeviceCategory`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown device category {0:?}")]
pub struct UnknownCategory(pub String);

impl FromStr for DeviceCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| {
                category.key().eq_ignore_ascii_case(s)
                    || category
                        .alpaca_path()
                        .is_some_and(|path| path.eq_ignore_ascii_case(s))
            })
            .ok_or_else(|| UnknownCategory(s.to_owned()))
    }
}
