use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// How certain the tool is that a record is an actual Harp device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    Pico,
    #[serde(rename = "ATxmega")]
    AtXmega,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceState {
    Online,
    Bootloader,
    DriverError,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealthStatus {
    Healthy,
    Bootloader,
    Error,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthColor {
    Green,
    Yellow,
    Red,
    Gray,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::Unknown => "Unknown",
        }
    }
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pico => "Pico",
            Self::AtXmega => "ATxmega",
            Self::Unknown => "Unknown",
        }
    }
}

impl DeviceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "Online",
            Self::Bootloader => "Bootloader",
            Self::DriverError => "DriverError",
            Self::Unknown => "Unknown",
        }
    }

    pub fn health(&self) -> HealthStatus {
        match self {
            Self::Online => HealthStatus::Healthy,
            Self::Bootloader => HealthStatus::Bootloader,
            Self::DriverError => HealthStatus::Error,
            Self::Unknown => HealthStatus::Unknown,
        }
    }
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "Healthy",
            Self::Bootloader => "Bootloader",
            Self::Error => "Error",
            Self::Unknown => "Unknown",
        }
    }

    pub fn color(&self) -> HealthColor {
        match self {
            Self::Healthy => HealthColor::Green,
            Self::Bootloader => HealthColor::Yellow,
            Self::Error => HealthColor::Red,
            Self::Unknown => HealthColor::Gray,
        }
    }
}

impl FromStr for HealthStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Healthy" => Ok(Self::Healthy),
            "Bootloader" => Ok(Self::Bootloader),
            "Error" => Ok(Self::Error),
            "Unknown" => Ok(Self::Unknown),
            _ => Err(Error::InputValidation(format!("unknown health status: {}", s))),
        }
    }
}

impl HealthColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Red => "red",
            Self::Gray => "gray",
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(Confidence, DeviceKind, DeviceState, HealthStatus, HealthColor);
