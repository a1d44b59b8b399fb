//! Device snapshots as reported by `HarpRegulator list`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::gateway::RawRecord;

mod types;

pub use types::*;

/// Upload destination used instead of the port when a Pico already sits in
/// its bootloader.
pub const BOOTLOADER_TARGET: &str = "PICOBOOT";

/// One device as seen by a single enumeration call.
///
/// A new `Device` is built on every refresh; the port name is the key that
/// ties snapshots of the same physical device together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    #[serde(rename = "Confidence")]
    pub confidence: Confidence,
    #[serde(rename = "Kind")]
    pub kind: DeviceKind,
    #[serde(rename = "State")]
    pub state: DeviceState,
    #[serde(rename = "PortName")]
    pub port_name: String,
    #[serde(rename = "WhoAmI", default)]
    pub who_am_i: Option<u32>,
    #[serde(rename = "DeviceDescription", default)]
    pub description: Option<String>,
    #[serde(rename = "SerialNumber", default)]
    pub serial_number: Option<String>,
    #[serde(rename = "FirmwareVersion", default)]
    pub firmware_version: Option<String>,
    #[serde(rename = "HardwareVersion", default)]
    pub hardware_version: Option<String>,
    #[serde(rename = "Source", default)]
    pub source: Option<String>,
}

impl Device {
    /// Builds a device from one raw listing record.
    pub fn from_record(record: &RawRecord) -> Result<Self> {
        let device: Device = serde_json::from_value(Value::Object(record.clone()))
            .map_err(|e| Error::InvalidRecord(e.to_string()))?;

        if device.port_name.trim().is_empty() {
            return Err(Error::InvalidRecord("empty PortName".to_string()));
        }

        Ok(device)
    }

    pub fn display_name(&self) -> String {
        if let Some(description) = self.description.as_deref().filter(|d| !d.is_empty()) {
            return description.to_string();
        }
        match self.who_am_i {
            Some(id) if id != 0 => format!("Device {}", id),
            _ => self.port_name.clone(),
        }
    }

    pub fn health_status(&self) -> HealthStatus {
        self.state.health()
    }

    pub fn health_color(&self) -> HealthColor {
        self.health_status().color()
    }

    /// Port, hardware revision and kind, joined for a one-line summary.
    pub fn metadata_line(&self) -> String {
        let mut parts = vec![self.port_name.clone()];

        if let Some(hw) = &self.hardware_version {
            parts.push(format!("HW v{}", hw));
        }
        if self.kind != DeviceKind::Unknown {
            parts.push(self.kind.to_string());
        }

        parts.join(" • ")
    }

    pub fn is_in_bootloader(&self) -> bool {
        self.state == DeviceState::Bootloader && self.kind == DeviceKind::Pico
    }

    /// Target handed to the upload command.
    pub fn upload_target(&self) -> &str {
        if self.is_in_bootloader() {
            BOOTLOADER_TARGET
        } else {
            &self.port_name
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Device(name={}, port={}, kind={}, state={})",
            self.display_name(),
            self.port_name,
            self.kind,
            self.state
        )
    }
}
