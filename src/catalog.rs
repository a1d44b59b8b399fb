//! Firmware versions available for a device.
//!
//! There is no firmware repository behind this yet; [`StaticCatalog`] only
//! knows what it was constructed with.

use std::collections::HashMap;
use std::path::PathBuf;

/// One published firmware release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Firmware {
    pub version: String,
    pub compatible_hardware: Vec<String>,
    pub release_notes: Option<String>,
}

impl Firmware {
    pub fn is_compatible(&self, hardware_version: &str) -> bool {
        self.compatible_hardware.iter().any(|hw| hw == hardware_version)
    }
}

pub trait FirmwareCatalog: Send + Sync {
    fn available_versions(&self, device_name: &str) -> Vec<String>;

    /// Local file for a version picked from [`available_versions`](Self::available_versions).
    fn resolve(&self, version: &str) -> Option<PathBuf>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    versions: Vec<String>,
    files: HashMap<String, PathBuf>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.versions.push(version.into());
        self
    }

    pub fn with_file(mut self, version: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let version = version.into();
        if !self.versions.contains(&version) {
            self.versions.push(version.clone());
        }
        self.files.insert(version, path.into());
        self
    }
}

impl FirmwareCatalog for StaticCatalog {
    fn available_versions(&self, _device_name: &str) -> Vec<String> {
        self.versions.clone()
    }

    fn resolve(&self, version: &str) -> Option<PathBuf> {
        self.files.get(version).cloned()
    }
}
