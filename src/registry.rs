//! The current device list and the operator's selection.

use std::str::FromStr;
use std::sync::Arc;

use log::{info, warn};
use parking_lot::RwLock;

use crate::device::{Device, DeviceKind, DeviceState, HealthStatus};
use crate::error::{Error, Result};
use crate::gateway::CliGateway;

pub const FILTER_ALL_TYPES: &str = "All types";
pub const FILTER_HEALTHY: &str = "Healthy";
pub const FILTER_NEEDS_UPDATE: &str = "Needs update";
pub const FILTER_ERROR: &str = "Error";

/// Device-type dropdown: either a hardware kind or a status shortcut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeFilter {
    #[default]
    All,
    Kind(DeviceKind),
    Healthy,
    Error,
    /// Same as `Healthy` for now; firmware versions are not compared.
    NeedsUpdate,
}

impl TypeFilter {
    pub fn matches(&self, device: &Device) -> bool {
        match self {
            Self::All => true,
            Self::Kind(kind) => device.kind == *kind,
            Self::Healthy | Self::NeedsUpdate => device.state == DeviceState::Online,
            Self::Error => matches!(device.state, DeviceState::DriverError | DeviceState::Unknown),
        }
    }
}

impl FromStr for TypeFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | FILTER_ALL_TYPES => Ok(Self::All),
            "Pico" => Ok(Self::Kind(DeviceKind::Pico)),
            "ATxmega" => Ok(Self::Kind(DeviceKind::AtXmega)),
            FILTER_HEALTHY => Ok(Self::Healthy),
            FILTER_ERROR => Ok(Self::Error),
            FILTER_NEEDS_UPDATE => Ok(Self::NeedsUpdate),
            _ => Err(Error::InputValidation(format!("unknown device type filter: {}", s))),
        }
    }
}

#[derive(Default)]
struct RegistryState {
    devices: Vec<Device>,
    selected: Option<Device>,
}

/// Holds the latest enumeration and the selected device.
///
/// List and selection share one lock, so a refresh can never land between
/// reading the selection and acting on it.
pub struct DeviceRegistry {
    gateway: Arc<dyn CliGateway>,
    state: RwLock<RegistryState>,
}

impl DeviceRegistry {
    pub fn new(gateway: Arc<dyn CliGateway>) -> Self {
        Self {
            gateway,
            state: RwLock::new(RegistryState::default()),
        }
    }

    pub fn gateway(&self) -> &Arc<dyn CliGateway> {
        &self.gateway
    }

    /// Re-enumerates devices and replaces the whole list.
    ///
    /// Records that do not describe a valid device are skipped. If the
    /// selected port is gone from the new list the selection is cleared,
    /// otherwise it is rebound to the fresh snapshot. On error the previous
    /// state is kept.
    pub async fn refresh(&self, include_all: bool, allow_connect: bool) -> Result<Vec<Device>> {
        let records = self.gateway.list_devices(include_all, allow_connect).await?;

        let mut devices = Vec::with_capacity(records.len());
        for record in &records {
            match Device::from_record(record) {
                Ok(device) => devices.push(device),
                Err(e) => warn!("Error parsing device data: {}", e),
            }
        }

        let mut state = self.state.write();
        if let Some(selected) = state.selected.take() {
            match devices.iter().find(|d| d.port_name == selected.port_name) {
                Some(fresh) => state.selected = Some(fresh.clone()),
                None => info!("Selected device on {} is gone, clearing selection", selected.port_name),
            }
        }
        state.devices = devices.clone();

        info!("Found {} devices", devices.len());
        Ok(devices)
    }

    pub fn devices(&self) -> Vec<Device> {
        self.state.read().devices.clone()
    }

    pub fn find_by_port(&self, port_name: &str) -> Option<Device> {
        self.state
            .read()
            .devices
            .iter()
            .find(|d| d.port_name == port_name)
            .cloned()
    }

    /// Filters the current list without changing it, keeping its order.
    pub fn filter(
        &self,
        search_query: &str,
        type_filter: TypeFilter,
        health_filter: Option<HealthStatus>,
    ) -> Vec<Device> {
        let query = search_query.to_lowercase();

        self.state
            .read()
            .devices
            .iter()
            .filter(|d| query.is_empty() || matches_query(d, &query))
            .filter(|d| type_filter.matches(d))
            .filter(|d| health_filter.map_or(true, |h| d.health_status() == h))
            .cloned()
            .collect()
    }

    pub fn select(&self, device: Device) {
        self.state.write().selected = Some(device);
    }

    pub fn selected(&self) -> Option<Device> {
        self.state.read().selected.clone()
    }

    pub fn clear_selection(&self) {
        self.state.write().selected = None;
    }
}

fn matches_query(device: &Device, query: &str) -> bool {
    device.display_name().to_lowercase().contains(query)
        || device.port_name.to_lowercase().contains(query)
        || device
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(query))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayCall, MockGateway, RawRecord};
    use serde_json::{json, Value};

    fn record(port: &str, kind: &str, state: &str, description: Option<&str>) -> RawRecord {
        let value = json!({
            "Confidence": "High",
            "Kind": kind,
            "State": state,
            "PortName": port,
            "WhoAmI": 1405,
            "DeviceDescription": description,
        });
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn sample_records() -> Vec<RawRecord> {
        vec![
            record("COM5", "Pico", "Online", Some("EnvironmentSensor")),
            record("COM6", "ATxmega", "Online", Some("TreadmillDriver")),
            record("COM7", "Pico", "Bootloader", None),
            record("COM8", "ATxmega", "DriverError", None),
            record("COM9", "Pico", "Mystery", None),
        ]
    }

    fn registry(records: Vec<RawRecord>) -> (Arc<MockGateway>, DeviceRegistry) {
        let mock = Arc::new(MockGateway::with_devices(records));
        let registry = DeviceRegistry::new(mock.clone());
        (mock, registry)
    }

    fn ports(devices: &[Device]) -> Vec<&str> {
        devices.iter().map(|d| d.port_name.as_str()).collect()
    }

    #[tokio::test]
    async fn refresh_replaces_list_and_skips_bad_records() {
        let mut records = sample_records();
        let mut broken = record("COM10", "Pico", "Online", None);
        broken.remove("Confidence");
        records.insert(1, broken);

        let (mock, registry) = registry(records);
        let devices = registry.refresh(true, false).await.unwrap();

        assert_eq!(ports(&devices), ["COM5", "COM6", "COM7", "COM8", "COM9"]);
        assert_eq!(registry.devices(), devices);
        assert_eq!(
            mock.calls(),
            [GatewayCall::List {
                include_all: true,
                allow_connect: false
            }]
        );
    }

    #[tokio::test]
    async fn unrecognized_confidence_keeps_device() {
        let mut odd = record("COM5", "Pico", "Online", Some("EnvironmentSensor"));
        odd.insert("Confidence".into(), json!("VeryLow"));

        let (_, registry) = registry(vec![odd]);
        let devices = registry.refresh(true, true).await.unwrap();

        assert_eq!(ports(&devices), ["COM5"]);
        assert_eq!(devices[0].confidence, crate::device::Confidence::Unknown);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_list() {
        let (mock, registry) = registry(sample_records());
        registry.refresh(true, true).await.unwrap();

        mock.push_listing_error("HarpRegulator not found");
        assert!(matches!(
            registry.refresh(true, true).await,
            Err(Error::ToolInvocation(_))
        ));
        assert_eq!(registry.devices().len(), 5);
    }

    #[tokio::test]
    async fn search_is_case_insensitive() {
        let (_, registry) = registry(sample_records());
        registry.refresh(true, true).await.unwrap();

        let found = registry.filter("environment", TypeFilter::All, None);
        assert_eq!(ports(&found), ["COM5"]);

        let found = registry.filter("com7", TypeFilter::All, None);
        assert_eq!(ports(&found), ["COM7"]);

        let found = registry.filter("device 1405", TypeFilter::All, None);
        assert_eq!(ports(&found), ["COM7", "COM8", "COM9"]);

        assert_eq!(registry.filter("", TypeFilter::All, None).len(), 5);
        assert!(registry.filter("nothing", TypeFilter::All, None).is_empty());
    }

    #[tokio::test]
    async fn type_filters() {
        let (_, registry) = registry(sample_records());
        registry.refresh(true, true).await.unwrap();

        let pico = registry.filter("", TypeFilter::Kind(DeviceKind::Pico), None);
        assert_eq!(ports(&pico), ["COM5", "COM7", "COM9"]);

        let xmega = registry.filter("", TypeFilter::Kind(DeviceKind::AtXmega), None);
        assert_eq!(ports(&xmega), ["COM6", "COM8"]);

        let healthy = registry.filter("", TypeFilter::Healthy, None);
        assert_eq!(ports(&healthy), ["COM5", "COM6"]);
        assert_eq!(registry.filter("", TypeFilter::NeedsUpdate, None), healthy);

        let error = registry.filter("", TypeFilter::Error, None);
        assert_eq!(ports(&error), ["COM8", "COM9"]);
    }

    #[tokio::test]
    async fn health_filter_combines_with_type_filter() {
        let (_, registry) = registry(sample_records());
        registry.refresh(true, true).await.unwrap();

        let boot = registry.filter("", TypeFilter::All, Some(HealthStatus::Bootloader));
        assert_eq!(ports(&boot), ["COM7"]);

        let none = registry.filter(
            "",
            TypeFilter::Kind(DeviceKind::AtXmega),
            Some(HealthStatus::Bootloader),
        );
        assert!(none.is_empty());

        let found = registry.filter("sensor", TypeFilter::Healthy, Some(HealthStatus::Healthy));
        assert_eq!(ports(&found), ["COM5"]);
    }

    #[test]
    fn type_filter_labels() {
        assert_eq!("All types".parse::<TypeFilter>().unwrap(), TypeFilter::All);
        assert_eq!(
            "ATxmega".parse::<TypeFilter>().unwrap(),
            TypeFilter::Kind(DeviceKind::AtXmega)
        );
        assert_eq!("Needs update".parse::<TypeFilter>().unwrap(), TypeFilter::NeedsUpdate);
        assert!("Broken".parse::<TypeFilter>().is_err());
    }

    #[tokio::test]
    async fn selection_follows_port_across_refreshes() {
        let (mock, registry) = registry(sample_records());
        let devices = registry.refresh(true, true).await.unwrap();
        registry.select(devices[0].clone());

        let mut updated = sample_records();
        updated[0].insert("FirmwareVersion".into(), json!("0.3.0"));
        mock.push_listing(updated);
        registry.refresh(true, true).await.unwrap();

        let selected = registry.selected().unwrap();
        assert_eq!(selected.port_name, "COM5");
        assert_eq!(selected.firmware_version.as_deref(), Some("0.3.0"));
    }

    #[tokio::test]
    async fn selection_cleared_when_port_disappears() {
        let (mock, registry) = registry(sample_records());
        let devices = registry.refresh(true, true).await.unwrap();
        registry.select(devices[0].clone());

        mock.push_listing(sample_records().split_off(1));
        registry.refresh(true, true).await.unwrap();

        assert!(registry.selected().is_none());
    }

    #[tokio::test]
    async fn select_and_clear() {
        let (_, registry) = registry(sample_records());
        let devices = registry.refresh(true, true).await.unwrap();

        assert!(registry.selected().is_none());
        registry.select(devices[1].clone());
        assert_eq!(registry.selected().unwrap().display_name(), "TreadmillDriver");
        assert_eq!(registry.find_by_port("COM6"), Some(devices[1].clone()));

        registry.clear_selection();
        assert!(registry.selected().is_none());
    }
}
