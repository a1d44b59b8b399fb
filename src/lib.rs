//! Harp device discovery and firmware deployment
//!
//! This library lists Harp devices and flashes firmware onto them by driving
//! the external `HarpRegulator` command-line tool.
//!
//! # Features
//! - Device enumeration from the tool's JSON listing
//! - Search and type/health filtering over the current device list
//! - Automatic `PICOBOOT` targeting for Picos already in bootloader mode
//! - Disconnect, validate, upload, reboot-wait and verify sequencing
//! - Timestamped activity log and a broadcast stream of workflow events
//!
//! # Components
//! - [`CliGateway`]: the only code that talks to the external tool
//! - [`DeviceRegistry`]: device list and selection
//! - [`DeploymentWorkflow`]: the update sequence
//! - [`FirmwareCatalog`]: firmware versions offered for a device
//!
//! # Examples
//!
//! ## Listing devices
//! ```no_run
//! use harp_updater::{GatewayConfig, TypeFilter};
//!
//! #[tokio::main]
//! async fn main() -> harp_updater::Result<()> {
//!     let workflow = harp_updater::regulator_workflow(
//!         GatewayConfig::new().with_cli_path("HarpRegulator"),
//!         harp_updater::new_config(),
//!     )?;
//!
//!     let registry = workflow.registry();
//!     registry.refresh(true, true).await?;
//!     for device in registry.filter("", TypeFilter::Healthy, None) {
//!         println!("{} ({})", device.display_name(), device.metadata_line());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Deploying firmware
//! ```no_run
//! use harp_updater::{DeployRequest, GatewayConfig};
//!
//! #[tokio::main]
//! async fn main() -> harp_updater::Result<()> {
//!     let workflow = harp_updater::regulator_workflow(GatewayConfig::new(), harp_updater::new_config())?;
//!     workflow.registry().refresh(true, true).await?;
//!
//!     let device = workflow.registry().find_by_port("COM5").expect("device on COM5");
//!     let request = DeployRequest::new()
//!         .for_device(device)
//!         .with_firmware_file("EnvironmentSensor-0.3.0.uf2");
//!
//!     match workflow.deploy(request).await {
//!         Ok(report) => println!("updated: {:?}", report.device),
//!         Err(failure) => {
//!             eprintln!("{}", failure);
//!             if let Some(hint) = failure.remediation() {
//!                 eprintln!("{}", hint);
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod catalog;
mod deploy;
pub mod device;
mod error;
pub mod gateway;
mod registry;

pub use catalog::{Firmware, FirmwareCatalog, StaticCatalog};
pub use deploy::{
    validate_firmware_file, DeployError, DeployFailure, DeployReport, DeployRequest, DeployResult,
    DeploymentWorkflow, FirmwareSource, Stage, UpdaterConfig, WorkflowEvent, WorkflowStatus,
    ACCEPTED_EXTENSIONS, DISCONNECT_SETTLE, FORCE_REMEDIATION, REBOOT_SETTLE,
};
pub use device::{Device, DeviceKind, DeviceState, HealthStatus, BOOTLOADER_TARGET};
pub use error::{Error, Result};
pub use gateway::{CliGateway, GatewayConfig, MockGateway, RawRecord, RegulatorCli, UploadReport};
pub use registry::{DeviceRegistry, TypeFilter};

use std::sync::Arc;

/// Builds a workflow backed by the real `HarpRegulator` executable and an
/// empty firmware catalog.
pub fn regulator_workflow(
    gateway: GatewayConfig,
    config: UpdaterConfig,
) -> Result<DeploymentWorkflow> {
    let cli = RegulatorCli::new(gateway)?;
    let registry = Arc::new(DeviceRegistry::new(Arc::new(cli)));
    DeploymentWorkflow::new(registry, Arc::new(StaticCatalog::new()), config)
}

/// Creates a workflow configuration with default settle delays
pub fn new_config() -> UpdaterConfig {
    UpdaterConfig::new()
}
