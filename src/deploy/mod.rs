use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Local;
use log::{error, info, warn};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::catalog::FirmwareCatalog;
use crate::device::Device;
use crate::error::{Error, Result};
use crate::registry::DeviceRegistry;

mod config;
mod types;

pub use config::*;
pub use types::*;

/// Checks the file extension against `accepted` (case-insensitive).
pub fn validate_firmware_file(path: &Path, accepted: &[String]) -> Result<()> {
    let valid = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| accepted.iter().any(|a| a.eq_ignore_ascii_case(ext)));

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidFirmware(path.to_path_buf()))
    }
}

/// Drives one firmware deployment at a time against the registry's gateway.
///
/// Each run appends to a fresh activity log and broadcasts
/// [`WorkflowEvent`]s; the presentation side only needs to subscribe.
pub struct DeploymentWorkflow {
    registry: Arc<DeviceRegistry>,
    catalog: Arc<dyn FirmwareCatalog>,
    config: UpdaterConfig,
    running: AtomicBool,
    status: Mutex<WorkflowStatus>,
    log: Mutex<Vec<String>>,
    events: broadcast::Sender<WorkflowEvent>,
}

/// Clears the running flag however the run ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl DeploymentWorkflow {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        catalog: Arc<dyn FirmwareCatalog>,
        config: UpdaterConfig,
    ) -> Result<Self> {
        config.validate()?;
        let (events, _) = broadcast::channel(config.event_capacity);

        Ok(Self {
            registry,
            catalog,
            config,
            running: AtomicBool::new(false),
            status: Mutex::new(WorkflowStatus::Idle),
            log: Mutex::new(Vec::new()),
            events,
        })
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn catalog(&self) -> &Arc<dyn FirmwareCatalog> {
        &self.catalog
    }

    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    /// True while a deployment runs; the deploy control should be disabled.
    pub fn is_busy(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> WorkflowStatus {
        *self.status.lock()
    }

    /// Activity log of the current or most recent run.
    pub fn activity_log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    /// Deploys to whatever device the registry has selected.
    pub async fn deploy_selected(&self, firmware: Option<FirmwareSource>, force: bool) -> DeployResult {
        let request = DeployRequest {
            device: self.registry.selected(),
            firmware,
            force,
        };
        self.deploy(request).await
    }

    /// Runs [`deploy`](Self::deploy) on the tokio runtime, away from the
    /// caller's task.
    pub fn spawn_deploy(self: &Arc<Self>, request: DeployRequest) -> JoinHandle<DeployResult> {
        let workflow = Arc::clone(self);
        tokio::spawn(async move { workflow.deploy(request).await })
    }

    pub async fn deploy(&self, request: DeployRequest) -> DeployResult {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            let error = DeployError::Busy;
            warn!("Deploy rejected: {}", error);

            // the running deployment owns the activity log
            let entry = timestamped(&format!("✗ {}", error));
            self.emit(WorkflowEvent::Log(entry.clone()));
            return Err(DeployFailure {
                error,
                log: vec![entry],
            });
        }
        let _guard = RunGuard(&self.running);

        self.begin_run();
        self.stage(Stage::Preflight);

        let (device, source) = match preflight(&request) {
            Ok(selection) => selection,
            Err(e) => return Err(self.fail(e.into())),
        };

        self.record(format!("Starting firmware update for {}", device.display_name()));
        self.record(format!("Target firmware version: {}", source));

        match self.execute(&device, &source, request.force).await {
            Ok(report) => {
                self.record("✓ Firmware update completed successfully!");
                self.finish(WorkflowStatus::Succeeded);
                Ok(DeployReport {
                    log: self.activity_log(),
                    ..report
                })
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn execute(
        &self,
        device: &Device,
        source: &FirmwareSource,
        force: bool,
    ) -> std::result::Result<DeployReport, DeployError> {
        self.stage(Stage::Disconnect);
        self.record("Closing device connections...");
        self.registry.refresh(self.config.include_all, false).await?;
        self.record(format!(
            "Waiting {}s for the OS to release port handles...",
            self.config.disconnect_settle.as_secs_f32()
        ));
        sleep(self.config.disconnect_settle).await;

        self.stage(Stage::Validate);
        let firmware_path = self.resolve(source);
        self.record(format!("Validating firmware file: {}", firmware_path.display()));
        validate_firmware_file(&firmware_path, &self.config.accepted_extensions)?;
        self.record("✓ Firmware file validated");

        self.stage(Stage::Flash);
        let target = device.upload_target();
        if force {
            self.record(format!(
                "Starting FORCED firmware upload to {} ({})...",
                device.display_name(),
                target
            ));
        } else {
            self.record(format!(
                "Starting firmware upload to {} ({})...",
                device.display_name(),
                target
            ));
        }

        let report = self
            .registry
            .gateway()
            .upload_firmware(&firmware_path, target, force, true, true)
            .await?;

        if !report.success {
            let output = report.output;
            return Err(if force {
                DeployError::ForcedUploadFailed { output }
            } else {
                DeployError::RetryWithForce { output }
            });
        }
        self.record("✓ Firmware uploaded successfully");

        self.stage(Stage::PostFlashWait);
        self.record("Waiting for device to reboot...");
        sleep(self.config.reboot_settle).await;

        self.stage(Stage::Verify);
        self.record("Verifying firmware installation...");
        self.registry.refresh(self.config.include_all, true).await?;

        let refreshed = self.registry.find_by_port(&device.port_name);
        match &refreshed {
            Some(updated) => {
                // leave an unrelated selection alone; refresh already rebound a matching one
                let keep_other = self
                    .registry
                    .selected()
                    .is_some_and(|selected| selected.port_name != updated.port_name);
                if !keep_other {
                    self.registry.select(updated.clone());
                }
                self.record(format!(
                    "✓ Firmware verified: {} reports firmware {}",
                    updated.display_name(),
                    updated.firmware_version.as_deref().unwrap_or("unknown")
                ));
                self.emit(WorkflowEvent::DeviceUpdated(updated.clone()));
            }
            None => {
                warn!("{} did not re-enumerate after upload", device.port_name);
                self.record(format!(
                    "Device on {} has not reappeared yet",
                    device.port_name
                ));
            }
        }

        Ok(DeployReport {
            upload_output: report.output,
            device: refreshed,
            log: Vec::new(),
        })
    }

    fn resolve(&self, source: &FirmwareSource) -> PathBuf {
        match source {
            FirmwareSource::LocalFile(path) => path.clone(),
            FirmwareSource::CatalogVersion(version) => match self.catalog.resolve(version) {
                Some(path) => path,
                None => {
                    warn!("Firmware version {} has no local file", version);
                    PathBuf::from(version)
                }
            },
        }
    }

    fn begin_run(&self) {
        self.log.lock().clear();
        *self.status.lock() = WorkflowStatus::Running;
    }

    fn stage(&self, stage: Stage) {
        info!("Deployment stage: {}", stage);
        self.emit(WorkflowEvent::StageStarted(stage));
    }

    fn record(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        let entry = timestamped(message);

        info!("{}", message);
        self.log.lock().push(entry.clone());
        self.emit(WorkflowEvent::Log(entry));
    }

    fn fail(&self, error: DeployError) -> DeployFailure {
        match &error {
            DeployError::Unexpected { .. } => error!("Deployment aborted: {}", error),
            _ => warn!("Deployment failed: {}", error),
        }

        self.record(format!("✗ {}", error));
        if let Some(hint) = error.remediation() {
            self.record(hint);
        }
        self.finish(WorkflowStatus::Failed);

        DeployFailure {
            error,
            log: self.activity_log(),
        }
    }

    fn finish(&self, status: WorkflowStatus) {
        *self.status.lock() = status;
        self.emit(WorkflowEvent::Finished(status));
    }

    fn emit(&self, event: WorkflowEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

fn timestamped(message: &str) -> String {
    format!("[{}] {}", Local::now().format("%H:%M:%S"), message)
}

fn preflight(request: &DeployRequest) -> Result<(Device, FirmwareSource)> {
    let device = request
        .device
        .clone()
        .ok_or_else(|| Error::InputValidation("Please select a device first".into()))?;
    let source = request.firmware.clone().ok_or_else(|| {
        Error::InputValidation("Please select a firmware file or version".into())
    })?;

    Ok((device, source))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepted() -> Vec<String> {
        UpdaterConfig::new().accepted_extensions
    }

    #[test]
    fn accepts_uf2_and_hex_in_any_case() {
        for name in ["fw.uf2", "fw.hex", "FW.UF2", "dir.v2/Fw.Hex"] {
            assert!(
                validate_firmware_file(Path::new(name), &accepted()).is_ok(),
                "{} should be accepted",
                name
            );
        }
    }

    #[test]
    fn rejects_other_extensions() {
        for name in ["fw.bin", "fw", "uf2", "fw.uf2.bak", "0.3.0"] {
            match validate_firmware_file(Path::new(name), &accepted()) {
                Err(Error::InvalidFirmware(path)) => assert_eq!(path, Path::new(name)),
                other => panic!("{} should be rejected, got {:?}", name, other),
            }
        }
    }

    #[test]
    fn invalid_firmware_error_names_path() {
        let err = validate_firmware_file(Path::new("image.bin"), &accepted()).unwrap_err();
        assert!(err.to_string().contains("image.bin"));
    }

    #[test]
    fn preflight_requires_device_and_firmware() {
        let err = preflight(&DeployRequest::new().with_firmware_file("fw.uf2")).unwrap_err();
        assert!(matches!(err, Error::InputValidation(_)));
    }

    #[test]
    fn deploy_error_classification() {
        assert!(matches!(
            DeployError::from(Error::InvalidFirmware("fw.bin".into())),
            DeployError::InputValidation(_)
        ));
        assert!(matches!(
            DeployError::from(Error::ToolInvocation("gone".into())),
            DeployError::Unexpected { .. }
        ));
        assert_eq!(
            DeployError::RetryWithForce { output: "x".into() }.remediation(),
            Some(FORCE_REMEDIATION)
        );
        assert_eq!(
            DeployError::ForcedUploadFailed { output: "x".into() }.remediation(),
            None
        );
    }
}
