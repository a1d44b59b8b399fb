use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::device::Device;
use crate::error::Error;

pub const FORCE_REMEDIATION: &str =
    "To bypass safety checks, enable the \"Force upload\" option and try again.";

/// Where the firmware image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirmwareSource {
    LocalFile(PathBuf),
    CatalogVersion(String),
}

impl fmt::Display for FirmwareSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalFile(path) => write!(f, "{}", path.display()),
            Self::CatalogVersion(version) => f.write_str(version),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeployRequest {
    pub device: Option<Device>,
    pub firmware: Option<FirmwareSource>,
    pub force: bool,
}

impl DeployRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_device(mut self, device: Device) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_firmware_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.firmware = Some(FirmwareSource::LocalFile(path.into()));
        self
    }

    pub fn with_catalog_version(mut self, version: impl Into<String>) -> Self {
        self.firmware = Some(FirmwareSource::CatalogVersion(version.into()));
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Preflight,
    Disconnect,
    Validate,
    Flash,
    PostFlashWait,
    Verify,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Preflight => "preflight",
            Self::Disconnect => "disconnect",
            Self::Validate => "validate",
            Self::Flash => "flash",
            Self::PostFlashWait => "post-flash wait",
            Self::Verify => "verify",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStatus {
    Idle,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    StageStarted(Stage),
    /// Timestamped activity log line, exactly as appended
    Log(String),
    DeviceUpdated(Device),
    Finished(WorkflowStatus),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeployError {
    #[error("{0}")]
    InputValidation(String),

    #[error("A firmware deployment is already running")]
    Busy,

    #[error("Firmware upload failed: {output}")]
    RetryWithForce { output: String },

    #[error("Forced firmware upload failed: {output}")]
    ForcedUploadFailed { output: String },

    #[error("Error during firmware upload: {message}")]
    Unexpected { message: String },
}

impl DeployError {
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            Self::RetryWithForce { .. } => Some(FORCE_REMEDIATION),
            _ => None,
        }
    }
}

impl From<Error> for DeployError {
    fn from(e: Error) -> Self {
        match e {
            Error::InputValidation(_) | Error::InvalidFirmware(_) => {
                Self::InputValidation(e.to_string())
            }
            other => Self::Unexpected {
                message: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeployReport {
    pub upload_output: String,
    /// The device as enumerated after the reboot, if it came back
    pub device: Option<Device>,
    pub log: Vec<String>,
}

#[derive(Error, Debug, Clone)]
#[error("{error}")]
pub struct DeployFailure {
    pub error: DeployError,
    pub log: Vec<String>,
}

impl DeployFailure {
    pub fn remediation(&self) -> Option<&'static str> {
        self.error.remediation()
    }
}

pub type DeployResult = std::result::Result<DeployReport, DeployFailure>;
