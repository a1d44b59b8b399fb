//! Access to the external `HarpRegulator` tool.
//!
//! Everything the crate knows about devices and uploads goes through
//! [`CliGateway`]. [`RegulatorCli`] runs the real executable; [`MockGateway`]
//! replays scripted responses and records the calls it receives.

use std::path::Path;

use async_trait::async_trait;
use log::warn;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

pub mod mock;
mod regulator;

pub use mock::{GatewayCall, MockGateway};
pub use regulator::{GatewayConfig, RegulatorCli, DEFAULT_CLI_PATH, DEFAULT_TOOL_TIMEOUT};

/// One JSON object from the listing output, keyed by the tool's field names.
pub type RawRecord = Map<String, Value>;

/// Result of a flash attempt the tool completed, successfully or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub success: bool,
    pub output: String,
}

impl UploadReport {
    pub fn succeeded(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }
}

#[async_trait]
pub trait CliGateway: Send + Sync {
    /// Enumerates devices.
    ///
    /// With `allow_connect` unset the tool must not open the device ports,
    /// which is what lets a following upload claim them.
    async fn list_devices(&self, include_all: bool, allow_connect: bool) -> Result<Vec<RawRecord>>;

    /// Flashes `firmware_path` onto `target`.
    ///
    /// A failure reported by the tool comes back as `Ok` with
    /// `success == false`; `Err` means the tool could not be run at all.
    async fn upload_firmware(
        &self,
        firmware_path: &Path,
        target: &str,
        force: bool,
        no_interactive: bool,
        progress: bool,
    ) -> Result<UploadReport>;
}

/// Parses listing stdout into records, skipping array entries that are not
/// JSON objects.
pub(crate) fn parse_listing(stdout: &[u8]) -> Result<Vec<RawRecord>> {
    let value: Value = serde_json::from_slice(stdout)?;

    let entries = match value {
        Value::Array(entries) => entries,
        other => {
            return Err(Error::ToolInvocation(format!(
                "expected a JSON array from listing, got {}",
                json_kind(&other)
            )))
        }
    };

    let mut records = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match entry {
            Value::Object(record) => records.push(record),
            other => warn!("Skipping listing entry {}: not an object ({})", index, json_kind(&other)),
        }
    }

    Ok(records)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
