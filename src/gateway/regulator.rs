use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use tokio::process::Command;
use tokio::time::timeout;

use super::{parse_listing, CliGateway, RawRecord, UploadReport};
use crate::error::{Error, Result};

pub const DEFAULT_CLI_PATH: &str = "HarpRegulator";
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(120);

const LIST_COMMAND: &str = "list";
const UPLOAD_COMMAND: &str = "upload";

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub cli_path: PathBuf,
    /// Limit for `list` invocations.
    pub timeout: Duration,
    /// Limit for `upload` invocations. `None` lets a flash run to completion.
    pub upload_timeout: Option<Duration>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            cli_path: PathBuf::from(DEFAULT_CLI_PATH),
            timeout: DEFAULT_TOOL_TIMEOUT,
            upload_timeout: None,
        }
    }
}

impl GatewayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cli_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cli_path = path.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.cli_path.as_os_str().is_empty() {
            return Err(Error::Configuration("CLI path must be specified".into()));
        }

        if self.timeout.is_zero() {
            return Err(Error::Configuration("tool timeout must be non-zero".into()));
        }

        if self.upload_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::Configuration("upload timeout must be non-zero".into()));
        }

        Ok(())
    }
}

/// Runs the `HarpRegulator` executable as a child process.
#[derive(Debug, Clone)]
pub struct RegulatorCli {
    config: GatewayConfig,
}

impl RegulatorCli {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn cli_path(&self) -> &Path {
        &self.config.cli_path
    }

    fn list_args(include_all: bool, allow_connect: bool) -> Vec<String> {
        let mut args = vec![LIST_COMMAND.to_string(), "--json".to_string()];
        if include_all {
            args.push("--all".to_string());
        }
        if allow_connect {
            args.push("--allow-connect".to_string());
        }
        args
    }

    fn upload_args(
        firmware_path: &Path,
        target: &str,
        force: bool,
        no_interactive: bool,
        progress: bool,
    ) -> Vec<String> {
        let mut args = vec![
            UPLOAD_COMMAND.to_string(),
            firmware_path.to_string_lossy().into_owned(),
            "--target".to_string(),
            target.to_string(),
        ];
        if force {
            args.push("--force".to_string());
        }
        if no_interactive {
            args.push("--no-interactive".to_string());
        }
        if progress {
            args.push("--progress".to_string());
        }
        args
    }

    async fn run(&self, args: &[String], limit: Option<Duration>) -> Result<Output> {
        let program = self.config.cli_path.display().to_string();
        debug!("Running {} {}", program, args.join(" "));

        let child = Command::new(&self.config.cli_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                error!("Failed to launch {}: {}", program, e);
                Error::ToolInvocation(format!("cannot launch {}: {}", program, e))
            })?;

        let output = match limit {
            Some(limit) => match timeout(limit, child.wait_with_output()).await {
                Ok(output) => output,
                Err(_) => {
                    error!("{} timed out after {:?}", program, limit);
                    return Err(Error::ToolInvocation(format!(
                        "{} timed out after {:?}",
                        program, limit
                    )));
                }
            },
            None => child.wait_with_output().await,
        };

        output.map_err(|e| {
            error!("Failed to collect output of {}: {}", program, e);
            Error::ToolInvocation(format!("{} did not complete: {}", program, e))
        })
    }
}

/// Stdout followed by stderr, trimmed; falls back to the exit status when
/// the tool printed nothing.
fn captured_text(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    let text = [stdout.trim(), stderr.trim()]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n");

    if text.is_empty() && !output.status.success() {
        match output.status.code() {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        }
    } else {
        text
    }
}

#[async_trait]
impl CliGateway for RegulatorCli {
    async fn list_devices(&self, include_all: bool, allow_connect: bool) -> Result<Vec<RawRecord>> {
        let output = self
            .run(
                &Self::list_args(include_all, allow_connect),
                Some(self.config.timeout),
            )
            .await?;

        if !output.status.success() {
            let text = captured_text(&output);
            error!("Device listing failed: {}", text);
            return Err(Error::ToolInvocation(format!("device listing failed: {}", text)));
        }

        let records = parse_listing(&output.stdout)?;
        debug!("Listing returned {} records", records.len());
        Ok(records)
    }

    async fn upload_firmware(
        &self,
        firmware_path: &Path,
        target: &str,
        force: bool,
        no_interactive: bool,
        progress: bool,
    ) -> Result<UploadReport> {
        let args = Self::upload_args(firmware_path, target, force, no_interactive, progress);
        let output = self.run(&args, self.config.upload_timeout).await?;
        let text = captured_text(&output);

        if output.status.success() {
            info!("Upload to {} finished", target);
            Ok(UploadReport::succeeded(text))
        } else {
            warn!("Upload to {} reported failure: {}", target, text);
            Ok(UploadReport::failed(text))
        }
    }
}
