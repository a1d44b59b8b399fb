//! Scripted gateway for tests and dry runs

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{CliGateway, RawRecord, UploadReport};
use crate::error::{Error, Result};

/// A call received by [`MockGateway`], in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    List {
        include_all: bool,
        allow_connect: bool,
    },
    Upload {
        firmware_path: PathBuf,
        target: String,
        force: bool,
        no_interactive: bool,
        progress: bool,
    },
}

#[derive(Default)]
struct MockState {
    listings: VecDeque<std::result::Result<Vec<RawRecord>, String>>,
    /// Repeated once the listing queue runs dry
    last_listing: Vec<RawRecord>,
    uploads: VecDeque<std::result::Result<UploadReport, String>>,
    calls: Vec<GatewayCall>,
}

/// In-memory [`CliGateway`].
///
/// Listing responses are consumed in order; the last successful one keeps
/// being returned afterwards. Uploads succeed unless a report was queued.
#[derive(Default)]
pub struct MockGateway {
    state: Mutex<MockState>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gateway whose every listing returns `records`.
    pub fn with_devices(records: Vec<RawRecord>) -> Self {
        let mock = Self::new();
        mock.state.lock().last_listing = records;
        mock
    }

    pub fn push_listing(&self, records: Vec<RawRecord>) {
        self.state.lock().listings.push_back(Ok(records));
    }

    /// Next listing fails as if the tool could not be run.
    pub fn push_listing_error(&self, message: impl Into<String>) {
        self.state.lock().listings.push_back(Err(message.into()));
    }

    pub fn push_upload(&self, report: UploadReport) {
        self.state.lock().uploads.push_back(Ok(report));
    }

    /// Next upload fails as if the tool could not be run.
    pub fn push_upload_error(&self, message: impl Into<String>) {
        self.state.lock().uploads.push_back(Err(message.into()));
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state.lock().calls.clone()
    }

    pub fn upload_calls(&self) -> Vec<GatewayCall> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, GatewayCall::Upload { .. }))
            .collect()
    }
}

#[async_trait]
impl CliGateway for MockGateway {
    async fn list_devices(&self, include_all: bool, allow_connect: bool) -> Result<Vec<RawRecord>> {
        let mut state = self.state.lock();
        state.calls.push(GatewayCall::List {
            include_all,
            allow_connect,
        });

        match state.listings.pop_front() {
            Some(Ok(records)) => {
                state.last_listing = records.clone();
                Ok(records)
            }
            Some(Err(message)) => Err(Error::ToolInvocation(message)),
            None => Ok(state.last_listing.clone()),
        }
    }

    async fn upload_firmware(
        &self,
        firmware_path: &Path,
        target: &str,
        force: bool,
        no_interactive: bool,
        progress: bool,
    ) -> Result<UploadReport> {
        let mut state = self.state.lock();
        state.calls.push(GatewayCall::Upload {
            firmware_path: firmware_path.to_path_buf(),
            target: target.to_string(),
            force,
            no_interactive,
            progress,
        });

        match state.uploads.pop_front() {
            Some(Ok(report)) => Ok(report),
            Some(Err(message)) => Err(Error::ToolInvocation(message)),
            None => Ok(UploadReport::succeeded("Upload complete")),
        }
    }
}
