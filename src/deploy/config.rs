use std::time::Duration;

use crate::error::{Error, Result};

/// Time for the OS to release port handles after the disconnect listing.
pub const DISCONNECT_SETTLE: Duration = Duration::from_secs(3);
/// Time for a freshly flashed device to reboot and re-enumerate.
pub const REBOOT_SETTLE: Duration = Duration::from_secs(5);
pub const ACCEPTED_EXTENSIONS: [&str; 2] = ["uf2", "hex"];
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct UpdaterConfig {
    pub disconnect_settle: Duration,
    pub reboot_settle: Duration,
    pub include_all: bool,
    pub accepted_extensions: Vec<String>,
    pub event_capacity: usize,
    pub enforce_minimum_delays: bool,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            disconnect_settle: DISCONNECT_SETTLE,
            reboot_settle: REBOOT_SETTLE,
            include_all: true,
            accepted_extensions: ACCEPTED_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            enforce_minimum_delays: true,
        }
    }
}

impl UpdaterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_disconnect_settle(mut self, delay: Duration) -> Self {
        self.disconnect_settle = delay;
        self
    }

    pub fn with_reboot_settle(mut self, delay: Duration) -> Self {
        self.reboot_settle = delay;
        self
    }

    pub fn with_include_all(mut self, include_all: bool) -> Self {
        self.include_all = include_all;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Allows settle delays shorter than the defaults. Uploading before the
    /// port is released fails on most hosts, so this is for tests only.
    pub fn unchecked_delays(mut self) -> Self {
        self.enforce_minimum_delays = false;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.enforce_minimum_delays {
            if self.disconnect_settle < DISCONNECT_SETTLE {
                return Err(Error::Configuration(format!(
                    "disconnect settle delay must be at least {:?}",
                    DISCONNECT_SETTLE
                )));
            }
            if self.reboot_settle < REBOOT_SETTLE {
                return Err(Error::Configuration(format!(
                    "reboot settle delay must be at least {:?}",
                    REBOOT_SETTLE
                )));
            }
        }

        if self.accepted_extensions.is_empty() {
            return Err(Error::Configuration(
                "at least one firmware extension must be accepted".into(),
            ));
        }

        if self.event_capacity == 0 {
            return Err(Error::Configuration("event capacity must be non-zero".into()));
        }

        Ok(())
    }
}
