//! Connection configuration for a single lock controller.
//!
//! A [`ConnectionConfig`] is an immutable value handed to the device
//! controller at construction. Changing any field means tearing the transport
//! down and opening it again with the new value.
//!
//! # Examples
//!
//! ```
//! use doorlock_core::{ConnectionConfig, FramingMode};
//!
//! let config = ConnectionConfig::new("COM3")
//!     .with_baud_rate(19200)
//!     .with_framing(FramingMode::Legacy)
//!     .with_append_terminator(true);
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.response_timeout().as_millis(), 1000);
//! ```

use crate::{DeviceId, Error, Result, constants::*};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Command encoding used for open/close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FramingMode {
    /// 4-byte opcode, optionally CR terminated. Older firmware.
    Legacy,
    /// `DLE STX id ESC cmd param DLE ETX`. Current firmware.
    #[default]
    Structured,
}

impl fmt::Display for FramingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramingMode::Legacy => write!(f, "legacy"),
            FramingMode::Structured => write!(f, "structured"),
        }
    }
}

/// How the transport waits for reply data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IoModel {
    /// Synchronous port handle; readiness is checked on a timer.
    Polled,
    /// Asynchronous port handle; a reader task signals arrivals.
    #[default]
    EventDriven,
}

impl fmt::Display for IoModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoModel::Polled => write!(f, "polled"),
            IoModel::EventDriven => write!(f, "event_driven"),
        }
    }
}

/// Serial connection settings for one lock controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Serial port name (e.g. `COM2`, `/dev/ttyUSB0`).
    pub port: String,

    /// Line speed in bits per second.
    pub baud_rate: u32,

    /// How long to wait for a reply after writing a command.
    pub response_timeout_ms: u64,

    /// Encoding used for open/close commands.
    pub framing: FramingMode,

    /// Append CR to legacy frames.
    pub append_terminator: bool,

    /// Default device address used when the caller does not pass one.
    pub device_id: DeviceId,

    /// Transport I/O model.
    pub io_model: IoModel,

    /// Delay after opening the port before the first command.
    pub settle_delay_ms: u64,

    /// Upper bound for a single write.
    pub write_timeout_ms: u64,

    /// Maximum bytes taken by a single reply read.
    pub read_capacity: usize,

    /// Readiness check interval for [`IoModel::Polled`].
    pub poll_interval_ms: u64,

    /// Treat a missing reply to open/close as a failure.
    pub require_reply: bool,
}

impl ConnectionConfig {
    /// Create a configuration for `port` with protocol defaults.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    #[must_use]
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout_ms = timeout.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn with_framing(mut self, framing: FramingMode) -> Self {
        self.framing = framing;
        self
    }

    #[must_use]
    pub fn with_append_terminator(mut self, append: bool) -> Self {
        self.append_terminator = append;
        self
    }

    #[must_use]
    pub fn with_device_id(mut self, device_id: DeviceId) -> Self {
        self.device_id = device_id;
        self
    }

    #[must_use]
    pub fn with_io_model(mut self, io_model: IoModel) -> Self {
        self.io_model = io_model;
        self
    }

    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay_ms = delay.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout_ms = timeout.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn with_read_capacity(mut self, capacity: usize) -> Self {
        self.read_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn with_require_reply(mut self, require: bool) -> Self {
        self.require_reply = require;
        self
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Check the configuration for values the transport cannot work with.
    ///
    /// # Errors
    /// Returns `Error::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.port.trim().is_empty() {
            return Err(Error::config("port must not be empty"));
        }
        if self.baud_rate == 0 {
            return Err(Error::config("baud_rate must be greater than zero"));
        }
        if self.response_timeout_ms == 0 {
            return Err(Error::config(
                "response_timeout_ms must be greater than zero",
            ));
        }
        if self.write_timeout_ms == 0 {
            return Err(Error::config("write_timeout_ms must be greater than zero"));
        }
        if self.read_capacity == 0 {
            return Err(Error::config("read_capacity must be greater than zero"));
        }
        if self.io_model == IoModel::Polled && self.poll_interval_ms == 0 {
            return Err(Error::config(
                "poll_interval_ms must be greater than zero for the polled I/O model",
            ));
        }
        Ok(())
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            framing: FramingMode::default(),
            append_terminator: false,
            device_id: DeviceId::default(),
            io_model: IoModel::default(),
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
            read_capacity: DEFAULT_READ_CAPACITY,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            require_reply: false,
        }
    }
}
