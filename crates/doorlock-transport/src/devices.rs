//! Enum wrapper for transport dispatch.
//!
//! Native `async fn` in traits is not object-safe, so `Box<dyn Transport>`
//! is unavailable. [`AnyTransport`] provides concrete dispatch over the
//! transports this crate ships, selected from
//! [`ConnectionConfig::io_model`].
//!
//! # Examples
//!
//! ```
//! use doorlock_core::{ConnectionConfig, IoModel};
//! use doorlock_transport::AnyTransport;
//!
//! let config = ConnectionConfig::new("COM2").with_io_model(IoModel::Polled);
//! let transport = AnyTransport::from_config(&config);
//! assert_eq!(transport.kind(), "polled");
//! ```

use crate::event::EventTransport;
use crate::mock::MockTransport;
use crate::polled::PolledTransport;
use crate::{Result, Transport};
use bytes::Bytes;
use doorlock_core::{ConnectionConfig, IoModel};
use std::time::Duration;

/// Enum wrapper for transport dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyTransport {
    /// Synchronous handle with timed readiness checks.
    Polled(PolledTransport),
    /// Asynchronous handle with a background reader task.
    EventDriven(EventTransport),
    /// Scripted transport for development and testing.
    Mock(MockTransport),
}

impl AnyTransport {
    /// Real serial transport for the configured I/O model.
    pub fn from_config(config: &ConnectionConfig) -> Self {
        match config.io_model {
            IoModel::Polled => Self::Polled(PolledTransport::new()),
            IoModel::EventDriven => Self::EventDriven(EventTransport::new()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Polled(_) => "polled",
            Self::EventDriven(_) => "event_driven",
            Self::Mock(_) => "mock",
        }
    }
}

impl From<MockTransport> for AnyTransport {
    fn from(transport: MockTransport) -> Self {
        Self::Mock(transport)
    }
}

impl From<PolledTransport> for AnyTransport {
    fn from(transport: PolledTransport) -> Self {
        Self::Polled(transport)
    }
}

impl From<EventTransport> for AnyTransport {
    fn from(transport: EventTransport) -> Self {
        Self::EventDriven(transport)
    }
}

impl Transport for AnyTransport {
    fn is_open(&self) -> bool {
        match self {
            Self::Polled(t) => t.is_open(),
            Self::EventDriven(t) => t.is_open(),
            Self::Mock(t) => t.is_open(),
        }
    }

    /// Opens the transport. A serial variant that does not match
    /// `config.io_model` is closed and replaced first; the mock is kept.
    async fn open(&mut self, config: &ConnectionConfig) -> Result<()> {
        let mismatched = matches!(
            (&*self, config.io_model),
            (Self::Polled(_), IoModel::EventDriven) | (Self::EventDriven(_), IoModel::Polled)
        );
        if mismatched {
            self.close().await;
            *self = Self::from_config(config);
        }

        match self {
            Self::Polled(t) => t.open(config).await,
            Self::EventDriven(t) => t.open(config).await,
            Self::Mock(t) => t.open(config).await,
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize> {
        match self {
            Self::Polled(t) => t.write(data).await,
            Self::EventDriven(t) => t.write(data).await,
            Self::Mock(t) => t.write(data).await,
        }
    }

    fn arm_read_wait(&mut self) -> Result<()> {
        match self {
            Self::Polled(t) => t.arm_read_wait(),
            Self::EventDriven(t) => t.arm_read_wait(),
            Self::Mock(t) => t.arm_read_wait(),
        }
    }

    async fn wait_for_readable(&mut self, timeout: Duration) -> Result<bool> {
        match self {
            Self::Polled(t) => t.wait_for_readable(timeout).await,
            Self::EventDriven(t) => t.wait_for_readable(timeout).await,
            Self::Mock(t) => t.wait_for_readable(timeout).await,
        }
    }

    fn cancel_read_wait(&mut self) {
        match self {
            Self::Polled(t) => t.cancel_read_wait(),
            Self::EventDriven(t) => t.cancel_read_wait(),
            Self::Mock(t) => t.cancel_read_wait(),
        }
    }

    fn read(&mut self, max: usize) -> Result<Bytes> {
        match self {
            Self::Polled(t) => t.read(max),
            Self::EventDriven(t) => t.read(max),
            Self::Mock(t) => t.read(max),
        }
    }

    fn purge_receive_buffer(&mut self) -> Result<usize> {
        match self {
            Self::Polled(t) => t.purge_receive_buffer(),
            Self::EventDriven(t) => t.purge_receive_buffer(),
            Self::Mock(t) => t.purge_receive_buffer(),
        }
    }

    async fn close(&mut self) {
        match self {
            Self::Polled(t) => t.close().await,
            Self::EventDriven(t) => t.close().await,
            Self::Mock(t) => t.close().await,
        }
    }

    fn pending_waits(&self) -> usize {
        match self {
            Self::Polled(t) => t.pending_waits(),
            Self::EventDriven(t) => t.pending_waits(),
            Self::Mock(t) => t.pending_waits(),
        }
    }
}
