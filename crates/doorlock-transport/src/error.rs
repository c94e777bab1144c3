//! Error types for serial transport operations.

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur while talking to the serial line.
///
/// None of these are retried inside the transport; the caller decides.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The port could not be opened or configured.
    #[error("Failed to open {port}: {message}")]
    ConnectFailed { port: String, message: String },

    /// An operation needed an open port.
    #[error("Transport is not open")]
    NotOpen,

    /// The line rejected a write.
    #[error("Write failed: {message}")]
    WriteFailed { message: String },

    /// A write did not complete within the write timeout.
    #[error("Write timeout after {duration_ms}ms")]
    WriteTimeout { duration_ms: u64 },

    /// Reading buffered bytes failed.
    #[error("Read failed: {message}")]
    ReadFailed { message: String },

    /// The line went away while a wait or read was in progress.
    #[error("Device disconnected: {port}")]
    Disconnected { port: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    pub fn connect_failed(port: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectFailed {
            port: port.into(),
            message: message.into(),
        }
    }

    pub fn write_failed(message: impl Into<String>) -> Self {
        Self::WriteFailed {
            message: message.into(),
        }
    }

    pub fn write_timeout(duration_ms: u64) -> Self {
        Self::WriteTimeout { duration_ms }
    }

    pub fn read_failed(message: impl Into<String>) -> Self {
        Self::ReadFailed {
            message: message.into(),
        }
    }

    pub fn disconnected(port: impl Into<String>) -> Self {
        Self::Disconnected { port: port.into() }
    }

    /// True for errors raised before any byte reached the line.
    pub fn is_connect_failure(&self) -> bool {
        matches!(self, Self::ConnectFailed { .. } | Self::NotOpen)
    }
}
