//! Error taxonomy for lock controller operations.

use doorlock_transport::TransportError;

/// Result type alias for controller operations.
pub type Result<T> = std::result::Result<T, DoorLockError>;

/// Errors surfaced by the `try_*` controller operations.
///
/// The plain operations (`open_lock`, `query_status`, ...) fold these into a
/// `bool` or an unknown status instead of returning them.
#[derive(Debug, thiserror::Error)]
pub enum DoorLockError {
    /// The serial port could not be opened. The next operation retries the
    /// connection.
    #[error("Cannot connect to {port}: {source}")]
    ConnectFailed {
        port: String,
        #[source]
        source: TransportError,
    },

    /// The command could not be written. Nothing was waited for.
    #[error("Write failed: {0}")]
    WriteFailed(#[source] TransportError),

    /// No reply arrived within the response timeout.
    #[error("No reply within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// A raw command was not valid hex. No I/O was performed.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Reply bytes were present but matched no known framing.
    #[error("Reply matched no known framing (raw: {raw_hex})")]
    ParseAmbiguous { raw_hex: String },

    /// Transport failure outside the write step.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Protocol or configuration error.
    #[error("Protocol error: {0}")]
    Protocol(doorlock_core::Error),
}

impl DoorLockError {
    pub fn connect_failed(port: impl Into<String>, source: TransportError) -> Self {
        Self::ConnectFailed {
            port: port.into(),
            source,
        }
    }

    pub fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout { timeout_ms }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<doorlock_core::Error> for DoorLockError {
    fn from(error: doorlock_core::Error) -> Self {
        match error {
            doorlock_core::Error::MalformedInput(message) => Self::MalformedInput(message),
            other => Self::Protocol(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_input_is_lifted() {
        let error: DoorLockError = doorlock_core::Error::malformed("hex command is empty").into();
        assert!(matches!(error, DoorLockError::MalformedInput(_)));
        assert_eq!(error.to_string(), "Malformed input: hex command is empty");
    }

    #[test]
    fn test_other_core_errors_are_protocol() {
        let error: DoorLockError = doorlock_core::Error::config("port must not be empty").into();
        assert!(matches!(error, DoorLockError::Protocol(_)));
    }

    #[test]
    fn test_connect_failed_keeps_source() {
        let error = DoorLockError::connect_failed(
            "COM2",
            TransportError::connect_failed("COM2", "access denied"),
        );
        assert!(error.to_string().starts_with("Cannot connect to COM2"));
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_timeout() {
        let error = DoorLockError::timeout(1000);
        assert!(error.is_timeout());
        assert_eq!(error.to_string(), "No reply within 1000ms");
    }
}
