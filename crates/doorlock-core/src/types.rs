use crate::{
    Result,
    constants::{DEFAULT_DEVICE_ID, MIN_DEVICE_ID},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Device address on the serial bus (1-255).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DeviceId(u8);

impl DeviceId {
    /// Create a new device ID with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidDeviceId` for address 0.
    pub fn new(id: u8) -> Result<Self> {
        if id < MIN_DEVICE_ID {
            return Err(Error::InvalidDeviceId(format!(
                "Device ID must be {MIN_DEVICE_ID}-{}, got {id}",
                u8::MAX
            )));
        }
        Ok(DeviceId(id))
    }

    /// Get the raw device address byte.
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        DeviceId(DEFAULT_DEVICE_ID)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DeviceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let id: u8 = s
            .trim()
            .parse()
            .map_err(|_| Error::InvalidDeviceId(format!("Invalid device ID: {s}")))?;
        DeviceId::new(id)
    }
}

impl TryFrom<u8> for DeviceId {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        DeviceId::new(value)
    }
}

impl From<DeviceId> for u8 {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

/// Lock command issued to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockCommand {
    Open,
    Close,
}

impl fmt::Display for LockCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LockCommand::Open => write!(f, "open"),
            LockCommand::Close => write!(f, "close"),
        }
    }
}

/// State of the lock bolt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    Locked,
    Unlocked,
    Unknown,
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            LockState::Locked => "locked",
            LockState::Unlocked => "unlocked",
            LockState::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// State of the door leaf as reported by the controller's sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorState {
    Open,
    Closed,
    Unknown,
}

impl fmt::Display for DoorState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            DoorState::Open => "open",
            DoorState::Closed => "closed",
            DoorState::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Normalized lock/door status derived from a status reply.
///
/// A status is always produced, even when the controller stays silent or
/// answers with bytes no known framing recognizes: in that case both states
/// are [`LockState::Unknown`]/[`DoorState::Unknown`] and `description`
/// explains why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockStatus {
    /// Two character status code, when one was decoded.
    pub status_code: Option<String>,

    /// Bolt state.
    pub lock_state: LockState,

    /// Door sensor state.
    pub door_state: DoorState,

    /// Human readable description.
    pub description: String,

    /// Reply bytes as hex, kept for diagnostics.
    pub raw_hex: Option<String>,
}

impl LockStatus {
    /// Status with both states unknown.
    pub fn unknown(description: impl Into<String>) -> Self {
        Self {
            status_code: None,
            lock_state: LockState::Unknown,
            door_state: DoorState::Unknown,
            description: description.into(),
            raw_hex: None,
        }
    }

    /// Attach the raw reply bytes (hex) to this status.
    #[must_use]
    pub fn with_raw_hex(mut self, raw_hex: impl Into<String>) -> Self {
        self.raw_hex = Some(raw_hex.into());
        self
    }

    /// True when both lock and door states are known.
    pub fn is_known(&self) -> bool {
        self.lock_state != LockState::Unknown && self.door_state != DoorState::Unknown
    }
}

impl fmt::Display for LockStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "lock={} door={} ({})",
            self.lock_state, self.door_state, self.description
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1", 1)]
    #[case("15", 15)]
    #[case(" 42 ", 42)]
    #[case("255", 255)]
    fn test_device_id_valid(#[case] input: &str, #[case] expected: u8) {
        let id: DeviceId = input.parse().unwrap();
        assert_eq!(id.as_u8(), expected);
    }

    #[rstest]
    #[case("0")] // reserved
    #[case("256")] // > u8
    #[case("abc")] // non-numeric
    #[case("")]
    fn test_device_id_invalid(#[case] input: &str) {
        let result: Result<DeviceId> = input.parse();
        assert!(matches!(result, Err(Error::InvalidDeviceId(_))));
    }

    #[test]
    fn test_device_id_default() {
        assert_eq!(DeviceId::default().as_u8(), 1);
    }

    #[test]
    fn test_device_id_serde() {
        let id = DeviceId::new(7).unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "7");

        let parsed: DeviceId = serde_json::from_str("7").unwrap();
        assert_eq!(parsed, id);

        assert!(serde_json::from_str::<DeviceId>("0").is_err());
    }

    #[test]
    fn test_unknown_status() {
        let status = LockStatus::unknown("no reply").with_raw_hex("01 02");
        assert_eq!(status.lock_state, LockState::Unknown);
        assert_eq!(status.door_state, DoorState::Unknown);
        assert_eq!(status.status_code, None);
        assert_eq!(status.raw_hex.as_deref(), Some("01 02"));
        assert!(!status.is_known());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let status = LockStatus {
            status_code: Some("10".to_string()),
            lock_state: LockState::Unlocked,
            door_state: DoorState::Open,
            description: "Door open".to_string(),
            raw_hex: None,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["lock_state"], "unlocked");
        assert_eq!(json["door_state"], "open");
        assert_eq!(json["status_code"], "10");
    }

    #[test]
    fn test_display() {
        assert_eq!(LockCommand::Open.to_string(), "open");
        assert_eq!(LockState::Locked.to_string(), "locked");
        assert_eq!(DoorState::Closed.to_string(), "closed");
    }
}
