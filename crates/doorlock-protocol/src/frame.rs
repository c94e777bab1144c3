use crate::raw::format_hex;
use bytes::Bytes;
use doorlock_core::{DeviceId, LockCommand};
use std::fmt;

/// What a [`CommandFrame`] asks the controller to do.
///
/// Used for logging and for deciding whether a reply should be parsed as a
/// status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// 4-byte legacy open/close.
    Legacy(LockCommand),

    /// Structured open/close addressed to a device.
    Structured {
        device_id: DeviceId,
        command: LockCommand,
        param: u8,
    },

    /// Structured status query.
    StatusQuery(DeviceId),

    /// Bytes supplied verbatim by the caller.
    Raw,
}

impl FrameKind {
    /// True for frames whose reply carries a lock status.
    pub fn expects_status(&self) -> bool {
        matches!(self, FrameKind::StatusQuery(_))
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::Legacy(command) => write!(f, "legacy-{command}"),
            FrameKind::Structured {
                device_id, command, ..
            } => write!(f, "{command}@{device_id}"),
            FrameKind::StatusQuery(device_id) => write!(f, "status@{device_id}"),
            FrameKind::Raw => write!(f, "raw"),
        }
    }
}

/// An outbound command ready to be written to the serial line.
///
/// A frame is an immutable byte sequence tagged with its [`FrameKind`].
/// Frames are built by the functions in [`builder`](crate::builder) and
/// written unmodified by the transport.
///
/// # Examples
///
/// ```
/// use doorlock_core::{DeviceId, LockCommand};
/// use doorlock_protocol::{build_structured_frame, FrameKind};
/// use doorlock_core::constants::PARAM_MANUAL;
///
/// let frame = build_structured_frame(DeviceId::default(), LockCommand::Open, PARAM_MANUAL);
/// assert_eq!(frame.as_bytes(), &[0x10, 0x02, 0x01, 0x1B, 0x31, 0xFF, 0x10, 0x03]);
/// assert!(!frame.kind().expects_status());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    kind: FrameKind,
    data: Bytes,
}

impl CommandFrame {
    pub fn new(kind: FrameKind, data: impl Into<Bytes>) -> Self {
        Self {
            kind,
            data: data.into(),
        }
    }

    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Spaced uppercase hex of the frame, for logs.
    pub fn to_hex(&self) -> String {
        format_hex(&self.data)
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }
}

impl AsRef<[u8]> for CommandFrame {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Display for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frame[kind={}, size={}, bytes={}]",
            self.kind,
            self.data.len(),
            self.to_hex()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_accessors() {
        let frame = CommandFrame::new(FrameKind::Raw, vec![0x01, 0x02]);
        assert_eq!(frame.len(), 2);
        assert!(!frame.is_empty());
        assert_eq!(frame.as_bytes(), &[0x01, 0x02]);
        assert_eq!(frame.kind(), FrameKind::Raw);
        assert_eq!(frame.clone().into_bytes().as_ref(), &[0x01, 0x02]);
    }

    #[test]
    fn test_frame_display() {
        let frame = CommandFrame::new(FrameKind::Legacy(LockCommand::Close), vec![0, 0, 0, 0]);
        let display = frame.to_string();

        assert!(display.contains("kind=legacy-close"));
        assert!(display.contains("size=4"));
        assert!(display.contains("00 00 00 00"));
    }

    #[test]
    fn test_kind_display() {
        let device_id = DeviceId::new(3).unwrap();
        assert_eq!(FrameKind::StatusQuery(device_id).to_string(), "status@3");
        assert_eq!(
            FrameKind::Structured {
                device_id,
                command: LockCommand::Open,
                param: 0xFF
            }
            .to_string(),
            "open@3"
        );
    }

    #[test]
    fn test_expects_status() {
        assert!(FrameKind::StatusQuery(DeviceId::default()).expects_status());
        assert!(!FrameKind::Raw.expects_status());
        assert!(!FrameKind::Legacy(LockCommand::Open).expects_status());
    }
}
