//! Core constants for the door lock serial protocol.
//!
//! This module defines the framing markers, command bytes and connection
//! defaults shared by every crate in the workspace. The lock controller speaks
//! a vendor binary protocol over a point-to-point serial line; two command
//! encodings coexist across firmware revisions.
//!
//! # Command Encodings
//!
//! ```text
//! Legacy:      01 00 00 00 [0D]              open
//!              00 00 00 00 [0D]              close
//! Structured:  DLE STX <id> ESC <cmd> <param> DLE ETX
//! Status:      DLE STX <id> 1C FF 00 DLE ETX
//! ```
//!
//! # Reply Framings
//!
//! ```text
//! SOH form:    SOH <c1> <c2> DLE ETX
//! STX-S form:  STX 'S' <id> <c1> <c2> DLE ETX
//! ```
//!
//! `<c1><c2>` is a two character ASCII status code.
//!
//! # Usage
//!
//! ```
//! use doorlock_core::constants::*;
//!
//! let envelope_start = [DLE, STX];
//! let envelope_end = [DLE, ETX];
//! assert_eq!(STRUCTURED_FRAME_LEN, 8);
//! assert_eq!(envelope_start.len() + envelope_end.len(), FRAME_OVERHEAD);
//! ```
//!
//! # Protocol Compliance
//!
//! The byte values are fixed by the lock vendor. Modifying them breaks
//! compatibility with the physical controller.

// ============================================================================
// Transmission Control Bytes
// ============================================================================

/// Start of heading (SOH). Opens the short status reply.
pub const SOH: u8 = 0x01;

/// Start of text (STX). Second byte of every structured frame.
pub const STX: u8 = 0x02;

/// End of text (ETX). Last byte of every structured frame and reply.
pub const ETX: u8 = 0x03;

/// Data link escape (DLE). Precedes STX and ETX in the frame envelope.
pub const DLE: u8 = 0x10;

/// Escape (ESC). Separates the device address from the command character
/// in open/close frames.
pub const ESC: u8 = 0x1B;

/// Carriage return. Optional terminator for legacy frames.
pub const CR: u8 = 0x0D;

/// Envelope overhead of a structured frame (`DLE STX` + `DLE ETX`).
pub const FRAME_OVERHEAD: usize = 4;

// ============================================================================
// Structured Commands
// ============================================================================

/// Command character for "open" in structured frames (`'1'`).
pub const CMD_OPEN: u8 = b'1';

/// Command character for "close" in structured frames (`'0'`).
pub const CMD_CLOSE: u8 = b'0';

/// Parameter byte for a manual open or close.
pub const PARAM_MANUAL: u8 = 0xFF;

/// Parameter byte requesting automatic re-lock 5 seconds after opening
/// when the door is not opened.
pub const PARAM_AUTO_RECLOSE: u8 = 0x31;

/// Opcode of the status query frame.
pub const STATUS_QUERY_OPCODE: u8 = 0x1C;

/// Parameter bytes following [`STATUS_QUERY_OPCODE`].
pub const STATUS_QUERY_PARAMS: [u8; 2] = [0xFF, 0x00];

/// Length of an open/close structured frame.
pub const STRUCTURED_FRAME_LEN: usize = 8;

/// Length of a status query frame.
///
/// The query carries two parameter bytes after the opcode, so it has the same
/// on-wire length as an open/close frame.
pub const STATUS_QUERY_FRAME_LEN: usize = 8;

// ============================================================================
// Legacy Commands
// ============================================================================

/// Legacy 4-byte open command.
pub const LEGACY_OPEN: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

/// Legacy 4-byte close command.
pub const LEGACY_CLOSE: [u8; 4] = [0x00, 0x00, 0x00, 0x00];

// ============================================================================
// Replies
// ============================================================================

/// Marker byte following STX in the STX-S reply framing.
pub const STATUS_MARKER: u8 = b'S';

/// Length of the ASCII status code carried by every status reply.
pub const STATUS_CODE_LEN: usize = 2;

/// Minimum length of an SOH-form reply (`SOH c1 c2 DLE ETX`).
pub const SOH_REPLY_LEN: usize = 5;

/// Minimum length of an STX-S-form reply (`STX 'S' id c1 c2 DLE ETX`).
pub const STX_REPLY_LEN: usize = 7;

// ============================================================================
// Device Identification
// ============================================================================

/// Default device address on the serial bus.
pub const DEFAULT_DEVICE_ID: u8 = 1;

/// Minimum valid device address. Address 0 is never used by the controller.
pub const MIN_DEVICE_ID: u8 = 1;

// ============================================================================
// Connection Defaults
// ============================================================================

/// Default serial port name.
#[cfg(windows)]
pub const DEFAULT_PORT: &str = "COM2";

/// Default serial port name.
#[cfg(not(windows))]
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

/// Default baud rate of the lock controller.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default time to wait for a reply after a command (milliseconds).
///
/// # Examples
///
/// ```
/// use doorlock_core::constants::DEFAULT_RESPONSE_TIMEOUT_MS;
/// use std::time::Duration;
///
/// let timeout = Duration::from_millis(DEFAULT_RESPONSE_TIMEOUT_MS);
/// assert_eq!(timeout.as_secs(), 1);
/// ```
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 1000;

/// Default upper bound for a single write to complete (milliseconds).
///
/// Kept distinct from the response timeout: a stalled write means the line
/// is wedged, not that the lock is slow to answer.
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 5000;

/// Delay after opening the port before the first command (milliseconds).
///
/// The lock controller ignores commands that arrive before RTS/DTR have
/// settled.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 200;

/// Default capacity of a single reply read (bytes).
pub const DEFAULT_READ_CAPACITY: usize = 64;

/// Interval between readiness checks in the polled I/O model (milliseconds).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;
