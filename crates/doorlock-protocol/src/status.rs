//! Status code to lock/door state mapping.

use crate::parser::{ParsedStatus, parse_status_response};
use crate::raw::encode_hex;
use doorlock_core::{DoorState, LockState, LockStatus};

/// Known status codes.
const STATUS_TABLE: &[(&str, LockState, DoorState, &str)] = &[
    ("00", LockState::Unlocked, DoorState::Closed, "Unlocked (door closed)"),
    ("01", LockState::Locked, DoorState::Closed, "Locked (door closed)"),
    ("10", LockState::Unlocked, DoorState::Open, "Door open"),
];

/// Map a two character status code to a [`LockStatus`].
///
/// Unknown codes map to unknown/unknown with the code in the description.
/// This never fails.
///
/// # Examples
///
/// ```
/// use doorlock_core::{DoorState, LockState};
/// use doorlock_protocol::lock_status_for_code;
///
/// let status = lock_status_for_code("01");
/// assert_eq!(status.lock_state, LockState::Locked);
/// assert_eq!(status.door_state, DoorState::Closed);
///
/// let unknown = lock_status_for_code("42");
/// assert_eq!(unknown.lock_state, LockState::Unknown);
/// assert!(unknown.description.contains("42"));
/// ```
pub fn lock_status_for_code(code: &str) -> LockStatus {
    match STATUS_TABLE.iter().find(|(known, ..)| *known == code) {
        Some(&(_, lock_state, door_state, description)) => LockStatus {
            status_code: Some(code.to_string()),
            lock_state,
            door_state,
            description: description.to_string(),
            raw_hex: None,
        },
        None => LockStatus {
            status_code: Some(code.to_string()),
            ..LockStatus::unknown(format!("Unknown status code: {code}"))
        },
    }
}

impl ParsedStatus {
    /// Convert the parse result into a [`LockStatus`].
    ///
    /// Unparsed replies keep their raw bytes in `raw_hex`.
    pub fn into_lock_status(self) -> LockStatus {
        match self {
            ParsedStatus::Matched(m) => lock_status_for_code(&m.code),
            ParsedStatus::Unparsed { raw_hex } => {
                LockStatus::unknown(format!("Unparsed reply (raw: {raw_hex})"))
                    .with_raw_hex(raw_hex)
            }
        }
    }
}

/// Parse a status reply and map it to a [`LockStatus`].
///
/// The reply bytes are always attached as `raw_hex`.
pub fn status_from_reply(reply: &[u8]) -> LockStatus {
    parse_status_response(reply)
        .into_lock_status()
        .with_raw_hex(encode_hex(reply))
}
