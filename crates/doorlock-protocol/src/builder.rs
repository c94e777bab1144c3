//! Outbound command builders.
//!
//! Every builder except [`build_raw_frame`] is pure and total: any input
//! produces a well-formed frame.
//!
//! # Wire Layouts
//!
//! | Purpose | Bytes |
//! |---|---|
//! | Open (legacy) | `01 00 00 00` [`0D`] |
//! | Close (legacy) | `00 00 00 00` [`0D`] |
//! | Open (structured) | `10 02 <id> 1B 31 FF 10 03` |
//! | Open + 5s auto-close | `10 02 <id> 1B 31 31 10 03` |
//! | Close (structured) | `10 02 <id> 1B 30 FF 10 03` |
//! | Status query | `10 02 <id> 1C FF 00 10 03` |

use crate::frame::{CommandFrame, FrameKind};
use crate::raw::parse_hex_command;
use bytes::{BufMut, BytesMut};
use doorlock_core::{DeviceId, LockCommand, Result, constants::*};

/// Build a legacy 4-byte open/close command.
///
/// # Examples
///
/// ```
/// use doorlock_core::LockCommand;
/// use doorlock_protocol::build_legacy_frame;
///
/// assert_eq!(build_legacy_frame(LockCommand::Open, true).as_bytes(), &[0x01, 0, 0, 0, 0x0D]);
/// assert_eq!(build_legacy_frame(LockCommand::Open, false).as_bytes(), &[0x01, 0, 0, 0]);
/// ```
pub fn build_legacy_frame(command: LockCommand, append_terminator: bool) -> CommandFrame {
    let opcode = match command {
        LockCommand::Open => LEGACY_OPEN,
        LockCommand::Close => LEGACY_CLOSE,
    };

    let mut buf = BytesMut::with_capacity(opcode.len() + 1);
    buf.put_slice(&opcode);
    if append_terminator {
        buf.put_u8(CR);
    }

    CommandFrame::new(FrameKind::Legacy(command), buf.freeze())
}

/// Build a structured open/close command.
///
/// `param` is [`PARAM_MANUAL`] for a plain open/close or
/// [`PARAM_AUTO_RECLOSE`] to have the controller re-lock after 5 seconds.
pub fn build_structured_frame(
    device_id: DeviceId,
    command: LockCommand,
    param: u8,
) -> CommandFrame {
    let command_char = match command {
        LockCommand::Open => CMD_OPEN,
        LockCommand::Close => CMD_CLOSE,
    };

    let data = [
        DLE,
        STX,
        device_id.as_u8(),
        ESC,
        command_char,
        param,
        DLE,
        ETX,
    ];

    CommandFrame::new(
        FrameKind::Structured {
            device_id,
            command,
            param,
        },
        data.to_vec(),
    )
}

/// Build a structured status query.
pub fn build_status_query_frame(device_id: DeviceId) -> CommandFrame {
    let mut buf = BytesMut::with_capacity(STATUS_QUERY_FRAME_LEN);
    buf.put_slice(&[DLE, STX, device_id.as_u8(), STATUS_QUERY_OPCODE]);
    buf.put_slice(&STATUS_QUERY_PARAMS);
    buf.put_slice(&[DLE, ETX]);

    CommandFrame::new(FrameKind::StatusQuery(device_id), buf.freeze())
}

/// Build a frame from a human supplied hex string.
///
/// # Errors
///
/// Returns `Error::MalformedInput` if the string is not valid hex of even
/// length. No bytes are produced in that case.
pub fn build_raw_frame(hex: &str) -> Result<CommandFrame> {
    let bytes = parse_hex_command(hex)?;
    Ok(CommandFrame::new(FrameKind::Raw, bytes))
}
