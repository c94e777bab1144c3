//! Hex helpers for raw commands and reply diagnostics.
//!
//! Raw commands are typed by people experimenting with the protocol, so the
//! parser accepts the usual separators (`01 00 00 00`, `0x10,0x02`,
//! `10:02:01`) before decoding.

use doorlock_core::{Error, Result};

/// Characters removed from a raw command before decoding.
const SEPARATORS: [char; 4] = [',', ':', '-', ';'];

/// Parse a human supplied hex string into command bytes.
///
/// Whitespace, `,`, `:`, `-`, `;` and `0x`/`0X` prefixes are stripped before
/// decoding. The bytes are returned unmodified; no terminator is appended.
///
/// # Errors
///
/// Returns `Error::MalformedInput` if the cleaned string is empty, has an odd
/// number of digits, or contains a non-hex character.
///
/// # Examples
///
/// ```
/// use doorlock_protocol::parse_hex_command;
///
/// assert_eq!(parse_hex_command("01 00 00 00 0D").unwrap(), vec![0x01, 0, 0, 0, 0x0D]);
/// assert_eq!(parse_hex_command("0x10,0x02").unwrap(), vec![0x10, 0x02]);
/// assert!(parse_hex_command("ZZ").is_err());
/// ```
pub fn parse_hex_command(input: &str) -> Result<Vec<u8>> {
    let cleaned: String = input
        .replace("0x", "")
        .replace("0X", "")
        .chars()
        .filter(|c| !c.is_whitespace() && !SEPARATORS.contains(c))
        .collect();

    if cleaned.is_empty() {
        return Err(Error::malformed("hex command is empty"));
    }

    hex::decode(&cleaned).map_err(|e| match e {
        hex::FromHexError::OddLength => Error::malformed(format!(
            "hex command has an odd number of digits ({})",
            cleaned.len()
        )),
        hex::FromHexError::InvalidHexCharacter { c, index } => {
            Error::malformed(format!("invalid hex character '{c}' at position {index}"))
        }
        other => Error::malformed(other.to_string()),
    })
}

/// Encode bytes as contiguous lowercase hex.
///
/// This is the form kept in `LockStatus::raw_hex`; it decodes back with
/// [`parse_hex_command`].
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Format bytes as spaced uppercase hex for logs (`10 02 01 1C`).
pub fn format_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("01 00 00 00", vec![0x01, 0x00, 0x00, 0x00])]
    #[case("010000000D", vec![0x01, 0x00, 0x00, 0x00, 0x0D])]
    #[case("0x10 0x02 0x01", vec![0x10, 0x02, 0x01])]
    #[case("10,02,01", vec![0x10, 0x02, 0x01])]
    #[case("10:02-1b", vec![0x10, 0x02, 0x1B])]
    #[case("  ff\t00\n", vec![0xFF, 0x00])]
    fn test_parse_hex_command_valid(#[case] input: &str, #[case] expected: Vec<u8>) {
        assert_eq!(parse_hex_command(input).unwrap(), expected);
    }

    #[rstest]
    #[case("ZZ")]
    #[case("0")]
    #[case("010")]
    #[case("")]
    #[case("   ")]
    #[case("01 G0")]
    fn test_parse_hex_command_malformed(#[case] input: &str) {
        assert!(matches!(
            parse_hex_command(input),
            Err(Error::MalformedInput(_))
        ));
    }

    #[test]
    fn test_malformed_messages() {
        let odd = parse_hex_command("123").unwrap_err().to_string();
        assert!(odd.contains("odd number of digits"), "{odd}");

        let invalid = parse_hex_command("0Z").unwrap_err().to_string();
        assert!(invalid.contains("'Z'"), "{invalid}");
    }

    #[test]
    fn test_encode_and_format() {
        let bytes = [0x10, 0x02, 0x01, 0x1C, 0xFF];
        assert_eq!(encode_hex(&bytes), "1002011cff");
        assert_eq!(format_hex(&bytes), "10 02 01 1C FF");
        assert_eq!(format_hex(&[]), "");
    }

    #[test]
    fn test_encoded_hex_decodes_back() {
        let bytes = [0x00, 0x7F, 0x80, 0xFF];
        assert_eq!(parse_hex_command(&encode_hex(&bytes)).unwrap(), bytes);
    }
}
