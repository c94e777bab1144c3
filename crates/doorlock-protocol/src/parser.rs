//! Status reply recognition.
//!
//! Firmware revisions answer a status query with different framings, and a
//! reply is not guaranteed to start at offset 0: line noise or the tail of a
//! previous reply may precede it. The parser therefore runs an ordered list
//! of [`ReplyMatcher`]s, each scanning the whole buffer, and the first
//! matcher that finds its pattern wins.
//!
//! # Known Framings
//!
//! | Framing | Bytes |
//! |---|---|
//! | SOH | `01 <c1> <c2> 10 03` |
//! | STX marker | `02 53 <id> <c1> <c2> 10 03` |

use crate::raw::encode_hex;
use doorlock_core::constants::*;
use std::fmt;
use std::sync::LazyLock;

static DEFAULT_PARSER: LazyLock<StatusParser> = LazyLock::new(StatusParser::default);

/// Framing a status reply was recognized in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReplyFraming {
    Soh,
    StxMarker,
    /// Framing added through [`StatusParser::with_matcher`].
    Custom(&'static str),
}

impl fmt::Display for ReplyFraming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyFraming::Soh => write!(f, "soh"),
            ReplyFraming::StxMarker => write!(f, "stx-marker"),
            ReplyFraming::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// A status code located inside a reply buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMatch {
    pub framing: ReplyFraming,
    /// Offset of the first byte of the matched pattern.
    pub offset: usize,
    /// Two character status code.
    pub code: String,
    /// Device address echoed by the reply, for framings that carry one.
    pub device: Option<u8>,
}

/// Result of [`parse_status_response`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedStatus {
    Matched(StatusMatch),
    /// No matcher recognized the bytes; the reply is kept as lowercase hex.
    Unparsed { raw_hex: String },
}

impl ParsedStatus {
    /// The decoded status code, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            ParsedStatus::Matched(m) => Some(&m.code),
            ParsedStatus::Unparsed { .. } => None,
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, ParsedStatus::Matched(_))
    }
}

/// Recognizes one status reply framing.
///
/// Implementors only describe what a match looks like at a given offset;
/// the left-to-right scan is provided by [`ReplyMatcher::find`].
pub trait ReplyMatcher: Send + Sync {
    fn framing(&self) -> ReplyFraming;

    /// Try to decode a status starting exactly at `offset`.
    fn match_at(&self, data: &[u8], offset: usize) -> Option<StatusMatch>;

    /// First match scanning from offset 0.
    fn find(&self, data: &[u8]) -> Option<StatusMatch> {
        (0..data.len()).find_map(|offset| self.match_at(data, offset))
    }
}

/// Two code bytes as a string, if both are ASCII.
fn ascii_code(bytes: &[u8]) -> Option<String> {
    if bytes.len() == STATUS_CODE_LEN && bytes.is_ascii() {
        Some(bytes.iter().map(|&b| b as char).collect())
    } else {
        None
    }
}

/// `SOH c1 c2 DLE ETX`
#[derive(Debug, Clone, Copy, Default)]
pub struct SohMatcher;

impl ReplyMatcher for SohMatcher {
    fn framing(&self) -> ReplyFraming {
        ReplyFraming::Soh
    }

    fn match_at(&self, data: &[u8], i: usize) -> Option<StatusMatch> {
        if i + SOH_REPLY_LEN - 1 >= data.len() {
            return None;
        }
        if data[i] != SOH || data[i + 3] != DLE || data[i + 4] != ETX {
            return None;
        }

        Some(StatusMatch {
            framing: self.framing(),
            offset: i,
            code: ascii_code(&data[i + 1..i + 3])?,
            device: None,
        })
    }
}

/// `STX 'S' id c1 c2 DLE ETX`
///
/// Only the leading `STX 'S'` pair is checked; the trailing envelope is not
/// required to be present at its expected position.
#[derive(Debug, Clone, Copy, Default)]
pub struct StxMarkerMatcher;

impl ReplyMatcher for StxMarkerMatcher {
    fn framing(&self) -> ReplyFraming {
        ReplyFraming::StxMarker
    }

    fn match_at(&self, data: &[u8], i: usize) -> Option<StatusMatch> {
        if i + STX_REPLY_LEN - 1 >= data.len() {
            return None;
        }
        if data[i] != STX || data[i + 1] != STATUS_MARKER {
            return None;
        }

        Some(StatusMatch {
            framing: self.framing(),
            offset: i,
            code: ascii_code(&data[i + 3..i + 5])?,
            device: Some(data[i + 2]),
        })
    }
}

/// Ordered list of reply matchers.
///
/// The default parser tries [`SohMatcher`] then [`StxMarkerMatcher`].
/// Matchers appended with [`with_matcher`](Self::with_matcher) run after the
/// existing ones, so they never change what an existing framing matches.
///
/// # Examples
///
/// ```
/// use doorlock_protocol::{ParsedStatus, StatusParser};
///
/// let parser = StatusParser::default();
/// match parser.parse(&[0xAA, 0x01, b'1', b'0', 0x10, 0x03]) {
///     ParsedStatus::Matched(m) => {
///         assert_eq!(m.code, "10");
///         assert_eq!(m.offset, 1);
///     }
///     other => panic!("unexpected {other:?}"),
/// }
/// ```
pub struct StatusParser {
    matchers: Vec<Box<dyn ReplyMatcher>>,
}

impl StatusParser {
    /// Parser with no matchers; every reply is unparsed.
    pub fn empty() -> Self {
        Self {
            matchers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_matcher(mut self, matcher: impl ReplyMatcher + 'static) -> Self {
        self.matchers.push(Box::new(matcher));
        self
    }

    /// Framings tried, in order.
    pub fn framings(&self) -> Vec<ReplyFraming> {
        self.matchers.iter().map(|m| m.framing()).collect()
    }

    pub fn parse(&self, data: &[u8]) -> ParsedStatus {
        self.matchers
            .iter()
            .find_map(|matcher| matcher.find(data))
            .map(ParsedStatus::Matched)
            .unwrap_or_else(|| ParsedStatus::Unparsed {
                raw_hex: encode_hex(data),
            })
    }
}

impl Default for StatusParser {
    fn default() -> Self {
        Self::empty()
            .with_matcher(SohMatcher)
            .with_matcher(StxMarkerMatcher)
    }
}

impl fmt::Debug for StatusParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusParser")
            .field("framings", &self.framings())
            .finish()
    }
}

/// Parse a status reply with the default matchers.
pub fn parse_status_response(data: &[u8]) -> ParsedStatus {
    DEFAULT_PARSER.parse(data)
}
