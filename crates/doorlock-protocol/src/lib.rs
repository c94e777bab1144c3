pub mod builder;
pub mod frame;
pub mod parser;
pub mod raw;
pub mod status;

pub use builder::{
    build_legacy_frame, build_raw_frame, build_status_query_frame, build_structured_frame,
};
pub use frame::{CommandFrame, FrameKind};
pub use parser::{
    ParsedStatus, ReplyFraming, ReplyMatcher, SohMatcher, StatusMatch, StatusParser,
    StxMarkerMatcher, parse_status_response,
};
pub use raw::{encode_hex, format_hex, parse_hex_command};
pub use status::{lock_status_for_code, status_from_reply};
