//! SPDY wire framing
//!
//! Everything between raw bytes and typed frames: the bit-level
//! reader/writer, the schema-driven record codec with per-connection
//! dictionary compression, the header-block and setting-entry
//! containers, and the control/data frame definitions for protocol
//! versions 2 and 3.

pub mod bits;
pub mod dict;
pub mod fields;
pub mod frame;
pub mod frames_v2;
pub mod frames_v3;
pub mod header_block;
pub mod settings;

pub use dict::{select_dictionary, DICTIONARY_V2, DICTIONARY_V3};
pub use fields::{Decoder, Encoder};
pub use frame::{ControlFrame, DataFrame, Frame};
pub use header_block::HeaderBlock;
pub use settings::{SettingEntries, SettingId};

use std::fmt;

/// Result type for framing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Framing errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid bit count: {0}")]
    InvalidBitCount(u32),

    #[error("read or write past the record's byte limit")]
    LimitExceeded,

    #[error("stream is not byte-aligned")]
    NotByteAligned,

    #[error("invalid record schema: {msg}")]
    InvalidSchema { msg: String },

    #[error("values do not match schema of {record}")]
    SchemaMismatch { record: &'static str },

    #[error("header block compression error: {0}")]
    Compression(String),

    #[error("string field is not valid UTF-8")]
    InvalidStringEncoding,

    #[error("unsupported protocol version")]
    UnsupportedVersion,

    #[error("invalid control frame type")]
    InvalidControlFrameType,

    #[error("invalid flags")]
    InvalidFlags,

    #[error("invalid stream ID")]
    InvalidStreamId,

    #[error("invalid priority")]
    InvalidPriority,

    #[error("invalid status code")]
    InvalidStatusCode,

    #[error("invalid setting ID: {0}")]
    InvalidSettingId(u32),

    #[error("invalid setting flags: {0:#x}")]
    InvalidSettingFlags(u8),

    #[error("invalid delta window size: {0}")]
    InvalidDeltaWindowSize(u32),

    #[error("invalid header name")]
    InvalidHeaderName,

    #[error("DATA frame payload shorter than its declared length")]
    ShortDataFrame,
}

/// Protocol version of a connection or frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Version {
    V2 = 2,
    V3 = 3,
}

impl Version {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn from_u16(v: u16) -> Option<Version> {
        match v {
            2 => Some(Version::V2),
            3 => Some(Version::V3),
            _ => None,
        }
    }

    /// Highest valid stream priority for this version.
    pub fn max_priority(self) -> u8 {
        match self {
            Version::V2 => MAX_PRIORITY_V2,
            Version::V3 => MAX_PRIORITY_V3,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "spdy/{}", self.as_u16())
    }
}

/// Control frame types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FrameType {
    /// SYN_STREAM (1) - opens a stream, carrying request headers
    SynStream = 1,
    /// SYN_REPLY (2) - first response frame on a stream
    SynReply = 2,
    /// RST_STREAM (3) - terminates a single stream
    RstStream = 3,
    /// SETTINGS (4) - connection configuration values
    Settings = 4,
    /// NOOP (5) - no operation, version 2 only
    Noop = 5,
    /// PING (6) - round-trip measurement, echoed by the receiver
    Ping = 6,
    /// GOAWAY (7) - announces connection shutdown
    Goaway = 7,
    /// HEADERS (8) - additional headers for an open stream
    Headers = 8,
    /// WINDOW_UPDATE (9) - flow control, version 3 only
    WindowUpdate = 9,
}

impl FrameType {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn from_u16(t: u16) -> Option<FrameType> {
        match t {
            1 => Some(FrameType::SynStream),
            2 => Some(FrameType::SynReply),
            3 => Some(FrameType::RstStream),
            4 => Some(FrameType::Settings),
            5 => Some(FrameType::Noop),
            6 => Some(FrameType::Ping),
            7 => Some(FrameType::Goaway),
            8 => Some(FrameType::Headers),
            9 => Some(FrameType::WindowUpdate),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FrameType::SynStream => "SYN_STREAM",
            FrameType::SynReply => "SYN_REPLY",
            FrameType::RstStream => "RST_STREAM",
            FrameType::Settings => "SETTINGS",
            FrameType::Noop => "NOOP",
            FrameType::Ping => "PING",
            FrameType::Goaway => "GOAWAY",
            FrameType::Headers => "HEADERS",
            FrameType::WindowUpdate => "WINDOW_UPDATE",
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_u16())
    }
}

// Frame flags.

/// No flags.
pub const FLAG_NONE: u8 = 0;
/// FLAG_FIN (0x01) - this frame half-closes the sender's direction.
pub const FLAG_FIN: u8 = 0x01;
/// FLAG_UNIDIRECTIONAL (0x02) - the stream carries no peer responses.
pub const FLAG_UNIDIRECTIONAL: u8 = 0x02;
/// SETTINGS frame flag: clear previously persisted settings.
pub const FLAG_SETTINGS_CLEAR_SETTINGS: u8 = 0x01;
/// Setting entry flag: ask the peer to persist the value.
pub const FLAG_SETTINGS_PERSIST_VALUE: u8 = 0x01;
/// Setting entry flag: the value was previously persisted.
pub const FLAG_SETTINGS_PERSISTED: u8 = 0x02;

/// RST_STREAM status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum StatusCode {
    ProtocolError = 1,
    InvalidStream = 2,
    RefusedStream = 3,
    UnsupportedVersion = 4,
    Cancel = 5,
    InternalError = 6,
    FlowControlError = 7,
    StreamInUse = 8,
    StreamAlreadyClosed = 9,
    InvalidCredentials = 10,
    FrameTooLarge = 11,
}

impl StatusCode {
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn from_u32(code: u32) -> Option<StatusCode> {
        match code {
            1 => Some(StatusCode::ProtocolError),
            2 => Some(StatusCode::InvalidStream),
            3 => Some(StatusCode::RefusedStream),
            4 => Some(StatusCode::UnsupportedVersion),
            5 => Some(StatusCode::Cancel),
            6 => Some(StatusCode::InternalError),
            7 => Some(StatusCode::FlowControlError),
            8 => Some(StatusCode::StreamInUse),
            9 => Some(StatusCode::StreamAlreadyClosed),
            10 => Some(StatusCode::InvalidCredentials),
            11 => Some(StatusCode::FrameTooLarge),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StatusCode::ProtocolError => "PROTOCOL_ERROR",
            StatusCode::InvalidStream => "INVALID_STREAM",
            StatusCode::RefusedStream => "REFUSED_STREAM",
            StatusCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            StatusCode::Cancel => "CANCEL",
            StatusCode::InternalError => "INTERNAL_ERROR",
            StatusCode::FlowControlError => "FLOW_CONTROL_ERROR",
            StatusCode::StreamInUse => "STREAM_IN_USE",
            StatusCode::StreamAlreadyClosed => "STREAM_ALREADY_CLOSED",
            StatusCode::InvalidCredentials => "INVALID_CREDENTIALS",
            StatusCode::FrameTooLarge => "FRAME_TOO_LARGE",
        }
    }

    /// The code for "stream already in use"; version 2 predates
    /// STREAM_IN_USE and degrades to PROTOCOL_ERROR.
    pub fn stream_in_use(version: Version) -> StatusCode {
        match version {
            Version::V2 => StatusCode::ProtocolError,
            Version::V3 => StatusCode::StreamInUse,
        }
    }

    /// The code for "stream already closed"; version 2 predates
    /// STREAM_ALREADY_CLOSED and degrades to INVALID_STREAM.
    pub fn stream_already_closed(version: Version) -> StatusCode {
        match version {
            Version::V2 => StatusCode::InvalidStream,
            Version::V3 => StatusCode::StreamAlreadyClosed,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_u32())
    }
}

/// GOAWAY status codes, version 3 only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum GoAwayStatus {
    Ok = 0,
    ProtocolError = 1,
    InternalError = 2,
}

impl GoAwayStatus {
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn from_u32(code: u32) -> Option<GoAwayStatus> {
        match code {
            0 => Some(GoAwayStatus::Ok),
            1 => Some(GoAwayStatus::ProtocolError),
            2 => Some(GoAwayStatus::InternalError),
            _ => None,
        }
    }
}

/// Lowest numeric (most urgent) stream priority.
pub const MIN_PRIORITY: u8 = 0;
/// Highest numeric (least urgent) stream priority on version 2.
pub const MAX_PRIORITY_V2: u8 = 3;
/// Highest numeric (least urgent) stream priority on version 3.
pub const MAX_PRIORITY_V3: u8 = 7;

/// Highest accepted stream id.
pub const MAX_STREAM_ID: u32 = 0x8FFF_FFFF;

/// Smallest valid WINDOW_UPDATE delta.
pub const MIN_DELTA_WINDOW_SIZE: u32 = 1;
/// Largest valid WINDOW_UPDATE delta (2^31 - 1).
pub const MAX_DELTA_WINDOW_SIZE: u32 = 0x7FFF_FFFF;
