//! HTTP side of the engine
//!
//! The request record handed to user handlers, the header multimap it
//! carries, and the adaptation between SPDY header blocks and
//! conventional requests.

pub mod headers;
pub mod request;

pub use headers::Headers;
pub use request::{request_from_stream, Request};

/// Result type for HTTP adaptation.
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP adaptation errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("missing {0} header")]
    MissingHeader(&'static str),

    #[error("duplicated {0} header")]
    DuplicatedHeader(&'static str),

    #[error("invalid {header} header: {reason}")]
    InvalidHeader {
        header: &'static str,
        reason: String,
    },

    #[error("unsupported protocol version")]
    UnsupportedVersion,
}
