//! SPDY connection engine
//!
//! The server side of a negotiated SPDY connection: three cooperating
//! loops (frame reader, frame writer, stream dispatcher), the
//! live-stream registry, the per-stream response writer, and the
//! server-push primitive. The outer TLS listener hands the split byte
//! stream of an accepted connection to [`serve_v2`] or [`serve_v3`]
//! depending on the negotiated ALPN/NPN token.

mod conn;
mod response;
pub mod stream;

pub use stream::Stream;

use crate::framing::{self, Version};
use crate::http::{self, Headers, Request};
use std::io::{Read, Write};
use std::sync::Arc;

/// ALPN/NPN token for SPDY version 2.
pub const ALPN_SPDY2: &str = "spdy/2";
/// ALPN/NPN token for SPDY version 3.
pub const ALPN_SPDY3: &str = "spdy/3";

/// Largest body chunk carried by one DATA frame.
pub const MAX_DATA_LEN: usize = 10240;

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Server-side errors surfaced to handlers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("framing error: {0}")]
    Framing(#[from] framing::Error),

    #[error("request error: {0}")]
    Http(#[from] http::Error),
}

/// Tuning knobs for a served connection.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Capacity of the stream dispatch queue.
    pub dispatch_capacity: usize,
    /// Capacity of the frame egress queue. Handlers writing faster
    /// than the socket drains block here; this bound is the
    /// per-connection memory ceiling.
    pub egress_capacity: usize,
    /// Capacity of each stream's request body pipe.
    pub body_pipe_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            dispatch_capacity: 100,
            egress_capacity: 100,
            body_pipe_capacity: 64 * 1024,
        }
    }
}

/// A user-supplied request handler.
pub trait Handler: Send + Sync {
    fn serve(&self, w: &mut dyn ResponseWriter, req: &mut Request);
}

impl<F> Handler for F
where
    F: Fn(&mut dyn ResponseWriter, &mut Request) + Send + Sync,
{
    fn serve(&self, w: &mut dyn ResponseWriter, req: &mut Request) {
        self(w, req)
    }
}

/// The response side of one served stream.
pub trait ResponseWriter {
    /// The mutable response header map. Mutations after the first
    /// `write` or `write_header` call have no effect on the wire.
    fn headers_mut(&mut self) -> &mut Headers;

    /// Record the status line and headers. Idempotent; invoked with
    /// status 200 by the first `write` if not called explicitly.
    fn write_header(&mut self, status: u16);

    /// Append body bytes, chunked into DATA frames of at most
    /// [`MAX_DATA_LEN`] bytes.
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize>;

    /// Access to server push for writers that support it.
    fn pusher(&mut self) -> Option<&mut dyn Pusher> {
        None
    }
}

/// Server-push capability of a response writer.
pub trait Pusher {
    /// Push the response for `target` (a rooted path or absolute URL)
    /// to the client, associated with the stream of `original`.
    fn push(&mut self, target: &str, original: &Request) -> Result<()>;
}

/// Serve one SPDY/2 connection; returns when the connection is done.
///
/// `reader` and `writer` are the two halves of the negotiated byte
/// stream (for a `TcpStream`, a `try_clone` pair).
pub fn serve_v2<R, W>(config: &ServerConfig, reader: R, writer: W, handler: Arc<dyn Handler>)
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    conn::Conn::serve(Version::V2, config, reader, writer, handler);
}

/// Serve one SPDY/3 connection; returns when the connection is done.
pub fn serve_v3<R, W>(config: &ServerConfig, reader: R, writer: W, handler: Arc<dyn Handler>)
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    conn::Conn::serve(Version::V3, config, reader, writer, handler);
}
