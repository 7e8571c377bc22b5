//! Per-stream state and the live-stream registry
//!
//! A stream is registered when a SYN_STREAM is accepted (or a push is
//! initiated) and lives until both directions are half-closed. The
//! half-close flags only move from false to true; the transition that
//! closes the second direction removes the stream from the registry
//! under the same lock, so a fully closed stream is never observable
//! in the registry.

use crate::framing::HeaderBlock;
use crate::util::pipe::{PipeReader, PipeWriter};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

#[derive(Default)]
struct CloseState {
    peer_half_closed: bool,
    half_closed: bool,
}

/// One SPDY stream.
pub struct Stream {
    id: u32,
    priority: u8,
    /// SYN_STREAM headers; `None` for server-pushed streams.
    headers: Option<HeaderBlock>,
    close: RwLock<CloseState>,
    /// Write end of the body pipe, fed by inbound DATA frames.
    body_writer: Mutex<Option<PipeWriter>>,
    /// Read end of the body pipe, handed to the request.
    body_reader: Mutex<Option<PipeReader>>,
}

impl Stream {
    /// A client-initiated stream accepted from a SYN_STREAM.
    pub(crate) fn new_client(
        id: u32,
        priority: u8,
        headers: HeaderBlock,
        peer_half_closed: bool,
        half_closed: bool,
        body: Option<(PipeWriter, PipeReader)>,
    ) -> Stream {
        let (body_writer, body_reader) = match body {
            Some((w, r)) => (Some(w), Some(r)),
            None => (None, None),
        };
        Stream {
            id,
            priority,
            headers: Some(headers),
            close: RwLock::new(CloseState {
                peer_half_closed,
                half_closed,
            }),
            body_writer: Mutex::new(body_writer),
            body_reader: Mutex::new(body_reader),
        }
    }

    /// A server-pushed stream; unidirectional, so it is born with the
    /// peer's direction closed.
    pub(crate) fn new_pushed(id: u32, priority: u8) -> Stream {
        Stream {
            id,
            priority,
            headers: None,
            close: RwLock::new(CloseState {
                peer_half_closed: true,
                half_closed: false,
            }),
            body_writer: Mutex::new(None),
            body_reader: Mutex::new(None),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn headers(&self) -> Option<&HeaderBlock> {
        self.headers.as_ref()
    }

    pub fn peer_half_closed(&self) -> bool {
        self.close.read().expect("close lock poisoned").peer_half_closed
    }

    pub fn half_closed(&self) -> bool {
        self.close.read().expect("close lock poisoned").half_closed
    }

    /// Mark the peer's direction closed. Idempotent; removes the
    /// stream from the registry once both directions are closed.
    pub(crate) fn peer_half_close(&self, registry: &StreamRegistry) {
        let mut close = self.close.write().expect("close lock poisoned");
        if close.peer_half_closed {
            return;
        }
        close.peer_half_closed = true;
        if close.half_closed {
            registry.remove(self.id);
        }
    }

    /// Mark the local direction closed. Idempotent; removes the
    /// stream from the registry once both directions are closed.
    pub(crate) fn half_close(&self, registry: &StreamRegistry) {
        let mut close = self.close.write().expect("close lock poisoned");
        if close.half_closed {
            return;
        }
        close.half_closed = true;
        if close.peer_half_closed {
            registry.remove(self.id);
        }
    }

    /// Feed inbound body bytes into the pipe.
    pub(crate) fn write_body(&self, data: &[u8]) -> std::io::Result<()> {
        use std::io::Write;
        let mut guard = self.body_writer.lock().expect("body lock poisoned");
        match guard.as_mut() {
            Some(writer) => writer.write_all(data),
            None => Ok(()),
        }
    }

    /// Close the write end of the body pipe (EOF for the handler).
    pub(crate) fn close_body_writer(&self) {
        if let Some(writer) = self
            .body_writer
            .lock()
            .expect("body lock poisoned")
            .take()
        {
            writer.close();
        }
    }

    /// Hand the read end of the body pipe to the request. Returns
    /// `None` after the first call or when the stream has no body.
    pub(crate) fn take_body_reader(&self) -> Option<PipeReader> {
        self.body_reader.lock().expect("body lock poisoned").take()
    }

    /// Tear down both pipe ends (RST_STREAM or connection shutdown).
    pub(crate) fn close_body(&self) {
        self.close_body_writer();
        if let Some(reader) = self
            .body_reader
            .lock()
            .expect("body lock poisoned")
            .take()
        {
            reader.close();
        }
    }
}

/// The connection's set of live streams.
#[derive(Default)]
pub(crate) struct StreamRegistry {
    streams: RwLock<HashMap<u32, Arc<Stream>>>,
}

impl StreamRegistry {
    pub fn new() -> StreamRegistry {
        StreamRegistry::default()
    }

    pub fn get(&self, id: u32) -> Option<Arc<Stream>> {
        self.streams
            .read()
            .expect("registry lock poisoned")
            .get(&id)
            .cloned()
    }

    pub fn add(&self, stream: Arc<Stream>) {
        self.streams
            .write()
            .expect("registry lock poisoned")
            .insert(stream.id(), stream);
    }

    pub fn remove(&self, id: u32) {
        self.streams
            .write()
            .expect("registry lock poisoned")
            .remove(&id);
    }

    #[cfg(test)]
    pub fn contains(&self, id: u32) -> bool {
        self.streams
            .read()
            .expect("registry lock poisoned")
            .contains_key(&id)
    }
}
