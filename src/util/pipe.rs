//! Bounded in-memory byte pipe
//!
//! Carries a stream's inbound body from the connection's reader loop
//! to the handler. The write end is fed from decoded DATA frames; the
//! read end is exposed to the handler as the request body. Closing
//! the write end yields EOF to the reader; writing after the read end
//! closed fails with `BrokenPipe`, which the reader loop treats as
//! "handler stopped caring" and discards quietly.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Condvar, Mutex};

struct Inner {
    buf: VecDeque<u8>,
    capacity: usize,
    write_closed: bool,
    read_closed: bool,
}

struct Shared {
    inner: Mutex<Inner>,
    readable: Condvar,
    writable: Condvar,
}

/// Create a pipe buffering at most `capacity` bytes.
pub fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let shared = Arc::new(Shared {
        inner: Mutex::new(Inner {
            buf: VecDeque::new(),
            capacity: capacity.max(1),
            write_closed: false,
            read_closed: false,
        }),
        readable: Condvar::new(),
        writable: Condvar::new(),
    });
    (
        PipeWriter {
            shared: shared.clone(),
        },
        PipeReader { shared },
    )
}

/// Write end of a body pipe.
pub struct PipeWriter {
    shared: Arc<Shared>,
}

impl PipeWriter {
    /// Close the write end; the reader sees EOF after draining.
    pub fn close(&self) {
        let mut inner = self.shared.inner.lock().expect("pipe lock poisoned");
        inner.write_closed = true;
        self.shared.readable.notify_all();
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut inner = self.shared.inner.lock().expect("pipe lock poisoned");
        loop {
            if inner.read_closed {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "read end of body pipe closed",
                ));
            }
            if inner.write_closed {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "write end of body pipe closed",
                ));
            }
            let room = inner.capacity - inner.buf.len();
            if room > 0 {
                let n = room.min(buf.len());
                inner.buf.extend(&buf[..n]);
                self.shared.readable.notify_all();
                return Ok(n);
            }
            inner = self
                .shared
                .writable
                .wait(inner)
                .expect("pipe lock poisoned");
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        self.close();
    }
}

/// Read end of a body pipe.
pub struct PipeReader {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for PipeReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeReader").finish_non_exhaustive()
    }
}

impl PipeReader {
    /// Close the read end; further writes fail with `BrokenPipe`.
    pub fn close(&self) {
        let mut inner = self.shared.inner.lock().expect("pipe lock poisoned");
        inner.read_closed = true;
        inner.buf.clear();
        self.shared.writable.notify_all();
        self.shared.readable.notify_all();
    }
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut inner = self.shared.inner.lock().expect("pipe lock poisoned");
        loop {
            if inner.read_closed {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "read end of body pipe closed",
                ));
            }
            if !inner.buf.is_empty() {
                let n = buf.len().min(inner.buf.len());
                for (i, byte) in inner.buf.drain(..n).enumerate() {
                    buf[i] = byte;
                }
                self.shared.writable.notify_all();
                return Ok(n);
            }
            if inner.write_closed {
                return Ok(0);
            }
            inner = self
                .shared
                .readable
                .wait(inner)
                .expect("pipe lock poisoned");
        }
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        self.close();
    }
}
