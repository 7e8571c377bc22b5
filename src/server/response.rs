//! Per-stream response writer
//!
//! Buffers the response body and flushes it as DATA frames of at most
//! [`MAX_DATA_LEN`] bytes at the stream's precedence. The control
//! frame (SYN_REPLY for served streams, SYN_STREAM for pushes) goes
//! out just before the first body frame; a response with no body at
//! all carries FIN on the control frame instead, when the frame type
//! allows it. A parseable `content-length` header bounds the body:
//! the frame that reaches the bound carries FIN and bytes written
//! past it are silently dropped.

use super::conn::Conn;
use super::stream::Stream;
use super::{Pusher, ResponseWriter, MAX_DATA_LEN};
use crate::framing::{ControlFrame, DataFrame, Frame, Version, FLAG_FIN};
use crate::http::{Headers, Request};
use bytes::Bytes;
use log::{debug, warn};
use std::io;
use std::sync::Arc;

pub(crate) struct StreamResponseWriter {
    conn: Arc<Conn>,
    stream: Arc<Stream>,
    /// Taken when the control frame is enqueued.
    ctrl_frame: Option<ControlFrame>,
    header: Headers,
    wrote_header: bool,
    ctrl_frame_written: bool,
    /// FIN has been emitted; everything further is dropped.
    finished: bool,
    buf: Vec<u8>,
    /// Parsed `content-length` value; 0 when not set.
    content_len: usize,
    /// Body bytes already emitted as DATA frames.
    written_len: usize,
}

impl StreamResponseWriter {
    pub(crate) fn new(
        conn: Arc<Conn>,
        stream: Arc<Stream>,
        ctrl_frame: ControlFrame,
    ) -> StreamResponseWriter {
        StreamResponseWriter {
            conn,
            stream,
            ctrl_frame: Some(ctrl_frame),
            header: Headers::new(),
            wrote_header: false,
            ctrl_frame_written: false,
            finished: false,
            buf: Vec::with_capacity(MAX_DATA_LEN),
            content_len: 0,
            written_len: 0,
        }
    }

    fn precedence(&self) -> u8 {
        Conn::stream_precedence(&self.stream)
    }

    fn write_ctrl_frame(&mut self) {
        if let Some(frame) = self.ctrl_frame.take() {
            self.conn
                .write_frame(Frame::Control(frame), self.precedence());
            self.ctrl_frame_written = true;
        }
    }

    /// Emit the buffer as one DATA frame. FIN is attached when asked
    /// for or when the body reaches its `content-length` bound.
    fn flush_buf(&mut self, fin: bool) {
        let len = self.buf.len();
        if len == 0 && fin {
            debug!("empty FIN DATA frame on stream #{}", self.stream.id());
        }
        let new_written = self.written_len + len;
        let reached_bound = self.content_len > 0 && new_written == self.content_len;
        let mut frame = match DataFrame::new(self.stream.id(), Bytes::copy_from_slice(&self.buf)) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("DATA frame for stream #{}: {}", self.stream.id(), e);
                return;
            }
        };
        if fin || reached_bound {
            let _ = frame.set_flags(FLAG_FIN);
        }
        self.conn.write_frame(Frame::Data(frame), self.precedence());
        self.written_len = new_written;
        if reached_bound {
            self.finished = true;
        }
    }

    /// Flush whatever remains when the handler is done. Invoked once
    /// by the engine after the handler returns.
    pub(crate) fn finish(&mut self) {
        if self.finished {
            return;
        }
        if !self.ctrl_frame_written {
            // No body was ever written. SYN_REPLY can carry the FIN
            // itself; a push SYN_STREAM cannot, so a bodyless push
            // produces no frames at all.
            let can_fin = self
                .ctrl_frame
                .as_ref()
                .map(ControlFrame::can_set_flags)
                .unwrap_or(false);
            if !can_fin {
                warn!("push stream #{} has no response body", self.stream.id());
                self.finished = true;
                return;
            }
            if !self.wrote_header {
                self.write_header(200);
            }
            if let Some(frame) = self.ctrl_frame.as_mut() {
                let _ = frame.set_flags(FLAG_FIN);
            }
            self.write_ctrl_frame();
        } else if self.content_len == 0 || !self.buf.is_empty() {
            self.flush_buf(true);
            self.buf.clear();
        }
        self.finished = true;
    }
}

impl ResponseWriter for StreamResponseWriter {
    fn headers_mut(&mut self) -> &mut Headers {
        &mut self.header
    }

    fn write_header(&mut self, status: u16) {
        if self.wrote_header {
            return;
        }
        let (status_name, version_name) = match self.conn.version() {
            Version::V2 => ("status", "version"),
            Version::V3 => (":status", ":version"),
        };
        let block = match self.ctrl_frame.as_mut().and_then(ControlFrame::headers_mut) {
            Some(block) => block,
            None => return,
        };
        let _ = block.add(status_name, &status.to_string());
        let _ = block.add(version_name, "HTTP/1.1");

        let mut content_len = 0usize;
        // The header map stores names lowercased already.
        for (name, value) in self.header.iter() {
            match name {
                // Hop-by-hop headers make no sense on a framed stream.
                "connection" | "keep-alive" | "transfer-encoding" => continue,
                "proxy-connection" if self.conn.version() == Version::V3 => continue,
                "content-length" => {
                    if content_len == 0 {
                        if let Ok(n) = value.parse::<usize>() {
                            content_len = n;
                        }
                    }
                }
                _ => {}
            }
            let _ = block.add(name, value);
        }
        self.content_len = content_len;
        self.wrote_header = true;
    }

    fn write(&mut self, p: &[u8]) -> io::Result<usize> {
        if self.finished {
            // The content-length bound has been reached; the extra
            // bytes are dropped.
            return Ok(p.len());
        }
        if !self.wrote_header {
            self.write_header(200);
        }
        if !self.ctrl_frame_written {
            self.write_ctrl_frame();
        }

        let mut remaining = p;
        if self.content_len > 0 {
            let room = self.content_len - self.written_len - self.buf.len();
            if remaining.len() > room {
                remaining = &remaining[..room];
            }
        }
        loop {
            let available = MAX_DATA_LEN - self.buf.len();
            if remaining.len() < available {
                self.buf.extend_from_slice(remaining);
                break;
            }
            self.buf.extend_from_slice(&remaining[..available]);
            self.flush_buf(false);
            self.buf.clear();
            remaining = &remaining[available..];
        }
        if !self.finished
            && self.content_len > 0
            && self.written_len + self.buf.len() == self.content_len
        {
            self.flush_buf(false); // FIN rides on the bound
            self.buf.clear();
        }
        Ok(p.len())
    }

    fn pusher(&mut self) -> Option<&mut dyn Pusher> {
        Some(self)
    }
}

impl Pusher for StreamResponseWriter {
    fn push(&mut self, target: &str, original: &Request) -> super::Result<()> {
        self.conn.push(&self.stream, target, original)
    }
}
