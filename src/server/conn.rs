//! Connection engine
//!
//! Serving a connection runs three cooperating loops. The reader
//! decodes frames and routes them: new streams onto the dispatch
//! queue, body bytes into stream pipes, PING echoes and RST/GOAWAY
//! traffic onto the egress queue. The dispatcher pops streams and
//! runs the user handler on a worker thread per stream. The writer
//! pops `(precedence, sequence, frame)` entries and puts them on the
//! wire. Shutdown of any loop propagates to the others through a
//! sentinel entry on each queue.
//!
//! Frames belonging to more urgent streams (lower wire priority) are
//! emitted first; engine-administrative frames (PING echo, RST_STREAM,
//! GOAWAY) outrank all stream traffic. Ties are FIFO by an enqueue
//! sequence number.

use super::response::StreamResponseWriter;
use super::stream::{Stream, StreamRegistry};
use super::{Handler, ServerConfig};
use crate::framing::frame::{ControlV2, ControlV3};
use crate::framing::frames_v2::RstStreamV2;
use crate::framing::frames_v3::RstStreamV3;
use crate::framing::{
    select_dictionary, ControlFrame, Decoder, Encoder, Frame, GoAwayStatus, SettingEntries,
    StatusCode, Version, FLAG_FIN, FLAG_UNIDIRECTIONAL, MAX_PRIORITY_V3,
};
use crate::http::request::{fill_push_headers, parse_push_target};
use crate::http::{request_from_stream, Request};
use crate::util::pipe;
use crate::util::queue::{BlockingPriorityQueue, Precedence};
use log::{debug, error, info, warn};
use std::io::{BufReader, BufWriter, Read, Write};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

/// Egress precedence of engine-administrative frames.
const FRAME_PRECEDENCE_MAX: u8 = 0xFF;

/// Map a stream's wire priority (lower = more urgent) onto the egress
/// precedence byte (higher = emitted first).
fn egress_precedence(priority: u8) -> u8 {
    MAX_PRIORITY_V3.saturating_sub(priority)
}

/// Dispatch queue entry; `None` is the shutdown sentinel.
pub(crate) struct QueuedStream(pub(crate) Option<Arc<Stream>>);

impl QueuedStream {
    fn shutdown() -> QueuedStream {
        QueuedStream(None)
    }
}

impl Precedence for QueuedStream {
    fn takes_precedence_over(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => {
                if a.priority() == b.priority() {
                    a.id() < b.id()
                } else {
                    a.priority() < b.priority()
                }
            }
            // The sentinel drains only after every queued stream.
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

/// Egress queue entry; a `None` frame is the shutdown sentinel.
pub(crate) struct QueuedFrame {
    precedence: u8,
    seq: u32,
    frame: Option<Frame>,
}

impl QueuedFrame {
    fn shutdown() -> QueuedFrame {
        QueuedFrame {
            precedence: 0,
            seq: 0,
            frame: None,
        }
    }
}

impl Precedence for QueuedFrame {
    fn takes_precedence_over(&self, other: &Self) -> bool {
        match (&self.frame, &other.frame) {
            (Some(_), Some(_)) => {
                if self.precedence == other.precedence {
                    self.seq < other.seq
                } else {
                    self.precedence > other.precedence
                }
            }
            // Already queued frames go out before the sentinel.
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

/// How the reader loop handled a control frame.
enum Handled {
    Continue,
    GoAwayReceived,
    Protocol(String),
}

/// Why the reader loop stopped.
enum ReadExit {
    GoAway,
    Network(crate::framing::Error),
    Protocol(String),
}

/// Per-connection engine state shared by the three loops.
pub(crate) struct Conn {
    version: Version,
    handler: Arc<dyn Handler>,
    streams: StreamRegistry,
    dispatch: BlockingPriorityQueue<QueuedStream>,
    egress: BlockingPriorityQueue<QueuedFrame>,
    /// FIFO tie-breaker among frames of equal precedence.
    write_seq: Mutex<u32>,
    last_good_stream_id: AtomicU32,
    /// Even id allocator for pushed streams, per connection.
    next_push_stream_id: Mutex<u32>,
    received_settings: Mutex<Option<SettingEntries>>,
    body_pipe_capacity: usize,
}

impl Conn {
    fn new(version: Version, config: &ServerConfig, handler: Arc<dyn Handler>) -> Arc<Conn> {
        Arc::new(Conn {
            version,
            handler,
            streams: StreamRegistry::new(),
            dispatch: BlockingPriorityQueue::new(config.dispatch_capacity),
            egress: BlockingPriorityQueue::new(config.egress_capacity),
            write_seq: Mutex::new(0),
            last_good_stream_id: AtomicU32::new(0),
            next_push_stream_id: Mutex::new(0),
            received_settings: Mutex::new(None),
            body_pipe_capacity: config.body_pipe_capacity,
        })
    }

    /// Serve one connection to completion.
    pub(crate) fn serve<R, W>(
        version: Version,
        config: &ServerConfig,
        reader: R,
        writer: W,
        handler: Arc<dyn Handler>,
    ) where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let dict = select_dictionary(version);
        let mut decoder = Decoder::new(BufReader::new(reader));
        decoder.set_zlib_dict(dict);
        let mut encoder = Encoder::new(BufWriter::new(writer));
        encoder.set_zlib_dict(dict);

        let conn = Conn::new(version, config, handler);
        info!("{} connection open", version);

        let write_handle = {
            let conn = conn.clone();
            thread::spawn(move || conn.write_loop(&mut encoder))
        };
        let read_handle = {
            let conn = conn.clone();
            thread::spawn(move || conn.read_loop(&mut decoder))
        };
        let dispatch_handle = {
            let conn = conn.clone();
            thread::spawn(move || conn.dispatch_loop())
        };

        let _ = read_handle.join();
        let _ = dispatch_handle.join();
        let _ = write_handle.join();
        info!("{} connection closed", version);
    }

    fn last_good(&self) -> u32 {
        self.last_good_stream_id.load(Ordering::SeqCst)
    }

    fn next_push_id(&self) -> u32 {
        let mut id = self
            .next_push_stream_id
            .lock()
            .expect("push id lock poisoned");
        *id += 2;
        *id
    }

    fn next_seq(&self) -> u32 {
        let mut seq = self.write_seq.lock().expect("sequence lock poisoned");
        *seq += 1;
        *seq
    }

    /// The entries of the most recently received SETTINGS frame.
    #[cfg(test)]
    fn last_settings(&self) -> Option<SettingEntries> {
        self.received_settings
            .lock()
            .expect("settings lock poisoned")
            .clone()
    }

    // Reader loop.

    fn read_loop<R: Read>(self: &Arc<Conn>, decoder: &mut Decoder<R>) {
        let exit = loop {
            match Frame::read(decoder) {
                Ok(Frame::Control(frame)) => match self.on_control(frame) {
                    Handled::Continue => {}
                    Handled::GoAwayReceived => break ReadExit::GoAway,
                    Handled::Protocol(reason) => break ReadExit::Protocol(reason),
                },
                Ok(Frame::Data(frame)) => self.on_data(frame),
                Err(crate::framing::Error::Io(e)) => {
                    break ReadExit::Network(crate::framing::Error::Io(e))
                }
                Err(e) => break ReadExit::Protocol(e.to_string()),
            }
        };
        match exit {
            ReadExit::Protocol(reason) => {
                warn!("read protocol error: {}", reason);
                let mut goaway = ControlFrame::goaway(self.version, self.last_good());
                if let ControlFrame::V3(ControlV3::GoAway(ref mut f)) = goaway {
                    f.set_status(GoAwayStatus::ProtocolError);
                }
                self.enqueue_frame(Frame::Control(goaway), FRAME_PRECEDENCE_MAX);
            }
            ReadExit::GoAway => {}
            ReadExit::Network(e) => debug!("read loop ended: {}", e),
        }
        self.egress.push(QueuedFrame::shutdown());
        self.dispatch.push(QueuedStream::shutdown());
    }

    fn on_control(self: &Arc<Conn>, frame: ControlFrame) -> Handled {
        match frame {
            ControlFrame::V2(ControlV2::SynStream(f)) => {
                self.on_syn_stream(f.stream_id, f.priority, f.flags, f.headers);
                Handled::Continue
            }
            ControlFrame::V3(ControlV3::SynStream(f)) => {
                self.on_syn_stream(f.stream_id, f.priority, f.flags, f.headers);
                Handled::Continue
            }
            ControlFrame::V2(ControlV2::RstStream(f)) => {
                self.on_rst_stream(f.stream_id, f.status_code);
                Handled::Continue
            }
            ControlFrame::V3(ControlV3::RstStream(f)) => {
                self.on_rst_stream(f.stream_id, f.status_code);
                Handled::Continue
            }
            frame @ ControlFrame::V2(ControlV2::Ping(_))
            | frame @ ControlFrame::V3(ControlV3::Ping(_)) => {
                // PONG, ahead of everything else in the queue.
                self.enqueue_frame(Frame::Control(frame), FRAME_PRECEDENCE_MAX);
                Handled::Continue
            }
            ControlFrame::V2(ControlV2::Settings(f)) => {
                self.on_settings(f.entries);
                Handled::Continue
            }
            ControlFrame::V3(ControlV3::Settings(f)) => {
                self.on_settings(f.entries);
                Handled::Continue
            }
            // NOOP only decodes under version 2.
            ControlFrame::V2(ControlV2::Noop(_)) => Handled::Continue,
            ControlFrame::V3(ControlV3::WindowUpdate(f)) => {
                // Outbound flow control is not implemented; accept and
                // ignore the returned window.
                debug!(
                    "WINDOW_UPDATE stream #{} delta {} ignored",
                    f.stream_id, f.delta_window_size
                );
                Handled::Continue
            }
            ControlFrame::V2(ControlV2::GoAway(f)) => {
                info!("client GOAWAY, last good stream #{}", f.last_good_stream_id);
                Handled::GoAwayReceived
            }
            ControlFrame::V3(ControlV3::GoAway(f)) => {
                info!(
                    "client GOAWAY, last good stream #{}, status {}",
                    f.last_good_stream_id, f.status_code
                );
                Handled::GoAwayReceived
            }
            other => Handled::Protocol(format!("unexpected {} frame", other.frame_type())),
        }
    }

    fn on_syn_stream(
        self: &Arc<Conn>,
        id: u32,
        priority: u8,
        flags: u8,
        headers: crate::framing::HeaderBlock,
    ) {
        // 0 is not a valid stream id, client streams are odd, and ids
        // must increase monotonically.
        if id == 0 || id % 2 == 0 || id < self.last_good() {
            self.write_rst_stream_id(id, StatusCode::ProtocolError);
            return;
        }
        if let Some(existing) = self.streams.get(id) {
            self.write_rst_stream(&existing, StatusCode::stream_in_use(self.version));
            return;
        }
        if id == self.last_good() {
            // The id of a completed stream must not be reused.
            self.write_rst_stream_id(id, StatusCode::ProtocolError);
            return;
        }
        self.last_good_stream_id.store(id, Ordering::SeqCst);

        let body = if flags & FLAG_FIN == 0 {
            Some(pipe::pipe(self.body_pipe_capacity))
        } else {
            None
        };
        let stream = Arc::new(Stream::new_client(
            id,
            priority,
            headers,
            flags & FLAG_FIN != 0,
            flags & FLAG_UNIDIRECTIONAL != 0,
            body,
        ));
        self.streams.add(stream.clone());
        self.dispatch.push(QueuedStream(Some(stream)));
    }

    fn on_rst_stream(&self, id: u32, status_code: u32) {
        info!("stream #{} reset by client, status {}", id, status_code);
        if let Some(stream) = self.streams.get(id) {
            self.close_stream(&stream);
        }
    }

    fn on_settings(&self, entries: SettingEntries) {
        debug!("SETTINGS received: ids {:?}", entries.ids());
        *self
            .received_settings
            .lock()
            .expect("settings lock poisoned") = Some(entries);
    }

    fn on_data(&self, frame: crate::framing::DataFrame) {
        let id = frame.stream_id;
        let stream = match self.streams.get(id) {
            Some(s) if !s.peer_half_closed() => s,
            _ => {
                self.write_rst_stream_id(id, StatusCode::stream_already_closed(self.version));
                return;
            }
        };
        let consumed = frame.payload.len();
        if let Err(e) = stream.write_body(&frame.payload) {
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                // The handler stopped reading; body bytes are dropped.
                debug!("stream #{} body discarded, reader closed", id);
            } else {
                warn!("stream #{} body pipe error: {}", id, e);
            }
        }
        if frame.flags & FLAG_FIN != 0 {
            stream.close_body_writer();
            stream.peer_half_close(&self.streams);
        } else if self.version == Version::V3 && consumed > 0 {
            // Return the window for consumed bytes so the client keeps
            // sending; outbound send windows are not tracked.
            if let Ok(update) = ControlFrame::window_update(id, consumed as u32) {
                self.write_frame(Frame::Control(update), egress_precedence(stream.priority()));
            }
        }
    }

    // Dispatcher loop.

    fn dispatch_loop(self: &Arc<Conn>) {
        loop {
            match self.dispatch.pop().0 {
                None => break,
                Some(stream) => {
                    let conn = self.clone();
                    thread::spawn(move || conn.serve_stream(stream));
                }
            }
        }
    }

    fn serve_stream(self: &Arc<Conn>, stream: Arc<Stream>) {
        // Pushed streams are driven by their pusher, never dispatched.
        let block = match stream.headers() {
            Some(block) => block,
            None => return,
        };
        let body = stream.take_body_reader();
        let mut req = match request_from_stream(self.version, block, body) {
            Ok(req) => req,
            Err(e) => {
                warn!("stream #{} request conversion: {}", stream.id(), e);
                self.write_rst_stream(&stream, StatusCode::ProtocolError);
                return;
            }
        };
        if stream.half_closed() {
            debug!("stream #{} already half-closed, not serving", stream.id());
            return;
        }
        let reply = match ControlFrame::syn_reply(self.version, stream.id()) {
            Ok(reply) => reply,
            Err(e) => {
                error!("stream #{} SYN_REPLY construction: {}", stream.id(), e);
                return;
            }
        };
        let mut w = StreamResponseWriter::new(self.clone(), stream.clone(), reply);
        self.handler.serve(&mut w, &mut req);
        w.finish();
        drop(req); // releases the body pipe's read end
        stream.half_close(&self.streams);
    }

    /// Push the response for a resource onto a fresh server-initiated
    /// stream associated with `associated`.
    pub(crate) fn push(
        self: &Arc<Conn>,
        associated: &Arc<Stream>,
        target: &str,
        original: &Request,
    ) -> super::Result<()> {
        let target = parse_push_target(target)?;
        let scheme = target
            .scheme
            .unwrap_or_else(|| original.scheme.clone());
        let host = target.host.unwrap_or_else(|| original.host.clone());
        let priority = associated.priority();

        let id = self.next_push_id();
        let stream = Arc::new(Stream::new_pushed(id, priority));
        self.streams.add(stream.clone());

        let mut syn = ControlFrame::syn_stream(self.version, id, FLAG_UNIDIRECTIONAL)?;
        match &mut syn {
            ControlFrame::V2(ControlV2::SynStream(f)) => {
                f.set_associated_to(associated.id())?;
                f.set_priority(priority)?;
            }
            ControlFrame::V3(ControlV3::SynStream(f)) => {
                f.set_associated_to(associated.id())?;
                f.set_priority(priority)?;
            }
            _ => {}
        }
        if let Some(block) = syn.headers_mut() {
            fill_push_headers(self.version, block, &scheme, &host, &target.path_and_query)?;
        }

        let mut req = Request {
            method: "GET".to_string(),
            uri: target.path_and_query.clone(),
            scheme,
            host,
            protocol: original.protocol.clone(),
            headers: original.headers.clone(),
            body: None,
        };
        let mut w = StreamResponseWriter::new(self.clone(), stream.clone(), syn);
        self.handler.serve(&mut w, &mut req);
        w.finish();
        stream.half_close(&self.streams);
        Ok(())
    }

    // Egress.

    pub(crate) fn version(&self) -> Version {
        self.version
    }

    /// Queue a frame for the writer loop, filtering frames addressed
    /// to dead or half-closed streams.
    pub(crate) fn write_frame(&self, frame: Frame, precedence: u8) {
        if let Some(id) = frame.stream_id() {
            match self.streams.get(id) {
                Some(stream) if !stream.half_closed() => {}
                _ => {
                    debug!("write on stream #{} discarded", id);
                    return;
                }
            }
        }
        self.enqueue_frame(frame, precedence);
    }

    fn enqueue_frame(&self, frame: Frame, precedence: u8) {
        let seq = self.next_seq();
        self.egress.push(QueuedFrame {
            precedence,
            seq,
            frame: Some(frame),
        });
    }

    /// RST a stream by id. Engine-emitted resets bypass the stream
    /// filter: the stream they refer to is often not registered.
    pub(crate) fn write_rst_stream_id(&self, id: u32, status: StatusCode) {
        warn!("reset stream #{}: {}", id, status);
        let frame = match self.version {
            Version::V2 => ControlFrame::V2(ControlV2::RstStream(RstStreamV2 {
                stream_id: id,
                status_code: status.as_u32(),
            })),
            Version::V3 => ControlFrame::V3(ControlV3::RstStream(RstStreamV3 {
                stream_id: id,
                status_code: status.as_u32(),
            })),
        };
        self.enqueue_frame(Frame::Control(frame), FRAME_PRECEDENCE_MAX);
    }

    pub(crate) fn write_rst_stream(&self, stream: &Arc<Stream>, status: StatusCode) {
        if stream.half_closed() {
            return;
        }
        self.write_rst_stream_id(stream.id(), status);
    }

    fn close_stream(&self, stream: &Arc<Stream>) {
        stream.close_body();
        self.streams.remove(stream.id());
    }

    // Writer loop.

    fn write_loop<W: Write>(self: &Arc<Conn>, encoder: &mut Encoder<BufWriter<W>>) {
        loop {
            let entry = self.egress.pop();
            let frame = match entry.frame {
                Some(frame) => frame,
                None => break,
            };
            let result = frame.write(encoder).and_then(|_| encoder.flush());
            if let Err(e) = result {
                error!("write error: {}", e);
                self.dispatch.push(QueuedStream::shutdown());
                break;
            }
        }
    }

    /// Precedence used for frames of a stream.
    pub(crate) fn stream_precedence(stream: &Stream) -> u8 {
        egress_precedence(stream.priority())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::frames_v2::SettingsV2;
    use crate::framing::frames_v3::SynStreamV3;
    use crate::framing::{DataFrame, FrameType, HeaderBlock, FLAG_NONE};
    use crate::server::ResponseWriter;
    use bytes::Bytes;

    fn test_conn(version: Version) -> Arc<Conn> {
        let handler: Arc<dyn Handler> =
            Arc::new(|_w: &mut dyn ResponseWriter, _req: &mut Request| {});
        Conn::new(version, &ServerConfig::default(), handler)
    }

    fn syn_stream_v3(id: u32, priority: u8, flags: u8) -> ControlFrame {
        let mut f = SynStreamV3::new(id, flags).unwrap();
        f.set_priority(priority).unwrap();
        ControlFrame::V3(ControlV3::SynStream(f))
    }

    fn pop_frame(conn: &Conn) -> Frame {
        conn.egress.pop().frame.expect("expected a frame")
    }

    #[test]
    fn test_syn_stream_registers_and_dispatches() {
        let conn = test_conn(Version::V3);
        let handled = conn.on_control(syn_stream_v3(1, 3, FLAG_FIN));
        assert!(matches!(handled, Handled::Continue));
        assert!(conn.streams.contains(1));
        let queued = conn.dispatch.pop().0.unwrap();
        assert_eq!(queued.id(), 1);
        assert!(queued.peer_half_closed());
        assert!(conn.egress.is_empty());
    }

    #[test]
    fn test_syn_stream_invalid_ids_reset() {
        let conn = test_conn(Version::V3);
        // Even id.
        conn.on_syn_stream(2, 0, FLAG_NONE, HeaderBlock::new());
        match pop_frame(&conn) {
            Frame::Control(f) => {
                assert_eq!(f.frame_type(), FrameType::RstStream);
                assert_eq!(f.stream_id(), Some(2));
                assert_eq!(f.status_code(), Some(StatusCode::ProtocolError.as_u32()));
            }
            other => panic!("unexpected frame: {:?}", other),
        }
        assert!(!conn.streams.contains(2));

        // Zero id.
        conn.on_syn_stream(0, 0, FLAG_NONE, HeaderBlock::new());
        match pop_frame(&conn) {
            Frame::Control(f) => assert_eq!(f.stream_id(), Some(0)),
            other => panic!("unexpected frame: {:?}", other),
        }

        // Going backwards.
        conn.on_syn_stream(5, 0, FLAG_NONE, HeaderBlock::new());
        conn.dispatch.pop();
        conn.on_syn_stream(3, 0, FLAG_NONE, HeaderBlock::new());
        match pop_frame(&conn) {
            Frame::Control(f) => {
                assert_eq!(f.stream_id(), Some(3));
                assert_eq!(f.status_code(), Some(StatusCode::ProtocolError.as_u32()));
            }
            other => panic!("unexpected frame: {:?}", other),
        }
        assert!(!conn.streams.contains(3));
    }

    #[test]
    fn test_duplicate_id_resets_with_stream_in_use() {
        for (version, expected) in [
            (Version::V2, StatusCode::ProtocolError),
            (Version::V3, StatusCode::StreamInUse),
        ] {
            let conn = test_conn(version);
            conn.on_syn_stream(3, 0, FLAG_NONE, HeaderBlock::new());
            conn.dispatch.pop();
            conn.on_syn_stream(3, 0, FLAG_NONE, HeaderBlock::new());
            match pop_frame(&conn) {
                Frame::Control(f) => {
                    assert_eq!(f.frame_type(), FrameType::RstStream);
                    assert_eq!(f.status_code(), Some(expected.as_u32()));
                }
                other => panic!("unexpected frame: {:?}", other),
            }
            // The original stream is unaffected.
            assert!(conn.streams.contains(3));
            assert!(conn.dispatch.is_empty());
        }
    }

    #[test]
    fn test_ping_echoed_at_max_precedence() {
        let conn = test_conn(Version::V3);
        // A queued stream-priority frame must lose to the echo.
        conn.enqueue_frame(
            Frame::Data(DataFrame::new(9, Bytes::from_static(b"x")).unwrap()),
            egress_precedence(0),
        );
        let ping = ControlFrame::ping(Version::V3, 17);
        assert!(matches!(conn.on_control(ping), Handled::Continue));
        match pop_frame(&conn) {
            Frame::Control(f) => assert_eq!(f.frame_type(), FrameType::Ping),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn test_data_for_unknown_stream_resets() {
        let conn = test_conn(Version::V3);
        conn.on_data(DataFrame::new(11, Bytes::from_static(b"body")).unwrap());
        match pop_frame(&conn) {
            Frame::Control(f) => {
                assert_eq!(f.frame_type(), FrameType::RstStream);
                assert_eq!(
                    f.status_code(),
                    Some(StatusCode::StreamAlreadyClosed.as_u32())
                );
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn test_data_triggers_window_update_on_v3() {
        let conn = test_conn(Version::V3);
        conn.on_syn_stream(1, 2, FLAG_NONE, HeaderBlock::new());
        conn.dispatch.pop();
        conn.on_data(DataFrame::new(1, Bytes::from_static(b"abcdef")).unwrap());
        match pop_frame(&conn) {
            Frame::Control(ControlFrame::V3(ControlV3::WindowUpdate(f))) => {
                assert_eq!(f.stream_id, 1);
                assert_eq!(f.delta_window_size, 6);
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn test_data_with_fin_half_closes() {
        let conn = test_conn(Version::V3);
        conn.on_syn_stream(1, 0, FLAG_NONE, HeaderBlock::new());
        conn.dispatch.pop();
        let mut data = DataFrame::new(1, Bytes::from_static(b"end")).unwrap();
        data.set_flags(FLAG_FIN).unwrap();
        conn.on_data(data);
        let stream = conn.streams.get(1).unwrap();
        assert!(stream.peer_half_closed());
        // No WINDOW_UPDATE for the final frame.
        assert!(conn.egress.is_empty());
    }

    #[test]
    fn test_egress_filter_drops_frames_for_dead_streams() {
        let conn = test_conn(Version::V3);
        conn.write_frame(
            Frame::Data(DataFrame::new(5, Bytes::from_static(b"x")).unwrap()),
            egress_precedence(0),
        );
        assert!(conn.egress.is_empty());

        conn.on_syn_stream(5, 0, FLAG_NONE, HeaderBlock::new());
        conn.dispatch.pop();
        conn.write_frame(
            Frame::Data(DataFrame::new(5, Bytes::from_static(b"x")).unwrap()),
            egress_precedence(0),
        );
        assert_eq!(conn.egress.len(), 1);
    }

    #[test]
    fn test_settings_recorded_by_canonical_id() {
        let conn = test_conn(Version::V2);
        let mut settings = SettingsV2::new(FLAG_NONE).unwrap();
        settings.entries.set(4, FLAG_NONE, 256).unwrap();
        let handled = conn.on_control(ControlFrame::V2(ControlV2::Settings(settings)));
        assert!(matches!(handled, Handled::Continue));
        let recorded = conn.last_settings().unwrap();
        assert_eq!(recorded.get(4), Some((FLAG_NONE, 256)));
    }

    #[test]
    fn test_goaway_and_unexpected_frames() {
        let conn = test_conn(Version::V3);
        let goaway = ControlFrame::goaway(Version::V3, 0);
        assert!(matches!(conn.on_control(goaway), Handled::GoAwayReceived));

        let reply = ControlFrame::syn_reply(Version::V3, 1).unwrap();
        assert!(matches!(conn.on_control(reply), Handled::Protocol(_)));
    }

    #[test]
    fn test_push_id_allocation_is_per_connection() {
        let a = test_conn(Version::V3);
        let b = test_conn(Version::V3);
        assert_eq!(a.next_push_id(), 2);
        assert_eq!(a.next_push_id(), 4);
        // A fresh connection starts over.
        assert_eq!(b.next_push_id(), 2);
    }

    #[test]
    fn test_frame_queue_scenario_ordering() {
        // Streams at priorities 0 (urgent) and 7 (background) plus an
        // administrative frame: admin first, then all of stream A,
        // then all of stream B, FIFO within each.
        let q: BlockingPriorityQueue<QueuedFrame> = BlockingPriorityQueue::new(32);
        let data = |id: u32| Frame::Data(DataFrame::new(id, Bytes::from_static(b"x")).unwrap());
        let mut seq = 0u32;
        let mut push = |frame: Frame, precedence: u8| {
            seq += 1;
            q.push(QueuedFrame {
                precedence,
                seq,
                frame: Some(frame),
            });
        };
        push(data(7), egress_precedence(7));
        push(data(1), egress_precedence(0));
        push(data(7), egress_precedence(7));
        push(data(1), egress_precedence(0));
        push(
            Frame::Control(ControlFrame::ping(Version::V3, 1)),
            FRAME_PRECEDENCE_MAX,
        );

        let order: Vec<Option<u32>> = (0..5)
            .map(|_| q.pop().frame.unwrap().stream_id())
            .collect();
        assert_eq!(order, vec![None, Some(1), Some(1), Some(7), Some(7)]);
    }

    #[test]
    fn test_sentinel_drains_after_queued_frames() {
        let q: BlockingPriorityQueue<QueuedFrame> = BlockingPriorityQueue::new(8);
        q.push(QueuedFrame {
            precedence: 0,
            seq: 1,
            frame: Some(Frame::Control(ControlFrame::ping(Version::V3, 1))),
        });
        q.push(QueuedFrame::shutdown());
        q.push(QueuedFrame {
            precedence: FRAME_PRECEDENCE_MAX,
            seq: 2,
            frame: Some(Frame::Control(ControlFrame::ping(Version::V3, 2))),
        });
        assert!(q.pop().frame.is_some());
        assert!(q.pop().frame.is_some());
        assert!(q.pop().frame.is_none());
    }

    #[test]
    fn test_stream_queue_ordering() {
        let q: BlockingPriorityQueue<QueuedStream> = BlockingPriorityQueue::new(8);
        let stream = |id: u32, priority: u8| {
            QueuedStream(Some(Arc::new(Stream::new_client(
                id,
                priority,
                HeaderBlock::new(),
                true,
                false,
                None,
            ))))
        };
        q.push(stream(9, 3));
        q.push(stream(3, 0));
        q.push(stream(1, 0));
        q.push(QueuedStream(None));
        q.push(stream(5, 7));

        let order: Vec<Option<u32>> = (0..5)
            .map(|_| q.pop().0.map(|s| s.id()))
            .collect();
        assert_eq!(order, vec![Some(1), Some(3), Some(9), Some(5), None]);
    }
}
