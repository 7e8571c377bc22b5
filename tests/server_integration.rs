//! End-to-end connection tests
//!
//! Each test runs the engine on an in-memory duplex connection and
//! speaks the wire protocol from the client side with the crate's own
//! codec: SYN_STREAM in, SYN_REPLY / DATA / RST_STREAM / GOAWAY out.

use spdy_server::framing::frame::{ControlV2, ControlV3};
use spdy_server::framing::frames_v2::{SettingsV2, SynStreamV2};
use spdy_server::framing::frames_v3::SynStreamV3;
use spdy_server::framing::{
    select_dictionary, ControlFrame, DataFrame, Decoder, Encoder, Frame, FrameType, StatusCode,
    Version, FLAG_FIN, FLAG_NONE, FLAG_UNIDIRECTIONAL,
};
use spdy_server::http::Request;
use spdy_server::server::{serve_v2, serve_v3, Handler, ResponseWriter, ServerConfig};
use spdy_server::util::pipe::{pipe, PipeReader, PipeWriter};
use bytes::Bytes;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

struct TestClient {
    enc: Encoder<PipeWriter>,
    dec: Decoder<PipeReader>,
    server: JoinHandle<()>,
}

impl TestClient {
    fn start(version: Version, handler: Arc<dyn Handler>) -> TestClient {
        let (client_w, server_r) = pipe(1 << 20);
        let (server_w, client_r) = pipe(1 << 20);
        let server = thread::spawn(move || {
            let config = ServerConfig::default();
            match version {
                Version::V2 => serve_v2(&config, server_r, server_w, handler),
                Version::V3 => serve_v3(&config, server_r, server_w, handler),
            }
        });
        let dict = select_dictionary(version);
        let mut enc = Encoder::new(client_w);
        enc.set_zlib_dict(dict);
        let mut dec = Decoder::new(client_r);
        dec.set_zlib_dict(dict);
        TestClient { enc, dec, server }
    }

    fn send(&mut self, frame: Frame) {
        frame.write(&mut self.enc).unwrap();
        self.enc.flush().unwrap();
    }

    fn recv(&mut self) -> Frame {
        Frame::read(&mut self.dec).unwrap()
    }

    /// Close the client's write side and wait for the engine to wind
    /// down all three loops.
    fn shutdown(self) {
        drop(self.enc);
        self.server.join().unwrap();
    }
}

fn get_syn_stream_v3(id: u32, priority: u8, path: &str) -> Frame {
    let mut f = SynStreamV3::new(id, FLAG_FIN).unwrap();
    f.set_priority(priority).unwrap();
    f.headers.add(":method", "GET").unwrap();
    f.headers.add(":scheme", "https").unwrap();
    f.headers.add(":path", path).unwrap();
    f.headers.add(":version", "HTTP/1.1").unwrap();
    f.headers.add(":host", "example.com").unwrap();
    Frame::Control(ControlFrame::V3(ControlV3::SynStream(f)))
}

fn get_syn_stream_v2(id: u32, path: &str) -> Frame {
    let mut f = SynStreamV2::new(id, FLAG_FIN).unwrap();
    f.headers.add("method", "GET").unwrap();
    f.headers.add("scheme", "https").unwrap();
    f.headers.add("url", path).unwrap();
    f.headers.add("version", "HTTP/1.1").unwrap();
    f.headers.add("host", "example.com").unwrap();
    Frame::Control(ControlFrame::V2(ControlV2::SynStream(f)))
}

#[test]
fn test_v3_single_get() {
    let body = vec![0x42u8; 20];
    let expected = body.clone();
    let handler: Arc<dyn Handler> = Arc::new(move |w: &mut dyn ResponseWriter, req: &mut Request| {
        assert!(req.via_spdy());
        w.write(&body).unwrap();
    });
    let mut client = TestClient::start(Version::V3, handler);
    client.send(get_syn_stream_v3(1, 3, "/a"));

    match client.recv() {
        Frame::Control(f) => {
            assert_eq!(f.frame_type(), FrameType::SynReply);
            assert_eq!(f.stream_id(), Some(1));
            let headers = f.headers().unwrap();
            assert_eq!(headers.get_first(":status"), Some("200"));
            assert_eq!(headers.get_first(":version"), Some("HTTP/1.1"));
        }
        other => panic!("expected SYN_REPLY, got {:?}", other),
    }
    match client.recv() {
        Frame::Data(f) => {
            assert_eq!(f.stream_id, 1);
            assert_eq!(&f.payload[..], &expected[..]);
            assert_eq!(f.flags, FLAG_FIN);
        }
        other => panic!("expected DATA, got {:?}", other),
    }
    client.shutdown();
}

#[test]
fn test_v2_single_get() {
    let handler: Arc<dyn Handler> = Arc::new(|w: &mut dyn ResponseWriter, req: &mut Request| {
        let body = format!("{} {}", req.method, req.uri);
        w.headers_mut().insert("Content-Type", "text/plain");
        w.write(body.as_bytes()).unwrap();
    });
    let mut client = TestClient::start(Version::V2, handler);
    client.send(get_syn_stream_v2(1, "/hello"));

    match client.recv() {
        Frame::Control(f) => {
            assert_eq!(f.frame_type(), FrameType::SynReply);
            let headers = f.headers().unwrap();
            assert_eq!(headers.get_first("status"), Some("200"));
            assert_eq!(headers.get_first("content-type"), Some("text/plain"));
        }
        other => panic!("expected SYN_REPLY, got {:?}", other),
    }
    match client.recv() {
        Frame::Data(f) => {
            assert_eq!(&f.payload[..], b"GET /hello");
            assert_eq!(f.flags, FLAG_FIN);
        }
        other => panic!("expected DATA, got {:?}", other),
    }
    client.shutdown();
}

#[test]
fn test_request_body_and_window_updates() {
    let handler: Arc<dyn Handler> = Arc::new(|w: &mut dyn ResponseWriter, req: &mut Request| {
        use std::io::Read;
        let mut body = Vec::new();
        req.body.as_mut().unwrap().read_to_end(&mut body).unwrap();
        w.write(&body).unwrap();
    });
    let mut client = TestClient::start(Version::V3, handler);

    let mut syn = SynStreamV3::new(1, FLAG_NONE).unwrap();
    syn.headers.add(":method", "POST").unwrap();
    syn.headers.add(":scheme", "https").unwrap();
    syn.headers.add(":path", "/echo").unwrap();
    syn.headers.add(":version", "HTTP/1.1").unwrap();
    syn.headers.add(":host", "example.com").unwrap();
    client.send(Frame::Control(ControlFrame::V3(ControlV3::SynStream(syn))));

    client.send(Frame::Data(
        DataFrame::new(1, Bytes::from_static(b"hel")).unwrap(),
    ));
    let mut tail = DataFrame::new(1, Bytes::from_static(b"lo")).unwrap();
    tail.set_flags(FLAG_FIN).unwrap();
    client.send(Frame::Data(tail));

    // The non-final DATA frame is acknowledged with a WINDOW_UPDATE
    // for the consumed bytes.
    match client.recv() {
        Frame::Control(ControlFrame::V3(ControlV3::WindowUpdate(f))) => {
            assert_eq!(f.stream_id, 1);
            assert_eq!(f.delta_window_size, 3);
        }
        other => panic!("expected WINDOW_UPDATE, got {:?}", other),
    }
    match client.recv() {
        Frame::Control(f) => assert_eq!(f.frame_type(), FrameType::SynReply),
        other => panic!("expected SYN_REPLY, got {:?}", other),
    }
    match client.recv() {
        Frame::Data(f) => {
            assert_eq!(&f.payload[..], b"hello");
            assert_eq!(f.flags, FLAG_FIN);
        }
        other => panic!("expected DATA, got {:?}", other),
    }
    client.shutdown();
}

#[test]
fn test_duplicate_stream_id_reset() {
    // The handler drains the request body, so stream 3 stays open
    // until the client sends FIN; the duplicate SYN_STREAM is
    // guaranteed to arrive while the original is live.
    let handler: Arc<dyn Handler> = Arc::new(|w: &mut dyn ResponseWriter, req: &mut Request| {
        use std::io::Read;
        let mut body = Vec::new();
        req.body.as_mut().unwrap().read_to_end(&mut body).unwrap();
        w.write(b"served once").unwrap();
    });
    let mut client = TestClient::start(Version::V3, handler);

    let mut syn = SynStreamV3::new(3, FLAG_NONE).unwrap();
    syn.headers.add(":method", "POST").unwrap();
    syn.headers.add(":scheme", "https").unwrap();
    syn.headers.add(":path", "/first").unwrap();
    syn.headers.add(":version", "HTTP/1.1").unwrap();
    syn.headers.add(":host", "example.com").unwrap();
    client.send(Frame::Control(ControlFrame::V3(ControlV3::SynStream(syn))));

    // Reuse of a live id.
    client.send(get_syn_stream_v3(3, 0, "/again"));
    match client.recv() {
        Frame::Control(f) => {
            assert_eq!(f.frame_type(), FrameType::RstStream);
            assert_eq!(f.stream_id(), Some(3));
            assert_eq!(f.status_code(), Some(StatusCode::StreamInUse.as_u32()));
        }
        other => panic!("expected RST_STREAM, got {:?}", other),
    }

    // The original stream still works end to end.
    let mut fin = DataFrame::new(3, Bytes::new()).unwrap();
    fin.set_flags(FLAG_FIN).unwrap();
    client.send(Frame::Data(fin));
    match client.recv() {
        Frame::Control(f) => {
            assert_eq!(f.frame_type(), FrameType::SynReply);
            assert_eq!(f.stream_id(), Some(3));
        }
        other => panic!("expected SYN_REPLY, got {:?}", other),
    }
    match client.recv() {
        Frame::Data(f) => {
            assert_eq!(&f.payload[..], b"served once");
            assert_eq!(f.flags, FLAG_FIN);
        }
        other => panic!("expected DATA, got {:?}", other),
    }
    client.shutdown();
}

#[test]
fn test_invalid_stream_id_reset() {
    let handler: Arc<dyn Handler> =
        Arc::new(|_w: &mut dyn ResponseWriter, _req: &mut Request| {});
    let mut client = TestClient::start(Version::V3, handler);
    // Even id from a client is a protocol violation.
    client.send(get_syn_stream_v3(2, 0, "/bad"));
    match client.recv() {
        Frame::Control(f) => {
            assert_eq!(f.frame_type(), FrameType::RstStream);
            assert_eq!(f.stream_id(), Some(2));
            assert_eq!(f.status_code(), Some(StatusCode::ProtocolError.as_u32()));
        }
        other => panic!("expected RST_STREAM, got {:?}", other),
    }
    client.shutdown();
}

#[test]
fn test_server_push() {
    let handler: Arc<dyn Handler> = Arc::new(|w: &mut dyn ResponseWriter, req: &mut Request| {
        if req.uri == "/b" {
            // Serving the pushed resource itself.
            w.write(b"pushed").unwrap();
            return;
        }
        w.pusher().unwrap().push("/b", req).unwrap();
        w.write(b"main").unwrap();
    });
    let mut client = TestClient::start(Version::V3, handler);
    client.send(get_syn_stream_v3(1, 0, "/a"));

    // The push happens before the main response is written, so the
    // frames arrive strictly in enqueue order.
    match client.recv() {
        Frame::Control(ControlFrame::V3(ControlV3::SynStream(f))) => {
            assert_eq!(f.stream_id, 2);
            assert_eq!(f.associated_to, 1);
            assert_eq!(f.flags, FLAG_UNIDIRECTIONAL);
            assert_eq!(f.headers.get_first(":scheme"), Some("https"));
            assert_eq!(f.headers.get_first(":host"), Some("example.com"));
            assert_eq!(f.headers.get_first(":path"), Some("/b"));
            assert_eq!(f.headers.get_first(":status"), Some("200"));
        }
        other => panic!("expected push SYN_STREAM, got {:?}", other),
    }
    match client.recv() {
        Frame::Data(f) => {
            assert_eq!(f.stream_id, 2);
            assert_eq!(&f.payload[..], b"pushed");
            assert_eq!(f.flags, FLAG_FIN);
        }
        other => panic!("expected push DATA, got {:?}", other),
    }
    match client.recv() {
        Frame::Control(f) => {
            assert_eq!(f.frame_type(), FrameType::SynReply);
            assert_eq!(f.stream_id(), Some(1));
        }
        other => panic!("expected SYN_REPLY, got {:?}", other),
    }
    match client.recv() {
        Frame::Data(f) => {
            assert_eq!(f.stream_id, 1);
            assert_eq!(&f.payload[..], b"main");
        }
        other => panic!("expected DATA, got {:?}", other),
    }
    client.shutdown();
}

#[test]
fn test_content_length_early_fin() {
    let handler: Arc<dyn Handler> = Arc::new(|w: &mut dyn ResponseWriter, _req: &mut Request| {
        w.headers_mut().insert("content-length", "5");
        w.write(b"12345").unwrap();
        // Past the declared length; dropped without error.
        w.write(b"678").unwrap();
    });
    let mut client = TestClient::start(Version::V3, handler);
    client.send(get_syn_stream_v3(1, 0, "/bounded"));

    match client.recv() {
        Frame::Control(f) => {
            assert_eq!(f.frame_type(), FrameType::SynReply);
            assert_eq!(f.headers().unwrap().get_first("content-length"), Some("5"));
        }
        other => panic!("expected SYN_REPLY, got {:?}", other),
    }
    match client.recv() {
        Frame::Data(f) => {
            assert_eq!(&f.payload[..], b"12345");
            assert_eq!(f.flags, FLAG_FIN);
        }
        other => panic!("expected DATA, got {:?}", other),
    }
    // Nothing after the bounded frame: the next read hits the
    // connection teardown, not another frame.
    drop(client.enc);
    assert!(Frame::read(&mut client.dec).is_err());
    client.server.join().unwrap();
}

#[test]
fn test_large_body_chunked_into_data_frames() {
    const MAX_DATA_LEN: usize = 10240;
    let handler: Arc<dyn Handler> = Arc::new(|w: &mut dyn ResponseWriter, _req: &mut Request| {
        let body = vec![0xA5u8; 25_000];
        w.write(&body).unwrap();
    });
    let mut client = TestClient::start(Version::V3, handler);
    client.send(get_syn_stream_v3(1, 0, "/big"));

    match client.recv() {
        Frame::Control(f) => assert_eq!(f.frame_type(), FrameType::SynReply),
        other => panic!("expected SYN_REPLY, got {:?}", other),
    }
    let mut total = 0usize;
    loop {
        match client.recv() {
            Frame::Data(f) => {
                assert!(f.payload.len() <= MAX_DATA_LEN);
                total += f.payload.len();
                if f.flags == FLAG_FIN {
                    break;
                }
                assert_eq!(f.payload.len(), MAX_DATA_LEN);
            }
            other => panic!("expected DATA, got {:?}", other),
        }
    }
    assert_eq!(total, 25_000);
    client.shutdown();
}

#[test]
fn test_ping_echo() {
    let handler: Arc<dyn Handler> =
        Arc::new(|_w: &mut dyn ResponseWriter, _req: &mut Request| {});
    let mut client = TestClient::start(Version::V3, handler);
    client.send(Frame::Control(ControlFrame::ping(Version::V3, 0x1234)));
    match client.recv() {
        Frame::Control(ControlFrame::V3(ControlV3::Ping(f))) => assert_eq!(f.id, 0x1234),
        other => panic!("expected PING, got {:?}", other),
    }
    client.shutdown();
}

#[test]
fn test_v2_settings_and_noop_accepted() {
    let handler: Arc<dyn Handler> = Arc::new(|w: &mut dyn ResponseWriter, _req: &mut Request| {
        w.write(b"ok").unwrap();
    });
    let mut client = TestClient::start(Version::V2, handler);

    let mut settings = SettingsV2::new(FLAG_NONE).unwrap();
    settings.entries.set(4, FLAG_NONE, 100).unwrap();
    client.send(Frame::Control(ControlFrame::V2(ControlV2::Settings(
        settings,
    ))));
    client.send(Frame::Control(ControlFrame::V2(ControlV2::Noop(
        spdy_server::framing::frames_v2::NoopV2,
    ))));

    // The connection is still healthy afterwards.
    client.send(get_syn_stream_v2(1, "/after-settings"));
    match client.recv() {
        Frame::Control(f) => assert_eq!(f.frame_type(), FrameType::SynReply),
        other => panic!("expected SYN_REPLY, got {:?}", other),
    }
    match client.recv() {
        Frame::Data(f) => assert_eq!(&f.payload[..], b"ok"),
        other => panic!("expected DATA, got {:?}", other),
    }
    client.shutdown();
}

#[test]
fn test_goaway_tears_down_connection() {
    let handler: Arc<dyn Handler> =
        Arc::new(|_w: &mut dyn ResponseWriter, _req: &mut Request| {});
    let mut client = TestClient::start(Version::V3, handler);
    client.send(Frame::Control(ControlFrame::goaway(Version::V3, 0)));
    // All three loops exit without the client closing its side.
    client.server.join().unwrap();
}

#[test]
fn test_unexpected_frame_answered_with_goaway() {
    let handler: Arc<dyn Handler> =
        Arc::new(|_w: &mut dyn ResponseWriter, _req: &mut Request| {});
    let mut client = TestClient::start(Version::V3, handler);
    // A client must not send SYN_REPLY.
    let reply = ControlFrame::syn_reply(Version::V3, 1).unwrap();
    client.send(Frame::Control(reply));
    match client.recv() {
        Frame::Control(ControlFrame::V3(ControlV3::GoAway(f))) => {
            assert_eq!(f.last_good_stream_id, 0);
            assert_eq!(f.status_code, 1);
        }
        other => panic!("expected GOAWAY, got {:?}", other),
    }
    client.server.join().unwrap();
}

#[test]
fn test_bodyless_response_fin_on_syn_reply() {
    let handler: Arc<dyn Handler> = Arc::new(|w: &mut dyn ResponseWriter, _req: &mut Request| {
        w.write_header(204);
    });
    let mut client = TestClient::start(Version::V3, handler);
    client.send(get_syn_stream_v3(1, 0, "/nothing"));
    match client.recv() {
        Frame::Control(f) => {
            assert_eq!(f.frame_type(), FrameType::SynReply);
            assert_eq!(f.flags(), FLAG_FIN);
            assert_eq!(f.headers().unwrap().get_first(":status"), Some("204"));
        }
        other => panic!("expected SYN_REPLY, got {:?}", other),
    }
    client.shutdown();
}
