//! Server-side implementation of the SPDY/2 and SPDY/3 protocols.
//!
//! This crate provides the connection engine that sits behind a
//! TLS listener negotiating `spdy/2` or `spdy/3` via ALPN/NPN: it
//! demultiplexes the incoming byte stream into prioritized concurrent
//! request streams, serves each one through a user-supplied handler,
//! and multiplexes the prioritized response frames back onto the
//! connection. Server push is supported for synthesizing additional
//! unidirectional response streams.
//!
//! Protocol references:
//!
//! - <http://tools.ietf.org/html/draft-mbelshe-httpbis-spdy-00>
//! - <http://www.chromium.org/spdy/spdy-protocol/spdy-protocol-draft2>
//! - <http://dev.chromium.org/spdy/spdy-protocol/spdy-protocol-draft3>
//!
//! # Example
//!
//! ```no_run
//! use spdy_server::http::Request;
//! use spdy_server::server::{self, Handler, ResponseWriter, ServerConfig};
//! use std::net::TcpListener;
//! use std::sync::Arc;
//!
//! struct Hello;
//!
//! impl Handler for Hello {
//!     fn serve(&self, w: &mut dyn ResponseWriter, _req: &mut Request) {
//!         w.headers_mut().insert("content-type", "text/plain");
//!         let _ = w.write(b"hello over spdy\n");
//!     }
//! }
//!
//! let listener = TcpListener::bind("127.0.0.1:8443").unwrap();
//! let handler = Arc::new(Hello);
//! for stream in listener.incoming() {
//!     let stream = stream.unwrap();
//!     let reader = stream.try_clone().unwrap();
//!     let handler = handler.clone();
//!     std::thread::spawn(move || {
//!         server::serve_v3(&ServerConfig::default(), reader, stream, handler);
//!     });
//! }
//! ```

pub mod framing;
pub mod http;
pub mod server;
pub mod util;
