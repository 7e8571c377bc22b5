//! Request records and SPDY header adaptation
//!
//! A SYN_STREAM's header block carries the request line as a set of
//! pseudo-headers whose spelling differs between protocol versions.
//! This module turns a header block into a [`Request`] for the user
//! handler, and produces the header blocks for server-push streams.

use super::{Error, Headers, Result};
use crate::framing::{self, HeaderBlock, Version};
use crate::util::pipe::PipeReader;
use url::Url;

/// An HTTP request carried by a SPDY stream.
#[derive(Debug)]
pub struct Request {
    /// Request method, e.g. `GET`.
    pub method: String,
    /// Request target as sent: a rooted path or an absolute URL.
    pub uri: String,
    pub scheme: String,
    pub host: String,
    /// Protocol string, e.g. `HTTP/1.1`.
    pub protocol: String,
    pub headers: Headers,
    /// Request body; `None` when the stream opened with FIN.
    pub body: Option<PipeReader>,
}

impl Request {
    /// Whether this request arrived over SPDY, detectable downstream
    /// through the synthetic `x-spdy: true` header.
    pub fn via_spdy(&self) -> bool {
        self.headers.get("x-spdy") == Some("true")
    }
}

/// Extract the single value of a required pseudo-header.
fn single(block: &HeaderBlock, name: &'static str) -> Result<String> {
    let values = block.get_all(name);
    match values.len() {
        0 => Err(Error::MissingHeader(name)),
        1 => Ok(values[0].to_string()),
        _ => Err(Error::DuplicatedHeader(name)),
    }
}

/// A request target must be a rooted path or an absolute URL.
fn check_uri(header: &'static str, uri: &str) -> Result<()> {
    if uri.starts_with('/') {
        return Ok(());
    }
    match Url::parse(uri) {
        Ok(_) => Ok(()),
        Err(e) => Err(Error::InvalidHeader {
            header,
            reason: e.to_string(),
        }),
    }
}

/// A protocol string has the shape `NAME/MAJOR.MINOR`.
fn check_protocol(protocol: &str) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidHeader {
        header: "version",
        reason: reason.to_string(),
    };
    let mut parts = protocol.splitn(2, '/');
    let _name = parts.next().ok_or_else(|| invalid("empty"))?;
    let version = parts.next().ok_or_else(|| invalid("missing version"))?;
    let mut numbers = version.splitn(2, '.');
    let major = numbers.next().ok_or_else(|| invalid("missing major"))?;
    let minor = numbers.next().ok_or_else(|| invalid("missing minor"))?;
    if major.parse::<u32>().is_err() || minor.parse::<u32>().is_err() {
        return Err(invalid("version is not numeric"));
    }
    Ok(())
}

/// Convert a stream's SYN_STREAM header block into a request.
pub fn request_from_stream(
    version: Version,
    block: &HeaderBlock,
    body: Option<PipeReader>,
) -> Result<Request> {
    let (method_h, scheme_h, uri_h, protocol_h, host_h): (
        &'static str,
        &'static str,
        &'static str,
        &'static str,
        &'static str,
    ) = match version {
        Version::V2 => ("method", "scheme", "url", "version", "host"),
        Version::V3 => (":method", ":scheme", ":path", ":version", ":host"),
    };

    let host = single(block, host_h)?;
    let method = single(block, method_h)?;
    let scheme = single(block, scheme_h)?;
    let uri = single(block, uri_h)?;
    check_uri(uri_h, &uri)?;
    let protocol = single(block, protocol_h)?;
    check_protocol(&protocol)?;

    let mut headers = Headers::new();
    for name in block.names() {
        if name == method_h
            || name == scheme_h
            || name == uri_h
            || name == protocol_h
            || name == host_h
        {
            continue;
        }
        for value in block.get_all(name) {
            headers.insert(name, value);
        }
    }
    headers.insert("x-spdy", "true");

    Ok(Request {
        method,
        uri,
        scheme,
        host,
        protocol,
        headers,
        body,
    })
}

/// Parsed server-push target.
#[derive(Debug, Clone)]
pub(crate) struct PushTarget {
    /// `None` inherits the associated stream's scheme.
    pub scheme: Option<String>,
    /// `None` inherits the associated stream's host.
    pub host: Option<String>,
    pub path_and_query: String,
}

/// Parse a push target: either an absolute URL or a rooted path whose
/// scheme and host come from the associated stream.
pub(crate) fn parse_push_target(target: &str) -> Result<PushTarget> {
    if target.starts_with('/') {
        return Ok(PushTarget {
            scheme: None,
            host: None,
            path_and_query: target.to_string(),
        });
    }
    let url = Url::parse(target).map_err(|e| Error::InvalidHeader {
        header: "url",
        reason: e.to_string(),
    })?;
    let host = url
        .host_str()
        .map(|h| match url.port() {
            Some(port) => format!("{}:{}", h, port),
            None => h.to_string(),
        })
        .ok_or_else(|| Error::InvalidHeader {
            header: "url",
            reason: "missing host".to_string(),
        })?;
    let mut path_and_query = url.path().to_string();
    if let Some(query) = url.query() {
        path_and_query.push('?');
        path_and_query.push_str(query);
    }
    Ok(PushTarget {
        scheme: Some(url.scheme().to_string()),
        host: Some(host),
        path_and_query,
    })
}

/// Fill a push SYN_STREAM's header block. Version 2 carries a single
/// absolute `url`; version 3 splits it into three pseudo-headers.
pub(crate) fn fill_push_headers(
    version: Version,
    block: &mut HeaderBlock,
    scheme: &str,
    host: &str,
    path_and_query: &str,
) -> framing::Result<()> {
    match version {
        Version::V2 => block.add("url", &format!("{}://{}{}", scheme, host, path_and_query)),
        Version::V3 => {
            block.add(":scheme", scheme)?;
            block.add(":host", host)?;
            block.add(":path", path_and_query)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v3_block() -> HeaderBlock {
        let mut block = HeaderBlock::new();
        block.add(":method", "GET").unwrap();
        block.add(":scheme", "https").unwrap();
        block.add(":path", "/a?b=c").unwrap();
        block.add(":version", "HTTP/1.1").unwrap();
        block.add(":host", "example.com").unwrap();
        block
    }

    #[test]
    fn test_v3_request_conversion() {
        let mut block = v3_block();
        block.add("accept", "text/html").unwrap();
        block.add("cookie", "k=v").unwrap();

        let req = request_from_stream(Version::V3, &block, None).unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(req.scheme, "https");
        assert_eq!(req.uri, "/a?b=c");
        assert_eq!(req.host, "example.com");
        assert_eq!(req.protocol, "HTTP/1.1");
        assert_eq!(req.headers.get("accept"), Some("text/html"));
        assert_eq!(req.headers.get("cookie"), Some("k=v"));
        // Pseudo-headers are not copied onto the request.
        assert!(!req.headers.contains(":method"));
        assert!(req.via_spdy());
    }

    #[test]
    fn test_v2_request_conversion() {
        let mut block = HeaderBlock::new();
        block.add("method", "POST").unwrap();
        block.add("scheme", "https").unwrap();
        block.add("url", "/submit").unwrap();
        block.add("version", "HTTP/1.1").unwrap();
        block.add("host", "example.com").unwrap();
        block.add("content-type", "text/plain").unwrap();

        let req = request_from_stream(Version::V2, &block, None).unwrap();
        assert_eq!(req.method, "POST");
        assert_eq!(req.uri, "/submit");
        assert_eq!(req.headers.get("content-type"), Some("text/plain"));
        assert!(req.via_spdy());
    }

    #[test]
    fn test_missing_header() {
        let mut block = v3_block();
        // Rebuild without :host.
        let mut short = HeaderBlock::new();
        for name in block.names() {
            if name == ":host" {
                continue;
            }
            for value in block.get_all(name) {
                short.add(name, value).unwrap();
            }
        }
        block = short;
        assert!(matches!(
            request_from_stream(Version::V3, &block, None),
            Err(Error::MissingHeader(":host"))
        ));
    }

    #[test]
    fn test_duplicated_header() {
        let mut block = v3_block();
        block.add(":method", "HEAD").unwrap();
        assert!(matches!(
            request_from_stream(Version::V3, &block, None),
            Err(Error::DuplicatedHeader(":method"))
        ));
    }

    #[test]
    fn test_invalid_uri_and_protocol() {
        let mut block = v3_block();
        let mut bad_uri = HeaderBlock::new();
        for name in block.names() {
            let value = if name == ":path" {
                "not a path"
            } else {
                block.get_first(name).unwrap()
            };
            bad_uri.add(name, value).unwrap();
        }
        assert!(matches!(
            request_from_stream(Version::V3, &bad_uri, None),
            Err(Error::InvalidHeader { header: ":path", .. })
        ));

        block = v3_block();
        let mut bad_proto = HeaderBlock::new();
        for name in block.names() {
            let value = if name == ":version" {
                "HTTP/one.1"
            } else {
                block.get_first(name).unwrap()
            };
            bad_proto.add(name, value).unwrap();
        }
        assert!(matches!(
            request_from_stream(Version::V3, &bad_proto, None),
            Err(Error::InvalidHeader { header: "version", .. })
        ));
    }

    #[test]
    fn test_multi_value_headers_survive() {
        let mut block = v3_block();
        block.add("cookie", "a=1").unwrap();
        block.add("cookie", "b=2").unwrap();
        let req = request_from_stream(Version::V3, &block, None).unwrap();
        assert_eq!(req.headers.get_all("cookie"), vec!["a=1", "b=2"]);
    }

    #[test]
    fn test_parse_push_target() {
        let rel = parse_push_target("/style.css").unwrap();
        assert_eq!(rel.scheme, None);
        assert_eq!(rel.host, None);
        assert_eq!(rel.path_and_query, "/style.css");

        let abs = parse_push_target("https://cdn.example.com/app.js?v=2").unwrap();
        assert_eq!(abs.scheme.as_deref(), Some("https"));
        assert_eq!(abs.host.as_deref(), Some("cdn.example.com"));
        assert_eq!(abs.path_and_query, "/app.js?v=2");

        assert!(parse_push_target("::garbage::").is_err());
    }

    #[test]
    fn test_fill_push_headers() {
        let mut block = HeaderBlock::new();
        fill_push_headers(Version::V2, &mut block, "https", "example.com", "/b").unwrap();
        assert_eq!(block.get_first("url"), Some("https://example.com/b"));

        let mut block = HeaderBlock::new();
        fill_push_headers(Version::V3, &mut block, "https", "example.com", "/b").unwrap();
        assert_eq!(block.get_first(":scheme"), Some("https"));
        assert_eq!(block.get_first(":host"), Some("example.com"));
        assert_eq!(block.get_first(":path"), Some("/b"));
    }
}
