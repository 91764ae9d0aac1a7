//! The message model: one [`HttpMessage`] represents either a request or a
//! response. The start line is a sum type with no parallel type flag —
//! direction is always known from context (the parser only ever produces
//! `Request` variants; the builder only ever consumes `Response` variants),
//! so there is never an invalid flag/payload combination to guard against.

use std::path::Path;

use crate::{
    errors::{EngineError, RouterError},
    http::{
        body::BodyHandle,
        types::{HeaderMap, Method, Url, Version},
    },
    limits::{ReqLimits, RespLimits},
};

/// The first line of an HTTP message.
#[derive(Debug, Clone)]
pub(crate) enum StartLine {
    Request {
        method: Method,
        url: Url,
        version: Version,
    },
    Response {
        version: Version,
        status_code: u16,
        status_message: &'static [u8],
    },
}

/// One HTTP request or response: start line, headers, and an optional body
/// referenced by an owned file handle. Never holds the body bytes directly.
#[derive(Debug)]
pub struct HttpMessage {
    pub(crate) start_line: StartLine,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<BodyHandle>,
}

impl HttpMessage {
    /// A blank request, ready to be filled in by the parser.
    pub(crate) fn init_request(limits: &ReqLimits) -> Self {
        Self {
            start_line: StartLine::Request {
                method: Method::Unknown,
                url: Url::new(limits),
                version: Version::Unknown,
            },
            headers: HeaderMap::new(limits.header_count),
            body: None,
        }
    }

    /// A blank response, ready to be filled in by a route handler.
    pub(crate) fn init_response(limits: &RespLimits) -> Self {
        Self {
            start_line: StartLine::Response {
                version: Version::Http11,
                status_code: 0,
                status_message: b"",
            },
            headers: HeaderMap::new(limits.header_count),
            body: None,
        }
    }

    /// Resets a message for reuse on the next request of a keep-alive
    /// connection, without reallocating its header vector.
    pub(crate) fn reset_as_request(&mut self, limits: &ReqLimits) {
        self.start_line = StartLine::Request {
            method: Method::Unknown,
            url: Url::new(limits),
            version: Version::Unknown,
        };
        self.headers.reset();
        self.body = None;
    }

    pub(crate) fn reset_as_response(&mut self) {
        self.start_line = StartLine::Response {
            version: Version::Http11,
            status_code: 0,
            status_message: b"",
        };
        self.headers.reset();
        self.body = None;
    }

    /// Adds or replaces a header. Fails once the field bounds or the header
    /// count bound (≤ 50 entries, ≤ 4 KiB each) would be exceeded.
    pub(crate) fn add_header(&mut self, name: &'static [u8], value: &'static [u8]) -> Result<(), EngineError> {
        self.headers.upsert(name, value)
    }

    /// Case-insensitive first-match lookup.
    pub(crate) fn get_header(&self, name: &[u8]) -> Option<&[u8]> {
        self.headers.get(name)
    }

    /// Attaches a pre-existing file, read-only, as this message's body.
    pub(crate) fn open_existing(&mut self, path: &Path) -> Result<(), EngineError> {
        let handle = BodyHandle::open_existing(path)
            .map_err(|e| EngineError::OpenFailed(crate::errors::IoError(e)))?;
        self.headers.content_length = Some(handle.length);
        self.body = Some(handle);
        Ok(())
    }

    /// Attaches a fresh, already-unlinked temp file as this message's body,
    /// for buffering an inbound or outbound stream of bytes.
    pub(crate) fn open_temp(&mut self) -> Result<(), EngineError> {
        let handle = BodyHandle::open_temp()
            .map_err(|e| EngineError::TempFileFailed(crate::errors::IoError(e)))?;
        self.body = Some(handle);
        Ok(())
    }

    /// Resets this message to a response carrying the given status and,
    /// optionally, a JSON body — used to turn an [`EngineError`] into wire
    /// bytes without going through the router. A temp-file-backed body is
    /// only attached when `json_body` is `Some`; the builder fills in
    /// `Content-Length`/`Content-Type` from it at header-build time the same
    /// way it would for any router-attached body.
    pub(crate) fn build_error(&mut self, status_code: u16, status_message: &'static [u8], json_body: Option<&[u8]>) {
        self.start_line = StartLine::Response {
            version: Version::Http11,
            status_code,
            status_message,
        };
        self.headers.reset();
        self.body = None;
        if let Some(json) = json_body {
            if self.open_temp().is_ok() {
                let body = self.body.as_mut().expect("just opened");
                if body.write_all(json).is_ok() {
                    let _ = self.add_header(b"content-type", b"application/json");
                }
            }
        }
    }

    pub(crate) fn as_response_mut(&mut self) -> Option<(&mut u16, &mut &'static [u8])> {
        match &mut self.start_line {
            StartLine::Response { status_code, status_message, .. } => Some((status_code, status_message)),
            StartLine::Request { .. } => None,
        }
    }
}

/// Public surface for router implementations: setting the response
/// status and headers, attaching a body, and reading the request's own
/// method/path/headers/body. Internal operations above stay crate-private
/// and use [`EngineError`]; these wrappers translate failures to
/// [`RouterError`] so a router never needs to see the engine's internal
/// error taxonomy.
impl HttpMessage {
    /// The request method, or `None` if this message is a response.
    pub fn method(&self) -> Option<Method> {
        match &self.start_line {
            StartLine::Request { method, .. } => Some(*method),
            StartLine::Response { .. } => None,
        }
    }

    /// The request's parsed URL, or `None` if this message is a response.
    pub fn url(&self) -> Option<&Url> {
        match &self.start_line {
            StartLine::Request { url, .. } => Some(url),
            StartLine::Response { .. } => None,
        }
    }

    /// Case-insensitive header lookup, available on either a request or a
    /// response.
    pub fn header(&self, name: &[u8]) -> Option<&[u8]> {
        self.headers.get(name)
    }

    /// Sets the response status line. No-op error if called on a request.
    pub fn set_status(&mut self, code: u16, message: &'static [u8]) -> Result<(), RouterError> {
        match &mut self.start_line {
            StartLine::Response { status_code, status_message, .. } => {
                *status_code = code;
                *status_message = message;
                Ok(())
            }
            StartLine::Request { .. } => Err(RouterError::new("set_status called on a request message")),
        }
    }

    /// Adds or replaces a response header.
    pub fn set_header(&mut self, name: &'static [u8], value: &'static [u8]) -> Result<(), RouterError> {
        self.add_header(name, value).map_err(|e| RouterError::new(e.to_string()))
    }

    /// Attaches an existing file as the body, read-only.
    pub fn serve_file(&mut self, path: &Path) -> Result<(), RouterError> {
        self.open_existing(path).map_err(|e| RouterError::new(e.to_string()))
    }

    /// Writes `bytes` into a fresh temp-file body, creating it if needed.
    pub fn write_body(&mut self, bytes: &[u8]) -> Result<(), RouterError> {
        if self.body.is_none() {
            self.open_temp().map_err(|e| RouterError::new(e.to_string()))?;
        }
        self.body
            .as_mut()
            .expect("just ensured present")
            .write_all(bytes)
            .map_err(|e| RouterError::new(e.to_string()))
    }

    /// Reads this message's entire body into memory, from a shared
    /// reference so a [`crate::router::Router`] can call it on the request
    /// it was handed. Intended for small bodies handled by simple reference
    /// routes (e.g. `/echo`); the engine itself never does this for
    /// arbitrary bodies, since bodies are streamed rather than buffered end
    /// to end.
    pub fn read_body_to_vec(&self) -> Result<Vec<u8>, RouterError> {
        match &self.body {
            Some(body) => body.read_all_from_start().map_err(|e| RouterError::new(e.to_string())),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_header_then_get_is_case_insensitive() {
        let mut resp = HttpMessage::init_response(&RespLimits::default());
        resp.add_header(b"Content-Type", b"text/plain").unwrap();
        assert_eq!(resp.get_header(b"content-type"), Some(&b"text/plain"[..]));
    }

    #[test]
    fn add_header_past_capacity_errors() {
        let mut resp = HttpMessage::init_response(&RespLimits::default());
        for i in 0..crate::limits::MAX_RESPONSE_HEADERS {
            let name: &'static [u8] = Box::leak(format!("X-{i}").into_bytes().into_boxed_slice());
            resp.add_header(name, b"v").unwrap();
        }
        let err = resp.add_header(b"X-Overflow", b"v");
        assert!(err.is_err());
    }

    #[test]
    fn build_error_clears_body_and_headers() {
        let mut resp = HttpMessage::init_response(&RespLimits::default());
        resp.add_header(b"X-A", b"1").unwrap();
        resp.open_temp().unwrap();
        resp.build_error(400, b"Bad Request", None);
        assert!(resp.body.is_none());
        assert_eq!(resp.headers.headers.len(), 0);
        let (code, _) = resp.as_response_mut().unwrap();
        assert_eq!(*code, 400);
    }

    #[test]
    fn build_error_with_json_body_sets_content_type_and_body() {
        let mut resp = HttpMessage::init_response(&RespLimits::default());
        resp.build_error(500, b"Internal Server Error", Some(br#"{"error":"internal"}"#));
        assert_eq!(resp.get_header(b"content-type"), Some(&b"application/json"[..]));
        let body = resp.read_body_to_vec().unwrap();
        assert_eq!(&body[..], br#"{"error":"internal"}"#);
    }
}
