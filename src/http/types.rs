#![allow(rustdoc::bare_urls)]

//! Core HTTP protocol types shared by the request and response start lines.

use crate::{errors::EngineError, limits::ReqLimits};

#[inline(always)]
pub(crate) fn slice_to_usize(bytes: &[u8]) -> Option<usize> {
    let mut result: usize = 0;

    for &byte in bytes {
        if !byte.is_ascii_digit() {
            return None;
        }

        result = result
            .checked_mul(10)?
            .checked_add((byte - b'0') as usize)?;
    }

    Some(result)
}

// METHOD

/// HTTP request method, narrowed to the set the router dispatches on.
///
/// Any token not matching one of the named variants is carried as
/// [`Method::Unknown`] rather than rejected outright at parse time — the
/// router, not the parser, decides whether an unrecognized method is an
/// error.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Unknown,
}

impl Method {
    #[inline(always)]
    pub(crate) fn from_bytes(src: &[u8]) -> Result<(Self, usize), EngineError> {
        match src {
            [b'G', b'E', b'T', b' ', ..] => Ok((Method::Get, 3)),
            [b'P', b'U', b'T', b' ', ..] => Ok((Method::Put, 3)),
            [b'P', b'O', b'S', b'T', b' ', ..] => Ok((Method::Post, 4)),
            [b'D', b'E', b'L', b'E', b'T', b'E', b' ', ..] => Ok((Method::Delete, 6)),
            _ => {
                // An unrecognized-but-well-formed token (letters up to the
                // next space) is accepted as Unknown; only the complete
                // absence of a space-delimited token is a parse error.
                let end = src.iter().position(|&b| b == b' ').ok_or(EngineError::InvalidStartLine)?;
                if end == 0 || !src[..end].iter().all(u8::is_ascii_alphabetic) {
                    return Err(EngineError::InvalidMethod);
                }
                Ok((Method::Unknown, end))
            }
        }
    }

    pub(crate) const fn as_bytes(&self) -> &'static [u8] {
        match self {
            Method::Get => b"GET",
            Method::Post => b"POST",
            Method::Put => b"PUT",
            Method::Delete => b"DELETE",
            Method::Unknown => b"UNKNOWN",
        }
    }
}

// VERSION

/// HTTP protocol version recognized on the start line.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Version {
    Http10,
    Http11,
    Http20,
    Unknown,
}

impl Version {
    #[inline(always)]
    pub(crate) fn from_bytes(src: &[u8]) -> Self {
        match src {
            b"HTTP/1.1" => Self::Http11,
            b"HTTP/1.0" => Self::Http10,
            b"HTTP/2.0" | b"HTTP/2" => Self::Http20,
            _ => Self::Unknown,
        }
    }

    /// Whether the engine can actually serve this version end to end.
    /// HTTP/2.0 is recognized (so the parser can reject it cleanly with a
    /// 505) but never served, per the Non-goals.
    pub(crate) const fn supported(&self) -> bool {
        matches!(self, Version::Http10 | Version::Http11)
    }
}

// STATUS_CODE

macro_rules! set_status_codes {
    ($(
        $(#[$docs:meta])+
        $name:ident = ($num:expr, $str:expr);
    )+) => {
        /// HTTP status codes emitted by this server.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StatusCode { $(
            #[doc = concat!(stringify!($num), " ", $str)]
            $(#[$docs])+
            $name = $num,
        )+ }

        impl StatusCode {
            #[inline]
            pub(crate) const fn reason(&self) -> &'static str {
                match self { $( StatusCode::$name => $str, )+ }
            }

            #[inline]
            pub(crate) const fn code(&self) -> u16 {
                match self { $( StatusCode::$name => $num, )+ }
            }
        }
    }
}

set_status_codes! {
    /// [[RFC9110, Section 15.3.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.3.1)]
    Ok = (200, "OK");
    /// [[RFC9110, Section 15.3.5](https://datatracker.ietf.org/doc/html/rfc9110#section-15.3.5)]
    NoContent = (204, "No Content");
    /// [[RFC9110, Section 15.5.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.1)]
    BadRequest = (400, "Bad Request");
    /// [[RFC9110, Section 15.5.4](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.4)]
    Forbidden = (403, "Forbidden");
    /// [[RFC9110, Section 15.5.5](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.5)]
    NotFound = (404, "Not Found");
    /// [[RFC9110, Section 15.5.6](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.6)]
    MethodNotAllowed = (405, "Method Not Allowed");
    /// [[RFC9110, Section 15.5.9](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.9)]
    RequestTimeout = (408, "Request Timeout");
    /// [[RFC9110, Section 15.5.16](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.16)]
    UnsupportedMediaType = (415, "Unsupported Media Type");
    /// [[RFC9110, Section 15.6.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.6.1)]
    InternalServerError = (500, "Internal Server Error");
    /// [[RFC9110, Section 15.6.6](https://datatracker.ietf.org/doc/html/rfc9110#section-15.6.6)]
    HttpVersionNotSupported = (505, "HTTP Version Not Supported");
}

// Url

/// A parsed request target: the path, its `/`-separated segments, and any
/// query string, all borrowed from the connection's scratch buffer.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Url {
    pub(crate) target: &'static [u8],
    pub(crate) path: &'static [u8],
    pub(crate) parts: Vec<&'static [u8]>,
    pub(crate) query: Option<&'static [u8]>,
}

impl Url {
    #[inline(always)]
    pub(crate) fn new(limits: &ReqLimits) -> Self {
        Self {
            target: b"",
            path: b"",
            parts: Vec::with_capacity(limits.target_size / 8),
            query: None,
        }
    }

    #[inline(always)]
    pub(crate) fn clear(&mut self) {
        self.target = b"";
        self.path = b"";
        self.parts.clear();
        self.query = None;
    }
}

impl Url {
    /// The full request target, including any query string.
    #[inline(always)]
    pub const fn target(&self) -> &[u8] {
        self.target
    }

    /// The path component, without the query string.
    #[inline(always)]
    pub const fn path(&self) -> &[u8] {
        self.path
    }

    /// `/`-delimited path segments, excluding empty leading/trailing ones.
    #[inline(always)]
    pub fn path_segments(&self) -> &[&[u8]] {
        self.parts.as_slice()
    }

    /// Whether the path's segments start with the given prefix pattern.
    #[inline(always)]
    pub fn starts_with(&self, pattern: &[&[u8]]) -> bool {
        self.path_segments().starts_with(pattern)
    }

    /// Full query string including the leading `?`, if present.
    #[inline(always)]
    pub const fn query_full(&self) -> Option<&[u8]> {
        self.query
    }
}

// HEADER MAP

#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct HeaderMap {
    pub(crate) headers: Vec<Header>,
    pub(crate) content_length: Option<usize>,
}

impl HeaderMap {
    #[inline(always)]
    pub(crate) fn new(size_vec: usize) -> Self {
        Self {
            headers: Vec::with_capacity(size_vec),
            content_length: None,
        }
    }

    #[inline(always)]
    pub(crate) fn reset(&mut self) {
        self.headers.clear();
        self.content_length = None;
    }

    #[inline(always)]
    pub(crate) fn get(&self, name: &[u8]) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value)
    }

    /// Update-in-place on a case-insensitive key match, else append.
    /// Mirrors [`crate::http::message::HttpMessage::add_header`]'s contract.
    #[inline(always)]
    pub(crate) fn upsert(&mut self, name: &'static [u8], value: &'static [u8]) -> Result<(), EngineError> {
        if let Some(h) = self.headers.iter_mut().find(|h| h.name.eq_ignore_ascii_case(name)) {
            h.value = value;
            return Ok(());
        }
        if self.headers.len() >= crate::limits::MAX_RESPONSE_HEADERS {
            return Err(EngineError::TooManyHeaders);
        }
        if name.len() > crate::limits::MAX_HEADER_FIELD_SIZE || value.len() > crate::limits::MAX_HEADER_FIELD_SIZE {
            return Err(EngineError::HeaderTooLarge);
        }
        self.headers.push(Header::new(name, value));
        Ok(())
    }
}

// HEADER

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub(crate) struct Header {
    pub(crate) name: &'static [u8],
    pub(crate) value: &'static [u8],
}

impl Header {
    #[inline(always)]
    pub const fn new(name: &'static [u8], value: &'static [u8]) -> Self {
        Header { name, value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_known_tokens() {
        assert_eq!(Method::from_bytes(b"GET /x").unwrap().0, Method::Get);
        assert_eq!(Method::from_bytes(b"POST /x").unwrap().0, Method::Post);
        assert_eq!(Method::from_bytes(b"DELETE /x").unwrap().0, Method::Delete);
    }

    #[test]
    fn method_unknown_token_is_carried() {
        let (m, len) = Method::from_bytes(b"PATCH /x").unwrap();
        assert_eq!(m, Method::Unknown);
        assert_eq!(len, 5);
    }

    #[test]
    fn version_unsupported_is_recognized_not_rejected_at_parse() {
        assert_eq!(Version::from_bytes(b"HTTP/2.0"), Version::Http20);
        assert!(!Version::Http20.supported());
        assert!(Version::Http11.supported());
    }

    #[test]
    fn header_map_case_insensitive_lookup() {
        let mut map = HeaderMap::new(4);
        map.upsert(b"Content-Type", b"text/plain").unwrap();
        assert_eq!(map.get(b"content-type"), Some(&b"text/plain"[..]));
        assert_eq!(map.get(b"CONTENT-TYPE"), Some(&b"text/plain"[..]));
    }

    #[test]
    fn header_map_upsert_replaces_existing() {
        let mut map = HeaderMap::new(4);
        map.upsert(b"X-A", b"1").unwrap();
        map.upsert(b"x-a", b"2").unwrap();
        assert_eq!(map.headers.len(), 1);
        assert_eq!(map.get(b"X-A"), Some(&b"2"[..]));
    }
}
