//! Incremental wire parser.
//!
//! Each function here is a pure step: given the bytes currently available in
//! a connection's scratch buffer, it either finishes, reports that more
//! bytes are needed (`Flow::Resume`), or reports a malformed message. No
//! function here blocks, loops on a socket, or is itself async — the event
//! loop decides when to call again, after the next read-ready event fills
//! more of the buffer. The shape is an explicit step returning
//! resume/complete/error and leaving residual bytes for the next call,
//! rather than a coroutine or async future driving itself.

use memchr::memchr;

use crate::{
    errors::{EngineError, Flow},
    http::{
        body::BodyHandle,
        message::{HttpMessage, StartLine},
        types::{slice_to_usize, Method, Version},
    },
    limits::ReqLimits,
};

/// Extends a borrow of the connection's owned scratch buffer to `'static`.
///
/// # Safety
///
/// Callers must guarantee `buf` is a slice of the connection slot's scratch
/// buffer, which outlives every message parsed from it for the lifetime of
/// the connection, and is only ever cleared and overwritten between
/// requests — never freed or reallocated while a slice derived from it is
/// still reachable from a live `HttpMessage`.
unsafe fn leak<'a>(buf: &'a [u8]) -> &'static [u8] {
    std::mem::transmute::<&'a [u8], &'static [u8]>(buf)
}

/// Parses the start line and headers out of `scratch[..filled]`.
///
/// Returns `Flow::Complete(consumed)` with the number of bytes making up the
/// header block (including the terminating blank line), so the caller can
/// shift any residual bytes (the start of a body, or of the next pipelined
/// request) to the front of the buffer.
pub(crate) fn parse_headers(
    scratch: &[u8],
    filled: usize,
    request: &mut HttpMessage,
    limits: &ReqLimits,
) -> Flow<usize> {
    let buf = &scratch[..filled];

    // CRLF is the only recognized line terminator; a bare LF anywhere in
    // the bytes seen so far is rejected immediately rather than waited out,
    // since more bytes arriving later can never turn it into a CRLF.
    if has_bare_lf(buf) {
        return Flow::Error(EngineError::InvalidStartLine);
    }

    // Find the blank line (a literal `\r\n\r\n`) terminating the header
    // block. If it isn't present yet, either ask for more bytes or fail the
    // connection once the buffer is already exhausted without one.
    let header_end = match find_header_terminator(buf) {
        Some(end) => end,
        None => {
            if filled >= buf.len() && filled == scratch.len() {
                return Flow::Error(EngineError::HeaderTooLarge);
            }
            return Flow::Resume;
        }
    };

    let block = &buf[..header_end];
    let mut lines = block.split(|&b| b == b'\n').map(strip_cr).filter(|l| !l.is_empty());

    let start_line = match lines.next() {
        Some(l) => l,
        None => return Flow::Error(EngineError::InvalidStartLine),
    };

    let (method, rest) = match Method::from_bytes(start_line) {
        Ok((m, consumed)) => (m, &start_line[consumed.min(start_line.len())..]),
        Err(e) => return Flow::Error(e),
    };
    let rest = rest.strip_prefix(b" ").unwrap_or(rest);
    let space = match memchr(b' ', rest) {
        Some(i) => i,
        None => return Flow::Error(EngineError::InvalidStartLine),
    };
    let target = &rest[..space];
    let version_bytes = &rest[space + 1..];
    if target.is_empty() || target.len() > limits.target_size {
        return Flow::Error(EngineError::InvalidStartLine);
    }
    let version = Version::from_bytes(version_bytes);
    if version == Version::Unknown {
        return Flow::Error(EngineError::InvalidVersion);
    }

    let target_static = unsafe { leak(target) };
    let (path, query) = match memchr(b'?', target_static) {
        Some(i) => (&target_static[..i], Some(&target_static[i..])),
        None => (target_static, None),
    };
    let parts: Vec<&'static [u8]> = path.split(|&b| b == b'/').filter(|s| !s.is_empty()).collect();

    request.start_line = StartLine::Request {
        method,
        url: crate::http::types::Url { target: target_static, path, parts, query },
        version,
    };

    let mut count = 0usize;
    for line in lines {
        count += 1;
        if count > limits.header_count {
            return Flow::Error(EngineError::TooManyHeaders);
        }
        let colon = match memchr(b':', line) {
            Some(i) => i,
            None => return Flow::Error(EngineError::InvalidHeader),
        };
        let name = &line[..colon];
        let mut value = &line[colon + 1..];
        while value.first() == Some(&b' ') {
            value = &value[1..];
        }
        if name.len() > limits.header_field_size || value.len() > limits.header_field_size {
            return Flow::Error(EngineError::InvalidHeader);
        }

        let name_static = unsafe { leak(name) };
        let value_static = unsafe { leak(value) };

        if name_static.eq_ignore_ascii_case(b"content-length") {
            match slice_to_usize(value_static) {
                Some(n) => request.headers.content_length = Some(n),
                None => return Flow::Error(EngineError::InvalidContentLength),
            }
        }
        if let Err(e) = request.add_header(name_static, value_static) {
            return Flow::Error(e);
        }
    }

    Flow::Complete(header_end)
}

/// Streams up to `Content-Length` body bytes from `scratch[..filled]` into
/// the request's temp body file, creating the temp file on first call.
///
/// `filled` is the number of residual/newly-read bytes available to
/// consume; `remaining` is how many more body bytes the message still
/// needs. Returns the step's outcome alongside the number of bytes of
/// `scratch` consumed this call — unlike `parse_headers`, bytes are
/// consumed (written to the body file) on every call that sees any, not
/// only on `Flow::Complete`, so the caller must compact `scratch` after
/// *every* call that reports a nonzero count, `Flow::Resume` included, or
/// the next call re-writes the same bytes from offset 0.
pub(crate) fn parse_body(
    scratch: &[u8],
    filled: usize,
    request: &mut HttpMessage,
    remaining: &mut usize,
) -> (Flow<()>, usize) {
    if *remaining == 0 {
        return (Flow::Complete(()), 0);
    }
    if request.body.is_none() {
        match BodyHandle::open_temp() {
            Ok(h) => request.body = Some(h),
            Err(e) => return (Flow::Error(EngineError::TempFileFailed(crate::errors::IoError(e))), 0),
        }
    }
    let take = filled.min(*remaining);
    if take == 0 {
        return (Flow::Resume, 0);
    }
    let body = request.body.as_mut().expect("just ensured present");
    if let Err(e) = body.write_all(&scratch[..take]) {
        return (Flow::Error(EngineError::TempFileFailed(crate::errors::IoError(e))), 0);
    }
    *remaining -= take;
    if *remaining == 0 {
        (Flow::Complete(()), take)
    } else {
        // Still need more bytes than this read delivered; caller must
        // re-arm read interest and call again once more data arrives —
        // but must first compact away the `take` bytes already consumed.
        (Flow::Resume, take)
    }
}

fn strip_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// True if `buf` contains a `\n` not immediately preceded by `\r` — a bare
/// LF line terminator, which is rejected outright rather than tolerated as
/// a terminator alongside CRLF.
fn has_bare_lf(buf: &[u8]) -> bool {
    buf.iter().enumerate().any(|(i, &b)| b == b'\n' && (i == 0 || buf[i - 1] != b'\r'))
}

fn find_header_terminator(buf: &[u8]) -> Option<usize> {
    // Look for the first blank line: a literal `\r\n\r\n`. CRLF is the only
    // recognized line terminator, so the blank line is never a bare `\n\n`.
    if buf.len() < 4 {
        return None;
    }
    for i in 0..=buf.len() - 4 {
        if &buf[i..i + 4] == b"\r\n\r\n" {
            return Some(i + 4);
        }
    }
    None
}
