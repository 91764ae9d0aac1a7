//! Incremental wire builder — the mirror image of `parser.rs`, driven by
//! write readiness instead of read readiness.

use std::io::Write;

use crate::{
    errors::{EngineError, Flow},
    http::{
        message::{HttpMessage, StartLine},
        types::Version,
    },
    mime,
};

/// Formats the start line and every header of `response` into `out`,
/// computing `Content-Length`/`Content-Type` from the attached body first.
///
/// Call once per response, before any partial-write resume loop; the
/// produced buffer is then handed to a plain non-blocking write loop by the
/// caller, which tracks its own byte offset across `Flow::Resume`s (there is
/// nothing left for this function to resume — formatting never blocks).
pub(crate) fn build_headers(response: &mut HttpMessage, out: &mut Vec<u8>) -> Result<(), EngineError> {
    let content_length = response.body.as_ref().map(|b| b.length);
    if let Some(path) = response.body.as_ref().and_then(|b| b.path.clone()) {
        if response.get_header(b"content-type").is_none() {
            let path_str = path.to_string_lossy().into_owned();
            set_content_type_from_path(response, &path_str)?;
        }
    }

    let (version, status_code, status_message) = match &response.start_line {
        StartLine::Response { version, status_code, status_message } => (*version, *status_code, *status_message),
        StartLine::Request { .. } => return Err(EngineError::NullMessage),
    };

    out.clear();
    let v = match version {
        Version::Http11 => "HTTP/1.1",
        Version::Http10 => "HTTP/1.0",
        _ => "HTTP/1.1",
    };
    write!(out, "{v} {status_code} ").ok();
    out.extend_from_slice(status_message);
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(b"server: HttpServer\r\n");
    // Written straight into `out` rather than stored as a header on
    // `response`, since the value is only known here and has nowhere owned
    // to live on the `&'static [u8]`-typed `HeaderMap`.
    if let Some(length) = content_length {
        write!(out, "content-length: {length}\r\n").ok();
    }
    for header in &response.headers.headers {
        out.extend_from_slice(header.name);
        out.extend_from_slice(b": ");
        out.extend_from_slice(header.value);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
    Ok(())
}

/// Appends a `Content-Type` header inferred from `path`'s extension, with a
/// `charset=utf-8` suffix already included for text-ish types by
/// [`mime::content_type_for_path`].
pub(crate) fn set_content_type_from_path(response: &mut HttpMessage, path: &str) -> Result<(), EngineError> {
    let ct: &'static str = mime::content_type_for_path(path);
    response.add_header(b"content-type", ct.as_bytes())
}

/// Writes `header_block[*offset..]` to `sink` until it is fully sent or the
/// write would block. Returns `Flow::Complete(())` when done, or
/// `Flow::Resume` after updating `*offset` to reflect a short write.
pub(crate) fn send_headers(sink: &mut impl Write, header_block: &[u8], offset: &mut usize) -> Flow<()> {
    while *offset < header_block.len() {
        match sink.write(&header_block[*offset..]) {
            Ok(0) => return Flow::Error(EngineError::Transport(crate::errors::IoError(
                std::io::Error::new(std::io::ErrorKind::WriteZero, "write returned 0"),
            ))),
            Ok(n) => *offset += n,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Flow::Resume,
            Err(e) => return Flow::Error(e.into()),
        }
    }
    Flow::Complete(())
}

/// Streams the response body to `sink` in fixed-size chunks, resuming from
/// wherever the previous call left off.
///
/// `pending` holds whatever was read from the body file but not yet fully
/// handed to `sink`, and `pending_offset` how much of it is already written.
/// Without this, a would-block partway through writing a chunk would lose
/// the unsent remainder the next time this function reads further ahead in
/// the file — the body's read cursor only ever advances, so bytes read but
/// not written cannot be recovered from the file a second time. The file is
/// rewound exactly once, by the caller, before the first call.
pub(crate) fn send_body(
    sink: &mut impl Write,
    response: &mut HttpMessage,
    chunk_size: usize,
    pending: &mut Vec<u8>,
    pending_offset: &mut usize,
) -> Flow<()> {
    let Some(body) = response.body.as_mut() else {
        return Flow::Complete(());
    };
    loop {
        if *pending_offset >= pending.len() {
            pending.clear();
            *pending_offset = 0;
            if body.remaining() == 0 {
                return Flow::Complete(());
            }
            let want = chunk_size.min(body.remaining());
            pending.resize(want, 0);
            let n = match body.read(pending) {
                Ok(n) => n,
                Err(e) => return Flow::Error(e.into()),
            };
            if n == 0 {
                return Flow::Error(EngineError::BodyTooShort);
            }
            pending.truncate(n);
        }

        match sink.write(&pending[*pending_offset..]) {
            Ok(0) => return Flow::Error(EngineError::Transport(crate::errors::IoError(
                std::io::Error::new(std::io::ErrorKind::WriteZero, "write returned 0"),
            ))),
            Ok(n) => *pending_offset += n,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Flow::Resume,
            Err(e) => return Flow::Error(e.into()),
        }
    }
}
