//! Typed error taxonomy for the connection engine.
//!
//! Errors are grouped the way the engine reacts to them, not by where they
//! are raised: a [`EngineError`] always maps to one of "build a response and
//! tear down", "tear down without a response", or "reject at accept time".
//! Flow-control (would-block, short write, needs more bytes) is deliberately
//! kept out of this enum and modeled by [`Flow`] instead, so a resumable step
//! can never be mistaken for a failure.

use std::{error, fmt, io};

/// One kind of failure the engine can encounter while driving a connection.
#[derive(Debug, PartialEq)]
pub(crate) enum EngineError {
    // Parameter errors: caller passed something invalid; never tears down a
    // socket by itself.
    InvalidMethod,
    InvalidVersion,
    InvalidHeader,
    NullMessage,

    // Protocol errors: malformed wire data from the peer. Build a 4xx and
    // tear down after sending it.
    InvalidStartLine,
    TooManyHeaders,
    HeaderTooLarge,
    MissingContentLength,
    InvalidContentLength,
    BodyTooShort,

    // Resource errors: a local operation (temp file, stat, open) failed.
    // Build a 500 and tear down.
    TempFileFailed(IoError),
    OpenFailed(IoError),

    // Transport errors: the socket itself failed in a way that is not
    // would-block. Tear down without attempting a response.
    Transport(IoError),
}

impl EngineError {
    /// Status line this error maps to when it can still be written to the peer.
    pub(crate) const fn status_code(&self) -> u16 {
        match self {
            EngineError::InvalidStartLine
            | EngineError::InvalidContentLength
            | EngineError::MissingContentLength
            | EngineError::BodyTooShort
            | EngineError::TooManyHeaders
            | EngineError::HeaderTooLarge => 400,
            EngineError::TempFileFailed(_) | EngineError::OpenFailed(_) => 500,
            _ => 500,
        }
    }
}

impl error::Error for EngineError {}
impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<io::Error> for EngineError {
    fn from(err: io::Error) -> Self {
        EngineError::Transport(IoError(err))
    }
}

#[derive(Debug)]
pub(crate) struct IoError(pub(crate) io::Error);

impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

/// The result of one resumable step of the parser or the builder.
///
/// Never folds a would-block condition into [`EngineError`] — a step either
/// finished, needs the caller to wait for more readiness and call again, or
/// failed outright.
#[derive(Debug, PartialEq)]
pub(crate) enum Flow<T> {
    Complete(T),
    Resume,
    Error(EngineError),
}

impl<T> Flow<T> {
    #[inline]
    pub(crate) fn map<U>(self, f: impl FnOnce(T) -> U) -> Flow<U> {
        match self {
            Flow::Complete(v) => Flow::Complete(f(v)),
            Flow::Resume => Flow::Resume,
            Flow::Error(e) => Flow::Error(e),
        }
    }
}

impl<T> From<io::Error> for Flow<T> {
    fn from(err: io::Error) -> Self {
        if matches!(err.kind(), io::ErrorKind::WouldBlock) {
            Flow::Resume
        } else {
            Flow::Error(EngineError::Transport(IoError(err)))
        }
    }
}

/// Error returned by a [`crate::router::Router`] implementation.
#[derive(Debug)]
pub struct RouterError(pub(crate) String);

impl RouterError {
    pub fn new(msg: impl Into<String>) -> Self {
        RouterError(msg.into())
    }
}

impl error::Error for RouterError {}
impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
