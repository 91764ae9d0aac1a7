//! One entry in the connection table: the socket, its in-flight messages,
//! and the per-connection state a single-threaded event loop needs to
//! resume work on it across readiness events.

use std::{net::TcpStream, os::fd::AsRawFd, time::Instant};

use crate::{
    http::message::HttpMessage,
    limits::{ReqLimits, RespLimits, SCRATCH_BUFFER_SIZE},
};

/// The permitted transitions are `Idle` → `ParsingHeaders` →
/// `ParsingBody` → `SendingHeaders` → `SendingBody` → `Idle` (or close).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnState {
    Idle,
    ParsingHeaders,
    ParsingBody,
    SendingHeaders,
    SendingBody,
    Inactive,
}

/// One connection's full state: socket, messages, scratch buffer, and the
/// bookkeeping the event loop needs to enforce timeouts and action limits.
pub(crate) struct Slot {
    pub(crate) stream: TcpStream,
    pub(crate) state: ConnState,
    pub(crate) request: HttpMessage,
    pub(crate) response: HttpMessage,
    pub(crate) scratch: Box<[u8; SCRATCH_BUFFER_SIZE]>,
    pub(crate) filled: usize,
    pub(crate) header_block: Vec<u8>,
    pub(crate) write_offset: usize,
    pub(crate) body_remaining: usize,
    pub(crate) body_send_chunk: Vec<u8>,
    pub(crate) body_send_offset: usize,
    pub(crate) action_count: usize,
    pub(crate) last_activity: Instant,
}

impl Slot {
    pub(crate) fn new(stream: TcpStream, req_limits: &ReqLimits, resp_limits: &RespLimits) -> Self {
        Self {
            stream,
            state: ConnState::Idle,
            request: HttpMessage::init_request(req_limits),
            response: HttpMessage::init_response(resp_limits),
            scratch: Box::new([0u8; SCRATCH_BUFFER_SIZE]),
            filled: 0,
            header_block: Vec::with_capacity(crate::limits::START_LINE_RESERVE),
            write_offset: 0,
            body_remaining: 0,
            body_send_chunk: Vec::new(),
            body_send_offset: 0,
            action_count: 0,
            last_activity: Instant::now(),
        }
    }

    pub(crate) fn fd(&self) -> i32 {
        self.stream.as_raw_fd()
    }

    /// Returns this connection to `Idle`, ready for the next request on the
    /// same keep-alive socket, without reallocating the scratch buffer.
    pub(crate) fn reset_for_next_request(&mut self, req_limits: &ReqLimits) {
        self.state = ConnState::Idle;
        self.request.reset_as_request(req_limits);
        self.response.reset_as_response();
        self.filled = 0;
        self.write_offset = 0;
        self.body_remaining = 0;
        self.body_send_chunk.clear();
        self.body_send_offset = 0;
        self.action_count = 0;
    }

    pub(crate) fn bump_action(&mut self) {
        self.action_count += 1;
        self.last_activity = Instant::now();
    }
}
