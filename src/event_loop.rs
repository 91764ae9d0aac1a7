//! The single-threaded, edge-triggered event loop.
//!
//! One `epoll` instance, one listening socket registered edge-triggered the
//! same way as every other fd, drained in a loop until `EAGAIN`, and one
//! `while` loop dispatching on each ready fd's event flags. The raw
//! `epoll_create1`/`epoll_ctl`/`epoll_wait` calls are kept as `libc` FFI,
//! since a portable readiness abstraction would hide exactly the
//! edge-triggered semantics this design depends on.

use std::{
    io::{self, ErrorKind, Read},
    net::{TcpListener, TcpStream},
    os::fd::{AsRawFd, RawFd},
    time::Duration,
};

use log::{debug, info, trace, warn};

use crate::{
    conn::{slot::ConnState, table::ConnTable},
    errors::{EngineError, Flow},
    http::{builder, parser},
    limits::{ConnLimits, ReqLimits, RespLimits, BODY_CHUNK_SIZE},
    router::Router,
    signal,
};

const MAX_EVENTS: usize = 128;

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL, 0);
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

struct Epoll {
    fd: RawFd,
}

impl Epoll {
    fn new() -> io::Result<Self> {
        let fd = unsafe { libc::epoll_create1(0) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { fd })
    }

    fn add(&self, fd: RawFd, events: u32) -> io::Result<()> {
        let mut ev = libc::epoll_event { events, u64: fd as u64 };
        let rc = unsafe { libc::epoll_ctl(self.fd, libc::EPOLL_CTL_ADD, fd, &mut ev) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn modify(&self, fd: RawFd, events: u32) -> io::Result<()> {
        let mut ev = libc::epoll_event { events, u64: fd as u64 };
        let rc = unsafe { libc::epoll_ctl(self.fd, libc::EPOLL_CTL_MOD, fd, &mut ev) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn remove(&self, fd: RawFd) {
        unsafe {
            libc::epoll_ctl(self.fd, libc::EPOLL_CTL_DEL, fd, std::ptr::null_mut());
        }
    }

    fn wait(&self, events: &mut [libc::epoll_event], timeout_ms: i32) -> io::Result<usize> {
        let n = unsafe { libc::epoll_wait(self.fd, events.as_mut_ptr(), events.len() as i32, timeout_ms) };
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == ErrorKind::Interrupted {
                return Ok(0);
            }
            return Err(err);
        }
        Ok(n as usize)
    }
}

impl Drop for Epoll {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

const READ_INTEREST: u32 = (libc::EPOLLIN | libc::EPOLLRDHUP | libc::EPOLLET) as u32;
const WRITE_INTEREST: u32 = (libc::EPOLLOUT | libc::EPOLLRDHUP | libc::EPOLLET) as u32;

/// Binds and configures the listening socket: non-blocking, `SO_REUSEADDR`,
/// backlog 10 — a typed `socket2` builder in place of raw `setsockopt`
/// calls.
pub fn bind_listener(addr: &str) -> io::Result<TcpListener> {
    use socket2::{Domain, Socket, Type};
    let socket = Socket::new(Domain::IPV4, Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    let sock_addr: std::net::SocketAddr = addr.parse().map_err(|_| io::Error::new(ErrorKind::InvalidInput, "bad address"))?;
    socket.bind(&sock_addr.into())?;
    socket.listen(10)?;
    Ok(socket.into())
}

/// Runs the event loop until `SIGINT` is observed. Consumes the listener.
pub fn run(
    listener: TcpListener,
    router: &dyn Router,
    server_limits: &crate::limits::ServerLimits,
    conn_limits: &ConnLimits,
    req_limits: &ReqLimits,
    resp_limits: &RespLimits,
) -> io::Result<()> {
    signal::install();

    let epoll = Epoll::new()?;
    let listen_fd = listener.as_raw_fd();
    epoll.add(listen_fd, (libc::EPOLLIN | libc::EPOLLET) as u32)?;

    let mut table = ConnTable::new();
    let mut events = vec![libc::epoll_event { events: 0, u64: 0 }; MAX_EVENTS];

    info!("listening on {:?}", listener.local_addr()?);

    while !signal::shutdown_requested() {
        let n = match epoll.wait(&mut events, 1000) {
            Ok(n) => n,
            Err(e) => {
                warn!("epoll_wait failed: {e}");
                continue;
            }
        };
        trace!("woke with {n} ready fds");

        for ev in &events[..n] {
            let fd = ev.u64 as RawFd;
            let flags = ev.events;

            if fd == listen_fd {
                accept_drain(&listener, &epoll, &mut table, server_limits, req_limits, resp_limits);
                continue;
            }

            // EPOLLRDHUP (registered on both interests per §4.6) only means
            // the peer shut down its write side — the read/write path still
            // needs a chance to finish draining a request or deliver a
            // best-effort error response before the slot closes, so it is
            // not treated as an immediate forced teardown the way a real
            // HUP/ERR is. A stream socket always reports EPOLLIN alongside
            // EPOLLRDHUP once there is an EOF to observe, so leaving
            // `readable` keyed on EPOLLIN alone (not EPOLLRDHUP) still lets
            // the state machine discover the half-close via an ordinary
            // `Ok(0)` read — and, critically, doesn't steal priority from a
            // pending `EPOLLOUT` while a response is mid-flight.
            let hangup = flags & (libc::EPOLLHUP | libc::EPOLLERR) as u32 != 0;
            let readable = flags & libc::EPOLLIN as u32 != 0;
            let writable = flags & libc::EPOLLOUT as u32 != 0;

            let Some(slot) = table.get_mut(fd) else {
                epoll.remove(fd);
                continue;
            };
            slot.bump_action();

            let outcome = if readable {
                advance_read_path(fd, &mut table, &epoll, req_limits, server_limits, router)
            } else if writable {
                advance_write_path(fd, &mut table, &epoll, req_limits, conn_limits)
            } else {
                StepOutcome::Continue
            };

            if hangup || matches!(outcome, StepOutcome::Close) {
                debug!("closing fd {fd}");
                epoll.remove(fd);
                table.remove(fd);
            }
        }

        evict_expired(&mut table, &epoll, conn_limits);
    }

    for fd in table.iter_fds().collect::<Vec<_>>() {
        epoll.remove(fd);
        table.remove(fd);
    }
    info!("shutdown complete");
    Ok(())
}

enum StepOutcome {
    Continue,
    Close,
}

/// Drains the accept queue until `EAGAIN`. When the table is full, the
/// socket is still accepted (so the kernel's listen backlog keeps draining)
/// but immediately closed — admission control is "accept then close", never
/// a queue (Open Question (a)).
fn accept_drain(
    listener: &TcpListener,
    epoll: &Epoll,
    table: &mut ConnTable,
    server_limits: &crate::limits::ServerLimits,
    req_limits: &ReqLimits,
    resp_limits: &RespLimits,
) {
    loop {
        match listener.accept() {
            Ok((stream, addr)) => {
                if table.count() >= server_limits.max_connections {
                    warn!("connection table full, rejecting {addr}");
                    drop(stream);
                    continue;
                }
                if set_nonblocking(stream.as_raw_fd()).is_err() {
                    continue;
                }
                let fd = stream.as_raw_fd();
                if table.add(stream, req_limits, resp_limits).is_none() {
                    continue;
                }
                if epoll.add(fd, READ_INTEREST).is_err() {
                    table.remove(fd);
                    continue;
                }
                debug!("accepted {addr} as fd {fd}");
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => break,
            Err(e) => {
                warn!("accept failed: {e}");
                break;
            }
        }
    }
}

fn advance_read_path(
    fd: RawFd,
    table: &mut ConnTable,
    epoll: &Epoll,
    req_limits: &ReqLimits,
    server_limits: &crate::limits::ServerLimits,
    router: &dyn Router,
) -> StepOutcome {
    let slot = match table.get_mut(fd) {
        Some(s) => s,
        None => return StepOutcome::Close,
    };

    let was_idle = slot.state == ConnState::Idle;
    if was_idle {
        slot.state = ConnState::ParsingHeaders;
    }

    // Drain the socket into the scratch buffer until it would block, the
    // buffer fills, or the peer closes. A peer close mid-message is not
    // reported here directly — Idle has nothing in flight to fail, but a
    // half-read request or body is a protocol error (premature EOF), not a
    // silent close, so it's handled after the loop once we know which.
    let mut eof = false;
    loop {
        if slot.filled >= slot.scratch.len() {
            break;
        }
        match (&mut slot.stream).read(&mut slot.scratch[slot.filled..]) {
            Ok(0) => {
                eof = true;
                break;
            }
            Ok(n) => slot.filled += n,
            Err(e) if e.kind() == ErrorKind::WouldBlock => break,
            Err(_) => return StepOutcome::Close,
        }
    }

    if eof && was_idle && slot.filled == 0 {
        // Nothing arrived before the peer closed; there is no in-flight
        // request to fail, so this is an ordinary connection close.
        return StepOutcome::Close;
    }

    match slot.state {
        ConnState::ParsingHeaders => {
            let flow = parser::parse_headers(&slot.scratch[..], slot.filled, &mut slot.request, req_limits);
            match flow {
                Flow::Resume if eof => {
                    fail_connection(slot, EngineError::InvalidStartLine, server_limits);
                    switch_to_write(epoll, fd, slot)
                }
                Flow::Resume => StepOutcome::Continue,
                Flow::Error(e) => {
                    fail_connection(slot, e, server_limits);
                    switch_to_write(epoll, fd, slot)
                }
                Flow::Complete(consumed) => {
                    shift_residual(slot, consumed);
                    slot.body_remaining = slot.request.headers.content_length.unwrap_or(0);
                    slot.state = ConnState::ParsingBody;
                    advance_body_then_route(fd, table, epoll, server_limits, router, eof)
                }
            }
        }
        ConnState::ParsingBody => advance_body_then_route(fd, table, epoll, server_limits, router, eof),
        _ => StepOutcome::Continue,
    }
}

fn advance_body_then_route(
    fd: RawFd,
    table: &mut ConnTable,
    epoll: &Epoll,
    server_limits: &crate::limits::ServerLimits,
    router: &dyn Router,
    eof: bool,
) -> StepOutcome {
    let slot = match table.get_mut(fd) {
        Some(s) => s,
        None => return StepOutcome::Close,
    };

    let mut remaining = slot.body_remaining;
    let (flow, consumed) = parser::parse_body(&slot.scratch[..slot.filled], slot.filled, &mut slot.request, &mut remaining);
    slot.body_remaining = remaining;
    // `parse_body` writes consumed bytes straight to the body file on every
    // call that sees any, not only on `Flow::Complete` — the scratch buffer
    // must be compacted here regardless of which arm below runs, or the next
    // read re-delivers bytes already written to disk.
    if consumed > 0 {
        shift_residual(slot, consumed);
    }

    match flow {
        // Declared Content-Length bytes never fully arrived before the peer
        // closed: premature EOF, a protocol error (§4.2), not a silent
        // close.
        Flow::Resume if eof => {
            fail_connection(slot, EngineError::BodyTooShort, server_limits);
            switch_to_write(epoll, fd, slot)
        }
        Flow::Resume => StepOutcome::Continue,
        Flow::Error(e) => {
            fail_connection(slot, e, server_limits);
            switch_to_write(epoll, fd, slot)
        }
        Flow::Complete(()) => {
            if let Err(e) = router.route(&slot.request, &mut slot.response) {
                warn!("router error on fd {fd}: {e}");
                let json = server_limits.json_errors.then_some(&br#"{"error":"Internal Server Error"}"#[..]);
                slot.response.build_error(500, b"Internal Server Error", json);
            } else if let Some((code, _)) = slot.response.as_response_mut() {
                if *code == 0 {
                    *code = 200;
                }
            }
            switch_to_write(epoll, fd, slot)
        }
    }
}

/// Builds and attaches an error response for a protocol/resource failure.
/// When `server_limits.json_errors` is set, a small `{"error": "..."}` body
/// is attached; otherwise the response carries only the status line.
fn fail_connection(slot: &mut crate::conn::slot::Slot, err: EngineError, server_limits: &crate::limits::ServerLimits) {
    let code = err.status_code();
    let message: &'static [u8] = match code {
        400 => b"Bad Request",
        _ => b"Internal Server Error",
    };
    warn!("protocol/resource error: {err} -> {code}");
    let json_body = server_limits.json_errors.then(|| json_error_body(message));
    slot.response.build_error(code, message, json_body.as_deref());
}

/// `{"error": "<message>"}`, built once per failed connection — not a hot
/// path, so a plain owned `Vec<u8>` handed straight to `build_error` is
/// simpler than threading a `'static` lifetime through it.
fn json_error_body(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + 16);
    out.extend_from_slice(br#"{"error":""#);
    out.extend_from_slice(message);
    out.extend_from_slice(br#""}"#);
    out
}

fn switch_to_write(epoll: &Epoll, fd: RawFd, slot: &mut crate::conn::slot::Slot) -> StepOutcome {
    slot.state = ConnState::SendingHeaders;
    slot.write_offset = 0;
    if let Err(e) = slot.response.body.as_mut().map_or(Ok(()), |b| b.rewind()) {
        warn!("rewind failed: {e}");
    }
    if epoll.modify(fd, WRITE_INTEREST).is_err() {
        return StepOutcome::Close;
    }
    StepOutcome::Continue
}

fn advance_write_path(
    fd: RawFd,
    table: &mut ConnTable,
    epoll: &Epoll,
    req_limits: &ReqLimits,
    conn_limits: &ConnLimits,
) -> StepOutcome {
    let slot = match table.get_mut(fd) {
        Some(s) => s,
        None => return StepOutcome::Close,
    };
    let _ = conn_limits;

    if slot.state == ConnState::SendingHeaders {
        if slot.header_block.is_empty() && slot.write_offset == 0 {
            if let Err(e) = builder::build_headers(&mut slot.response, &mut slot.header_block) {
                warn!("build_headers failed on fd {fd}: {e}");
                return StepOutcome::Close;
            }
        }
        let header_block = std::mem::take(&mut slot.header_block);
        let mut offset = slot.write_offset;
        let flow = builder::send_headers(&mut slot.stream, &header_block, &mut offset);
        slot.write_offset = offset;
        slot.header_block = header_block;
        match flow {
            Flow::Resume => return StepOutcome::Continue,
            Flow::Error(_) => return StepOutcome::Close,
            Flow::Complete(()) => {
                slot.state = ConnState::SendingBody;
                slot.header_block.clear();
                slot.write_offset = 0;
                slot.body_send_chunk.clear();
                slot.body_send_offset = 0;
            }
        }
    }

    if slot.state == ConnState::SendingBody {
        let mut chunk = std::mem::take(&mut slot.body_send_chunk);
        let mut chunk_offset = slot.body_send_offset;
        let flow = builder::send_body(&mut slot.stream, &mut slot.response, BODY_CHUNK_SIZE, &mut chunk, &mut chunk_offset);
        slot.body_send_chunk = chunk;
        slot.body_send_offset = chunk_offset;
        match flow {
            Flow::Resume => return StepOutcome::Continue,
            Flow::Error(_) => return StepOutcome::Close,
            Flow::Complete(()) => {}
        }
    }

    let close = slot
        .request
        .get_header(b"connection")
        .is_some_and(|v| v.eq_ignore_ascii_case(b"close"));

    if close {
        StepOutcome::Close
    } else {
        slot.reset_for_next_request(req_limits);
        if epoll.modify(fd, READ_INTEREST).is_err() {
            return StepOutcome::Close;
        }
        StepOutcome::Continue
    }
}

/// Moves any bytes left over after `consumed` to the front of the scratch
/// buffer, so the next parse step (body, or the next pipelined request's
/// headers) sees them at offset 0.
fn shift_residual(slot: &mut crate::conn::slot::Slot, consumed: usize) {
    let remaining = slot.filled.saturating_sub(consumed);
    slot.scratch.copy_within(consumed..slot.filled, 0);
    slot.filled = remaining;
}

fn evict_expired(table: &mut ConnTable, epoll: &Epoll, conn_limits: &ConnLimits) {
    let expired = table.scan_expired(conn_limits.idle_timeout, conn_limits.action_limit);
    for fd in expired {
        debug!("evicting idle/over-budget fd {fd}");
        if let Some(slot) = table.get_mut(fd) {
            // Best-effort notice; the peer may already be gone.
            let _ = (&slot.stream).write_timeout_best_effort();
        }
        epoll.remove(fd);
        table.remove(fd);
    }
}

trait BestEffortTimeout {
    fn write_timeout_best_effort(self) -> io::Result<()>;
}
impl BestEffortTimeout for &TcpStream {
    fn write_timeout_best_effort(self) -> io::Result<()> {
        use std::io::Write;
        let mut s = self;
        s.set_write_timeout(Some(Duration::from_millis(200)))?;
        let _ = s.write_all(b"HTTP/1.1 408 Request Timeout\r\nconnection: close\r\ncontent-length: 0\r\n\r\n");
        Ok(())
    }
}

