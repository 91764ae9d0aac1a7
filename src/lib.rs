//! epoll_http - a single-threaded, edge-triggered HTTP/1.1 origin server
//!
//! One `epoll` instance, one thread, non-blocking sockets driven by
//! `EPOLLET` readiness events, and a fixed-capacity table of connection
//! slots — no thread pool, no async runtime. This is the same shape as a
//! small C event server, carried over into safe Rust: a [`Router`]
//! implementation is the only thing callers need to supply.
//!
//! # Quick start
//!
//! ```no_run
//! use epoll_http::{event_loop, HttpMessage, Router, RouterError, limits::*};
//!
//! struct Echo;
//!
//! impl Router for Echo {
//!     fn route(&self, request: &HttpMessage, response: &mut HttpMessage) -> Result<(), RouterError> {
//!         response.set_status(200, b"OK")?;
//!         response.set_header(b"content-type", b"text/plain; charset=utf-8")?;
//!         let body = request.url().map(|u| u.path().to_vec()).unwrap_or_default();
//!         response.write_body(&body)
//!     }
//! }
//!
//! fn main() -> std::io::Result<()> {
//!     env_logger::init();
//!     let listener = event_loop::bind_listener("127.0.0.1:8080")?;
//!     event_loop::run(
//!         listener,
//!         &Echo,
//!         &ServerLimits::default(),
//!         &ConnLimits::default(),
//!         &ReqLimits::default(),
//!         &RespLimits::default(),
//!     )
//! }
//! ```
//!
//! # Resource bounds
//!
//! Every bound the event loop enforces — connection table size, per-message
//! header limits, idle timeout, per-connection action budget — is a field on
//! one of the [`limits`] structs, each with a documented default. There is no
//! unbounded growth path: a connection that misbehaves past its budget is
//! closed, never queued indefinitely.
//!
//! # Logging
//!
//! Diagnostic output goes through the [`log`](https://docs.rs/log) facade;
//! wire it up with any compatible subscriber (`env_logger` in the example
//! above) or leave it unconfigured to run silently.

pub(crate) mod conn {
    pub(crate) mod slot;
    pub(crate) mod table;
}
pub mod event_loop;
pub(crate) mod http {
    pub(crate) mod body;
    pub(crate) mod builder;
    pub(crate) mod message;
    pub(crate) mod parser;
    pub mod query;
    pub(crate) mod types;
}
pub(crate) mod errors;
pub mod limits;
pub(crate) mod mime;
pub mod router;
pub(crate) mod signal;

pub use crate::{
    errors::RouterError,
    http::{
        message::HttpMessage,
        query,
        types::{Method, StatusCode, Url, Version},
    },
    router::Router,
};

#[doc(hidden)]
#[cfg(test)]
pub(crate) mod tools {
    use std::str::from_utf8;

    #[inline]
    pub(crate) fn str_2<'a>(value: (&'a [u8], &'a [u8])) -> (&'a str, &'a str) {
        (from_utf8(value.0).unwrap(), from_utf8(value.1).unwrap())
    }
}
