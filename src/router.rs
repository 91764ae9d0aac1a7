//! The boundary between the engine and route handlers.
//!
//! A single synchronous method taking the request and a mutable response:
//! the engine invokes the router inline from its single thread once a
//! request has fully parsed, so there is no scheduler to hand an async
//! future to.

use crate::{errors::RouterError, http::message::HttpMessage};

/// Implemented by anything that turns a parsed request into a response.
///
/// The engine sets `response`'s protocol to HTTP/1.1 before calling `route`.
/// The implementation must set a status code and, if there is a body,
/// attach it via the message's `open_existing`/`open_temp` operations
/// (exposed to implementors through [`crate::http::message::HttpMessage`]
/// inherent methods in the same module). Returning `Err` causes the engine
/// to build a 500 response instead of whatever `response` holds.
pub trait Router {
    fn route(&self, request: &HttpMessage, response: &mut HttpMessage) -> Result<(), RouterError>;
}
