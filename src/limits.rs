//! Resource bounds for the connection engine.
//!
//! Every bound named in the design is expressed here as a field with a
//! documented default, following the same "security-first defaults, explicit
//! opt-out" shape the rest of the configuration surface uses: nothing grows
//! unboundedly unless the caller deliberately raises a limit.

use std::time::Duration;

/// Capacity of the connection table. Fixed at compile time because the table
/// is a plain array, not a growable collection.
pub const MAX_CONNECTIONS: usize = 64;

/// Size of each connection's reusable read/write scratch buffer.
pub const SCRATCH_BUFFER_SIZE: usize = 8 * 1024;

/// Per-line limits on the response header block: 50 header lines at up to
/// 4 KiB each, plus room for the start line.
pub const MAX_RESPONSE_HEADERS: usize = 50;
pub const MAX_HEADER_FIELD_SIZE: usize = 4 * 1024;
pub const START_LINE_RESERVE: usize = 512;

/// Number of actions (events processed) a connection may consume before it
/// is forced closed with a 408, guarding against clients that keep a slot
/// busy with many tiny operations.
pub const ACTION_LIMIT: usize = 10_000;

/// How long a connection may sit without activity before the post-batch
/// scan evicts it.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Chunk size used when streaming a body file to the socket.
pub const BODY_CHUNK_SIZE: usize = 4 * 1024;

/// Bounds applied while parsing a request.
///
/// # Defaults
///
/// | Field | Default | Why |
/// |---|---|---|
/// | `target_size` | 2 KiB | Bounds the request-line target string. |
/// | `header_count` | 50 | Matches [`MAX_RESPONSE_HEADERS`]; requests and responses share one budget. |
/// | `header_field_size` | 4 KiB | Matches [`MAX_HEADER_FIELD_SIZE`]. |
/// | `body_size` | 16 MiB | Bodies live on disk, not in memory, so this bounds disk use, not RAM. |
#[derive(Debug, Clone, Copy)]
pub struct ReqLimits {
    pub target_size: usize,
    pub header_count: usize,
    pub header_field_size: usize,
    pub body_size: usize,
    _priv: (),
}

impl Default for ReqLimits {
    fn default() -> Self {
        Self {
            target_size: 2 * 1024,
            header_count: MAX_RESPONSE_HEADERS,
            header_field_size: MAX_HEADER_FIELD_SIZE,
            body_size: 16 * 1024 * 1024,
            _priv: (),
        }
    }
}

/// Bounds applied while building a response.
#[derive(Debug, Clone, Copy)]
pub struct RespLimits {
    pub header_count: usize,
    pub header_field_size: usize,
    _priv: (),
}

impl Default for RespLimits {
    fn default() -> Self {
        Self {
            header_count: MAX_RESPONSE_HEADERS,
            header_field_size: MAX_HEADER_FIELD_SIZE,
            _priv: (),
        }
    }
}

/// Bounds applied to one connection's lifetime.
///
/// # Defaults
///
/// | Field | Default | Why |
/// |---|---|---|
/// | `idle_timeout` | 30s | Matches [`IDLE_TIMEOUT`]; reclaims abandoned keep-alive sockets. |
/// | `action_limit` | 10,000 | Matches [`ACTION_LIMIT`]; bounds per-connection event processing work. |
#[derive(Debug, Clone, Copy)]
pub struct ConnLimits {
    pub idle_timeout: Duration,
    pub action_limit: usize,
    _priv: (),
}

impl Default for ConnLimits {
    fn default() -> Self {
        Self {
            idle_timeout: IDLE_TIMEOUT,
            action_limit: ACTION_LIMIT,
            _priv: (),
        }
    }
}

/// Top-level server configuration: connection table capacity and whether
/// error bodies are emitted as JSON or as a bare status line.
#[derive(Debug, Clone, Copy)]
pub struct ServerLimits {
    pub max_connections: usize,
    pub json_errors: bool,
    _priv: (),
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            max_connections: MAX_CONNECTIONS,
            json_errors: true,
            _priv: (),
        }
    }
}
