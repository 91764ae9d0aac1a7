//! Fixed-capacity connection table: a plain array of `Option<Slot>`,
//! addressed by linear scan over the (small, bounded) fd space — simpler
//! and more cache-friendly than a hash map when N is this small.

use std::net::TcpStream;

use crate::{
    conn::slot::Slot,
    limits::{ReqLimits, RespLimits, MAX_CONNECTIONS},
};

pub(crate) struct ConnTable {
    slots: Vec<Option<Slot>>,
}

impl ConnTable {
    pub(crate) fn new() -> Self {
        let mut slots = Vec::with_capacity(MAX_CONNECTIONS);
        slots.resize_with(MAX_CONNECTIONS, || None);
        Self { slots }
    }

    /// Inserts a freshly accepted stream into the first empty slot.
    /// Returns `None` if the table is already at capacity — the caller
    /// closes the accepted socket immediately in that case.
    pub(crate) fn add(&mut self, stream: TcpStream, req_limits: &ReqLimits, resp_limits: &RespLimits) -> Option<i32> {
        let empty = self.slots.iter().position(Option::is_none)?;
        let slot = Slot::new(stream, req_limits, resp_limits);
        let fd = slot.fd();
        self.slots[empty] = Some(slot);
        Some(fd)
    }

    pub(crate) fn get_mut(&mut self, fd: i32) -> Option<&mut Slot> {
        self.slots.iter_mut().flatten().find(|s| s.fd() == fd)
    }

    /// Removes and drops the slot owning `fd`, closing its socket and
    /// releasing its request/response body handles via their own `Drop`.
    pub(crate) fn remove(&mut self, fd: i32) -> bool {
        if let Some(entry) = self.slots.iter_mut().find(|s| s.as_ref().is_some_and(|s| s.fd() == fd)) {
            *entry = None;
            true
        } else {
            false
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub(crate) fn is_full(&self) -> bool {
        self.count() >= MAX_CONNECTIONS
    }

    /// Returns the fds of slots that have exceeded the idle timeout or the
    /// action-count limit, for the event loop's post-batch eviction scan.
    pub(crate) fn scan_expired(&self, idle_timeout: std::time::Duration, action_limit: usize) -> Vec<i32> {
        self.slots
            .iter()
            .flatten()
            .filter(|s| s.last_activity.elapsed() > idle_timeout || s.action_count >= action_limit)
            .map(|s| s.fd())
            .collect()
    }

    pub(crate) fn iter_fds(&self) -> impl Iterator<Item = i32> + '_ {
        self.slots.iter().flatten().map(|s| s.fd())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{TcpListener, TcpStream};

    fn pair() -> TcpStream {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let _ = listener.accept().unwrap();
        client
    }

    #[test]
    fn add_then_get_then_remove() {
        let mut table = ConnTable::new();
        let fd = table.add(pair(), &ReqLimits::default(), &RespLimits::default()).unwrap();
        assert_eq!(table.count(), 1);
        assert!(table.get_mut(fd).is_some());
        assert!(table.remove(fd));
        assert_eq!(table.count(), 0);
        assert!(table.get_mut(fd).is_none());
    }

    #[test]
    fn table_rejects_once_full() {
        let mut table = ConnTable::new();
        for _ in 0..MAX_CONNECTIONS {
            assert!(table.add(pair(), &ReqLimits::default(), &RespLimits::default()).is_some());
        }
        assert!(table.is_full());
        assert!(table.add(pair(), &ReqLimits::default(), &RespLimits::default()).is_none());
    }
}
