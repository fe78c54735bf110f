//! Test utilities: an in-memory descriptor table.
//!
//! Resolution is a pure function over a [`DescriptorTable`], so tests build
//! a synthetic process state here instead of depending on the real one.

use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::io;
use std::mem::size_of;
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::kctl::{AF_SYS_CONTROL, AF_SYSTEM, SockaddrCtl};
use crate::table::DescriptorTable;

#[derive(Debug, Clone, Copy)]
enum Entry {
    /// Open descriptor that is not a socket (pipe, file, ...).
    NonSocket,
    /// Socket of some unrelated family.
    Socket { family: i32 },
    /// Bound kernel-control socket.
    Control { id: u32, unit: u32 },
}

/// In-memory descriptor table.
///
/// Populated builder-style; descriptors not mentioned behave like closed
/// table slots. Query counters let tests assert that malformed input short-
/// circuits the scan and that the control identity is looked up exactly once.
#[derive(Debug, Default)]
pub struct FakeTable {
    limit: RawFd,
    entries: HashMap<RawFd, Entry>,
    controls: HashMap<CString, u32>,
    lookups: AtomicUsize,
    family_queries: AtomicUsize,
}

impl FakeTable {
    pub fn new(limit: RawFd) -> Self {
        FakeTable {
            limit,
            ..Default::default()
        }
    }

    /// Add an open non-socket descriptor (pipe, file, ...).
    pub fn with_non_socket(mut self, fd: RawFd) -> Self {
        self.entries.insert(fd, Entry::NonSocket);
        self
    }

    /// Add a socket of an unrelated family.
    pub fn with_socket(mut self, fd: RawFd, family: i32) -> Self {
        self.entries.insert(fd, Entry::Socket { family });
        self
    }

    /// Add a bound kernel-control socket.
    pub fn with_control_socket(mut self, fd: RawFd, id: u32, unit: u32) -> Self {
        self.entries.insert(fd, Entry::Control { id, unit });
        self
    }

    /// Register a named control protocol, as the kernel would at
    /// registration time.
    pub fn register_control(mut self, name: &CStr, id: u32) -> Self {
        self.controls.insert(name.to_owned(), id);
        self
    }

    /// Number of name-to-id lookups issued so far.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Number of per-descriptor family queries issued so far.
    pub fn family_query_count(&self) -> usize {
        self.family_queries.load(Ordering::Relaxed)
    }
}

impl DescriptorTable for FakeTable {
    fn descriptor_limit(&self) -> RawFd {
        self.limit
    }

    fn socket_family(&self, fd: RawFd) -> Option<i32> {
        self.family_queries.fetch_add(1, Ordering::Relaxed);
        match self.entries.get(&fd)? {
            Entry::NonSocket => None,
            Entry::Socket { family } => Some(*family),
            Entry::Control { .. } => Some(AF_SYSTEM as i32),
        }
    }

    fn control_bound_address(&self, fd: RawFd) -> Option<SockaddrCtl> {
        match self.entries.get(&fd)? {
            Entry::Control { id, unit } => Some(SockaddrCtl {
                sc_len: size_of::<SockaddrCtl>() as u8,
                sc_family: AF_SYSTEM,
                ss_sysaddr: AF_SYS_CONTROL,
                sc_id: *id,
                sc_unit: *unit,
                sc_reserved: [0; 5],
            }),
            _ => None,
        }
    }

    fn control_id_by_name(&self, name: &CStr) -> io::Result<u32> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.controls.get(name).copied().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "control protocol not registered")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_fd_is_closed_slot() {
        let table = FakeTable::new(8);
        assert_eq!(table.socket_family(3), None);
        assert!(table.control_bound_address(3).is_none());
    }

    #[test]
    fn test_control_socket_address() {
        let table = FakeTable::new(8).with_control_socket(5, 42, 7);
        let addr = table.control_bound_address(5).unwrap();
        assert_eq!(addr.sc_family, AF_SYSTEM);
        assert_eq!(addr.ss_sysaddr, AF_SYS_CONTROL);
        assert_eq!(addr.sc_id, 42);
        assert_eq!(addr.sc_unit, 7);
    }

    #[test]
    fn test_non_socket_has_no_family() {
        let table = FakeTable::new(8).with_non_socket(3);
        assert_eq!(table.socket_family(3), None);
        assert_eq!(table.family_query_count(), 1);
    }
}
