//! Resolution of a tunnel interface name to its raw control-socket
//! descriptor.
//!
//! The hosting framework brings the interface up and keeps the backing
//! descriptor to itself; what it does hand over is the interface name. The
//! descriptor is still in this process's table, bound to the tunnel-control
//! protocol under the unit number the name encodes, so one scan over the
//! table finds it.

use std::io;
use std::os::fd::{BorrowedFd, OwnedFd, RawFd};

use thiserror::Error;
use tracing::{debug, info};

use crate::kctl::{AF_SYSTEM, UTUN_CONTROL_NAME, UTUN_PREFIX, UTUN_UNIT_OFFSET};
use crate::table::DescriptorTable;

/// Resolution errors.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The interface name is not of the `utun<digits>` form.
    #[error("malformed tunnel interface name: {0}")]
    MalformedName(String),

    /// The name-to-id query for the tunnel-control protocol failed.
    #[error("tunnel-control protocol lookup failed: {0}")]
    LookupFailed(io::Error),

    /// The scan finished without a matching descriptor.
    #[error("no control socket bound for '{interface}' (unit {unit})")]
    NoCandidateFound { interface: String, unit: u32 },

    /// More than one descriptor matched; refusing to guess.
    #[error("descriptors {first} and {second} both match '{interface}'")]
    AmbiguousMatch {
        interface: String,
        first: RawFd,
        second: RawFd,
    },
}

pub type Result<T> = std::result::Result<T, ResolveError>;

/// Expected control unit for a tunnel interface name.
///
/// Strips [`UTUN_PREFIX`], parses the trailing digits, and applies
/// [`UTUN_UNIT_OFFSET`]. Pure and deterministic.
pub fn unit_number(interface: &str) -> Result<u32> {
    let digits = interface
        .strip_prefix(UTUN_PREFIX)
        .filter(|d| !d.is_empty() && d.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| ResolveError::MalformedName(interface.to_string()))?;
    digits
        .parse::<u32>()
        .ok()
        .and_then(|n| n.checked_add(UTUN_UNIT_OFFSET))
        .ok_or_else(|| ResolveError::MalformedName(interface.to_string()))
}

/// A descriptor resolved for a tunnel interface.
///
/// Carries the raw value only. The descriptor stays owned by whoever opened
/// it; it is never closed or retained here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDescriptor {
    pub fd: RawFd,
    pub interface: String,
}

impl ResolvedDescriptor {
    /// Duplicate the descriptor into an independently owned copy, leaving
    /// the framework-owned original untouched.
    pub fn try_clone_owned(&self) -> io::Result<OwnedFd> {
        let borrowed = unsafe { BorrowedFd::borrow_raw(self.fd) };
        borrowed.try_clone_to_owned()
    }
}

/// Find the raw descriptor backing the named tunnel interface.
///
/// Resolves the tunnel-control id once, then scans `[0, descriptor_limit)`
/// for kernel-control sockets whose bound address carries that id and the
/// unit derived from `interface`. Exactly one descriptor may match: zero
/// matches means the interface is not (yet) bound and two matches is an
/// invariant violation; both are reported, never papered over.
pub fn tunnel_descriptor<T: DescriptorTable>(
    table: &T,
    interface: &str,
) -> Result<ResolvedDescriptor> {
    let unit = unit_number(interface)?;
    let ctl_id = table
        .control_id_by_name(UTUN_CONTROL_NAME)
        .map_err(ResolveError::LookupFailed)?;

    debug!(interface, unit, ctl_id, "scanning descriptor table");

    let mut found: Option<RawFd> = None;
    for fd in 0..table.descriptor_limit() {
        if table.socket_family(fd) != Some(AF_SYSTEM as i32) {
            continue;
        }
        let Some(addr) = table.control_bound_address(fd) else {
            // closed behind our back between the two queries
            continue;
        };
        if addr.sc_id != ctl_id || addr.sc_unit != unit {
            continue;
        }
        debug!(fd, "matching control socket");
        match found {
            None => found = Some(fd),
            Some(first) => {
                return Err(ResolveError::AmbiguousMatch {
                    interface: interface.to_string(),
                    first,
                    second: fd,
                });
            }
        }
    }

    match found {
        Some(fd) => {
            info!(interface, fd, unit, "tunnel descriptor resolved");
            Ok(ResolvedDescriptor {
                fd,
                interface: interface.to_string(),
            })
        }
        None => Err(ResolveError::NoCandidateFound {
            interface: interface.to_string(),
            unit,
        }),
    }
}
