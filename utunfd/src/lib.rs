//! Raw descriptor resolution for kernel-control tunnel interfaces.
//!
//! A sandboxed packet-tunnel process is handed an opaque packet-relay handle
//! by its hosting framework; the kernel descriptor backing the virtual
//! interface is hidden. Given the interface name, this crate scans the
//! process's own descriptor table for the one kernel-control socket bound to
//! the tunnel-control protocol under the matching unit number and hands back
//! its raw descriptor for direct packet I/O.

pub mod kctl;
pub mod resolve;
pub mod table;
pub mod test_util;
