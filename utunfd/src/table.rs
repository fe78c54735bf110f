//! Read-only view of a process's open-descriptor table.

use std::ffi::CStr;
use std::io;
use std::os::fd::RawFd;

use crate::kctl::SockaddrCtl;

/// Capability to enumerate and inspect the open descriptors of a process.
///
/// The descriptor table is process-wide state that unrelated code may mutate
/// concurrently; implementations answer `None` for descriptors that are
/// invalid, closed, or not of the requested kind, and never open, close, or
/// modify a descriptor they are asked about.
pub trait DescriptorTable {
    /// Upper bound (exclusive) of descriptor values to consider.
    fn descriptor_limit(&self) -> RawFd;

    /// Address family of the socket behind `fd`, or `None` if `fd` is not
    /// an open socket.
    fn socket_family(&self, fd: RawFd) -> Option<i32>;

    /// Bound local address of the control socket behind `fd`, or `None` if
    /// `fd` is not a bound kernel-control socket.
    fn control_bound_address(&self, fd: RawFd) -> Option<SockaddrCtl>;

    /// Kernel-assigned id of the named control protocol.
    fn control_id_by_name(&self, name: &CStr) -> io::Result<u32>;
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
pub use process::{ProcessTable, utun_name};

#[cfg(any(target_os = "macos", target_os = "ios"))]
mod process {
    use std::ffi::CStr;
    use std::io;
    use std::mem::size_of;
    use std::os::fd::{AsRawFd, BorrowedFd, RawFd};

    use nix::sys::socket::{AddressFamily, SockFlag, SockProtocol, SockType, socket};
    use tracing::debug;

    use super::DescriptorTable;
    use crate::kctl::{AF_SYSTEM, CTLIOCGINFO, CtlInfo, SockaddrCtl};

    /// Scan bound used if the resource-limit query itself fails
    /// (OPEN_MAX on this platform).
    const FALLBACK_DESCRIPTOR_LIMIT: RawFd = 10240;

    /// The calling process's real descriptor table.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct ProcessTable;

    impl DescriptorTable for ProcessTable {
        fn descriptor_limit(&self) -> RawFd {
            let mut rl = libc::rlimit {
                rlim_cur: 0,
                rlim_max: 0,
            };
            let ret = unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut rl) };
            if ret != 0 {
                return FALLBACK_DESCRIPTOR_LIMIT;
            }
            rl.rlim_cur.min(RawFd::MAX as libc::rlim_t) as RawFd
        }

        fn socket_family(&self, fd: RawFd) -> Option<i32> {
            let mut ss: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
            let mut len = size_of::<libc::sockaddr_storage>() as libc::socklen_t;
            let ret = unsafe {
                libc::getsockname(fd, &mut ss as *mut _ as *mut libc::sockaddr, &mut len)
            };
            // EBADF, ENOTSOCK and friends all mean "not a candidate"
            if ret != 0 {
                return None;
            }
            Some(ss.ss_family as i32)
        }

        fn control_bound_address(&self, fd: RawFd) -> Option<SockaddrCtl> {
            let mut addr = SockaddrCtl::zeroed();
            let mut len = size_of::<SockaddrCtl>() as libc::socklen_t;
            let ret = unsafe {
                libc::getsockname(
                    fd,
                    &mut addr as *mut SockaddrCtl as *mut libc::sockaddr,
                    &mut len,
                )
            };
            if ret != 0 || (len as usize) < size_of::<SockaddrCtl>() {
                return None;
            }
            if addr.sc_family != AF_SYSTEM {
                return None;
            }
            Some(addr)
        }

        fn control_id_by_name(&self, name: &CStr) -> io::Result<u32> {
            let mut info = CtlInfo::for_name(name).ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "control name too long")
            })?;

            // OwnedFd: the lookup socket is released on every path out
            let fd = socket(
                AddressFamily::System,
                SockType::Datagram,
                SockFlag::empty(),
                SockProtocol::KextControl,
            )?;

            let ret = unsafe { libc::ioctl(fd.as_raw_fd(), CTLIOCGINFO, &mut info) };
            if ret != 0 {
                return Err(io::Error::last_os_error());
            }

            debug!(id = info.ctl_id, "control protocol id resolved");
            Ok(info.ctl_id)
        }
    }

    /// Interface name the kernel reports for a bound utun control socket.
    pub fn utun_name(fd: RawFd) -> io::Result<String> {
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        let name =
            nix::sys::socket::getsockopt(&borrowed, nix::sys::socket::sockopt::UtunIfname)?;
        name.into_string()
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "interface name is not UTF-8"))
    }
}
