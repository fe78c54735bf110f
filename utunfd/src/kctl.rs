//! Kernel-control socket ABI.
//!
//! Control sockets are the kernel's named channel between user processes and
//! kernel subsystems. A protocol is registered under a textual name; the
//! kernel assigns it a numeric id at registration time, so the id must be
//! looked up per process, never hard-coded. The records below are fixed
//! binary contracts; field order and widths must match the kernel exactly.

use std::ffi::CStr;

/// ioctl request code for looking up a control protocol's id by name.
pub const CTLIOCGINFO: libc::c_ulong = 0xc064_4e03;

/// Address family of kernel-control sockets.
pub const AF_SYSTEM: u8 = 32;

/// Protocol selecting the kernel-control layer on an `AF_SYSTEM` socket.
pub const SYSPROTO_CONTROL: libc::c_int = 2;

/// `ss_sysaddr` value tagging a control-socket address.
pub const AF_SYS_CONTROL: u16 = 2;

/// Registered name of the tunnel-control protocol.
pub const UTUN_CONTROL_NAME: &CStr = c"com.apple.net.utun_control";

/// Socket option returning the interface name bound to a utun control socket.
pub const UTUN_OPT_IFNAME: libc::c_int = 2;

/// Fixed textual prefix of tunnel interface names.
pub const UTUN_PREFIX: &str = "utun";

/// Offset between an interface name's numeric suffix and its control unit:
/// `utun<N>` is bound to unit `N + 1`. Unit 0 in a bind request asks the
/// kernel to pick the next free unit, so assigned units start at 1.
pub const UTUN_UNIT_OFFSET: u32 = 1;

/// Length of the `ctl_name` field in [`CtlInfo`].
pub const MAX_KCTL_NAME: usize = 96;

/// Control-info record exchanged with the `CTLIOCGINFO` ioctl: a 32-bit id
/// followed by a fixed 96-byte null-terminated name.
#[repr(C)]
pub struct CtlInfo {
    pub ctl_id: u32,
    pub ctl_name: [u8; MAX_KCTL_NAME],
}

impl CtlInfo {
    /// Prepare a query record for the given control protocol name.
    ///
    /// Returns `None` if the name (with its terminator) does not fit the
    /// fixed-length field.
    pub fn for_name(name: &CStr) -> Option<Self> {
        let bytes = name.to_bytes_with_nul();
        if bytes.len() > MAX_KCTL_NAME {
            return None;
        }
        let mut info = CtlInfo {
            ctl_id: 0,
            ctl_name: [0; MAX_KCTL_NAME],
        };
        info.ctl_name[..bytes.len()].copy_from_slice(bytes);
        Some(info)
    }
}

/// Bound address of a kernel-control socket.
///
/// Widths per the kernel definition: length byte, family byte, 16-bit
/// subsystem tag, 32-bit control id, 32-bit unit number, 5x32-bit reserved.
/// Multi-byte fields are native byte order, as the kernel fills them.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SockaddrCtl {
    pub sc_len: u8,
    pub sc_family: u8,
    pub ss_sysaddr: u16,
    pub sc_id: u32,
    pub sc_unit: u32,
    pub sc_reserved: [u32; 5],
}

impl SockaddrCtl {
    pub const fn zeroed() -> Self {
        SockaddrCtl {
            sc_len: 0,
            sc_family: 0,
            ss_sysaddr: 0,
            sc_id: 0,
            sc_unit: 0,
            sc_reserved: [0; 5],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    #[test]
    fn test_sockaddr_ctl_layout() {
        assert_eq!(size_of::<SockaddrCtl>(), 32);
        assert_eq!(align_of::<SockaddrCtl>(), 4);
    }

    #[test]
    fn test_ctl_info_layout() {
        assert_eq!(size_of::<CtlInfo>(), 100);
    }

    #[test]
    fn test_ctl_info_for_name() {
        let info = CtlInfo::for_name(UTUN_CONTROL_NAME).unwrap();
        assert_eq!(info.ctl_id, 0);
        assert_eq!(
            &info.ctl_name[..UTUN_CONTROL_NAME.to_bytes_with_nul().len()],
            UTUN_CONTROL_NAME.to_bytes_with_nul()
        );
        assert_eq!(info.ctl_name[MAX_KCTL_NAME - 1], 0);
    }

    #[test]
    fn test_ctl_info_name_too_long() {
        let long = std::ffi::CString::new("x".repeat(MAX_KCTL_NAME)).unwrap();
        assert!(CtlInfo::for_name(&long).is_none());
    }
}
