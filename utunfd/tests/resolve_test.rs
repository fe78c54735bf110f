use utunfd::kctl::UTUN_CONTROL_NAME;
use utunfd::resolve::{ResolveError, tunnel_descriptor};
use utunfd::test_util::FakeTable;

/// Kernel-assigned id used for the tunnel-control protocol in these tables.
const TUNNEL_CTL_ID: u32 = 17;

/// Id of some unrelated control protocol open in the same process.
const OTHER_CTL_ID: u32 = 23;

fn crowded_table() -> FakeTable {
    // A realistic tunnel-process table: stdio, a logging pipe, a plain TCP
    // socket, a foreign control socket, a tunnel control socket on another
    // unit, and the one we are after ("utun4" -> unit 5).
    FakeTable::new(256)
        .register_control(UTUN_CONTROL_NAME, TUNNEL_CTL_ID)
        .with_non_socket(0)
        .with_non_socket(1)
        .with_non_socket(2)
        .with_non_socket(3)
        .with_socket(5, libc::AF_INET)
        .with_control_socket(6, OTHER_CTL_ID, 1)
        .with_control_socket(7, TUNNEL_CTL_ID, 2)
        .with_control_socket(9, TUNNEL_CTL_ID, 5)
}

#[test]
fn test_resolves_single_match_among_noise() {
    let table = crowded_table();
    let resolved = tunnel_descriptor(&table, "utun4").expect("resolution failed");
    assert_eq!(resolved.fd, 9);
    assert_eq!(resolved.interface, "utun4");
}

#[test]
fn test_other_unit_resolves_independently() {
    let table = crowded_table();
    let resolved = tunnel_descriptor(&table, "utun1").expect("resolution failed");
    assert_eq!(resolved.fd, 7);
}

#[test]
fn test_no_control_sockets() {
    let table = FakeTable::new(64)
        .register_control(UTUN_CONTROL_NAME, TUNNEL_CTL_ID)
        .with_non_socket(3)
        .with_socket(4, libc::AF_INET6);
    assert!(matches!(
        tunnel_descriptor(&table, "utun4"),
        Err(ResolveError::NoCandidateFound { unit: 5, .. })
    ));
}

#[test]
fn test_duplicate_binding_is_refused() {
    let table = crowded_table().with_control_socket(12, TUNNEL_CTL_ID, 5);
    match tunnel_descriptor(&table, "utun4").unwrap_err() {
        ResolveError::AmbiguousMatch {
            first,
            second,
            interface,
        } => {
            assert_eq!((first, second), (9, 12));
            assert_eq!(interface, "utun4");
        }
        other => panic!("expected AmbiguousMatch, got {:?}", other),
    }
}

#[test]
fn test_unregistered_control_protocol() {
    let table = FakeTable::new(64).with_control_socket(9, TUNNEL_CTL_ID, 5);
    assert!(matches!(
        tunnel_descriptor(&table, "utun4"),
        Err(ResolveError::LookupFailed(_))
    ));
}
