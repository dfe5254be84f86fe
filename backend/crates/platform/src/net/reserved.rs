//! Private and Reserved Ranges
//!
//! Addresses that can never identify a distinct public client. A forwarded
//! client address landing in one of these blocks is either a misconfigured
//! proxy chain or a spoofing attempt.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::cidr::CidrBlock;

const fn v4(a: u8, b: u8, c: u8, d: u8, prefix_len: u8) -> CidrBlock {
    CidrBlock::from_parts(IpAddr::V4(Ipv4Addr::new(a, b, c, d)), prefix_len)
}

const fn v6(segments: [u16; 8], prefix_len: u8) -> CidrBlock {
    let [a, b, c, d, e, f, g, h] = segments;
    CidrBlock::from_parts(IpAddr::V6(Ipv6Addr::new(a, b, c, d, e, f, g, h)), prefix_len)
}

const RESERVED_V4: [CidrBlock; 14] = [
    v4(0, 0, 0, 0, 8),       // "this network", includes unspecified
    v4(10, 0, 0, 0, 8),      // RFC 1918
    v4(100, 64, 0, 0, 10),   // shared address space (CGNAT)
    v4(127, 0, 0, 0, 8),     // loopback
    v4(169, 254, 0, 0, 16),  // link-local
    v4(172, 16, 0, 0, 12),   // RFC 1918
    v4(192, 0, 0, 0, 24),    // IETF protocol assignments
    v4(192, 0, 2, 0, 24),    // TEST-NET-1
    v4(192, 168, 0, 0, 16),  // RFC 1918
    v4(198, 18, 0, 0, 15),   // benchmarking
    v4(198, 51, 100, 0, 24), // TEST-NET-2
    v4(203, 0, 113, 0, 24),  // TEST-NET-3
    v4(224, 0, 0, 0, 4),     // multicast
    v4(240, 0, 0, 0, 4),     // reserved, includes broadcast
];

const RESERVED_V6: [CidrBlock; 5] = [
    v6([0, 0, 0, 0, 0, 0, 0, 0], 128), // unspecified
    v6([0, 0, 0, 0, 0, 0, 0, 1], 128), // loopback
    v6([0xfe80, 0, 0, 0, 0, 0, 0, 0], 10), // link-local
    v6([0xfc00, 0, 0, 0, 0, 0, 0, 0], 7),  // unique local
    v6([0xff00, 0, 0, 0, 0, 0, 0, 0], 8),  // multicast
];

/// `true` if `ip` is private, loopback, link-local, multicast, unspecified
/// or otherwise reserved
///
/// IPv4-mapped IPv6 addresses are classified by their embedded IPv4 address.
pub fn is_private_or_reserved(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(_) => RESERVED_V4.iter().any(|block| block.contains(ip)),
        IpAddr::V6(v6_addr) => match v6_addr.to_ipv4_mapped() {
            Some(mapped) => is_private_or_reserved(&IpAddr::V4(mapped)),
            None => RESERVED_V6.iter().any(|block| block.contains(ip)),
        },
    }
}
