//! CIDR Matching
//!
//! Membership of an address in an IPv4/IPv6 block, computed on fixed-width
//! integers (`u32` / `u128`) under an explicit prefix mask so that any prefix
//! length, byte-aligned or not, is compared bit for bit.
//!
//! Malformed input never panics and never errors at the [`is_ip_in_cidr`]
//! boundary: it simply does not match.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Why a CIDR string was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CidrParseError {
    #[error("missing '/' prefix separator")]
    MissingPrefix,

    #[error("invalid network address: {0}")]
    InvalidAddress(String),

    #[error("invalid prefix length: {0}")]
    InvalidPrefix(String),

    #[error("prefix length {prefix} exceeds {max} for this address family")]
    PrefixOutOfRange { prefix: u32, max: u8 },
}

/// A network block in `address/prefix` form
///
/// The stored network address may carry host bits (`10.1.2.3/8` is accepted);
/// they are masked away on every comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CidrBlock {
    network: IpAddr,
    prefix_len: u8,
}

impl CidrBlock {
    /// Create a block, rejecting prefix lengths wider than the address family
    pub fn new(network: IpAddr, prefix_len: u8) -> Option<Self> {
        (prefix_len <= max_prefix_len(&network)).then_some(Self {
            network,
            prefix_len,
        })
    }

    /// Compile-time constructor for the built-in range tables.
    pub(crate) const fn from_parts(network: IpAddr, prefix_len: u8) -> Self {
        Self {
            network,
            prefix_len,
        }
    }

    pub fn network(&self) -> IpAddr {
        self.network
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// `true` iff `ip` is the same family as the block and agrees with the
    /// network address on every one of the leading `prefix_len` bits.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(addr)) => {
                let mask = v4_mask(self.prefix_len);
                (u32::from(*addr) & mask) == (u32::from(net) & mask)
            }
            (IpAddr::V6(net), IpAddr::V6(addr)) => {
                let mask = v6_mask(self.prefix_len);
                (u128::from(*addr) & mask) == (u128::from(net) & mask)
            }
            _ => false,
        }
    }
}

impl FromStr for CidrBlock {
    type Err = CidrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = s
            .trim()
            .split_once('/')
            .ok_or(CidrParseError::MissingPrefix)?;

        let network =
            parse_ip(addr).ok_or_else(|| CidrParseError::InvalidAddress(addr.to_string()))?;

        // Digits only: rejects "-1", "+8", " 8" and the like before `parse`
        // gets a chance to be lenient about signs.
        if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CidrParseError::InvalidPrefix(prefix.to_string()));
        }
        let value: u32 = prefix
            .parse()
            .map_err(|_| CidrParseError::InvalidPrefix(prefix.to_string()))?;

        let max = max_prefix_len(&network);
        if value > u32::from(max) {
            return Err(CidrParseError::PrefixOutOfRange { prefix: value, max });
        }
        let prefix_len = u8::try_from(value)
            .map_err(|_| CidrParseError::PrefixOutOfRange { prefix: value, max })?;

        Ok(Self {
            network,
            prefix_len,
        })
    }
}

impl fmt::Display for CidrBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

/// Parse a textual IPv4 or IPv6 address
///
/// Surrounding whitespace is ignored. An IPv6 zone suffix (`fe80::1%eth0`)
/// is stripped; an empty zone (`fe80::1%`) is rejected.
pub fn parse_ip(s: &str) -> Option<IpAddr> {
    let s = s.trim();
    if s.contains(':') {
        let addr = match s.split_once('%') {
            Some((addr, zone)) if !zone.is_empty() => addr,
            Some(_) => return None,
            None => s,
        };
        addr.parse::<Ipv6Addr>().ok().map(IpAddr::V6)
    } else {
        s.parse::<Ipv4Addr>().ok().map(IpAddr::V4)
    }
}

/// Test whether `ip` lies inside `cidr`
///
/// Returns `false` for any malformed input: unparsable address or network,
/// missing/non-numeric/out-of-range prefix, or mismatched address families.
pub fn is_ip_in_cidr(ip: &str, cidr: &str) -> bool {
    let Some(addr) = parse_ip(ip) else {
        return false;
    };
    match cidr.parse::<CidrBlock>() {
        Ok(block) => block.contains(&addr),
        Err(_) => false,
    }
}

/// Parse a comma-separated CIDR list
///
/// Invalid entries are logged and skipped.
pub fn parse_cidr_list(list: &str) -> Vec<CidrBlock> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match entry.parse::<CidrBlock>() {
            Ok(block) => Some(block),
            Err(e) => {
                tracing::warn!(entry = %entry, error = %e, "Ignoring invalid CIDR entry");
                None
            }
        })
        .collect()
}

fn max_prefix_len(ip: &IpAddr) -> u8 {
    match ip {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

/// `prefix_len` leading one-bits; `/0` is the empty mask.
fn v4_mask(prefix_len: u8) -> u32 {
    u32::MAX
        .checked_shl(32u32.saturating_sub(u32::from(prefix_len)))
        .unwrap_or(0)
}

fn v6_mask(prefix_len: u8) -> u128 {
    u128::MAX
        .checked_shl(128u32.saturating_sub(u32::from(prefix_len)))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v6(bits: u128) -> String {
        Ipv6Addr::from(bits).to_string()
    }

    fn v4(bits: u32) -> String {
        Ipv4Addr::from(bits).to_string()
    }

    #[test]
    fn test_masks() {
        assert_eq!(v4_mask(0), 0);
        assert_eq!(v4_mask(1), 0x8000_0000);
        assert_eq!(v4_mask(20), 0xFFFF_F000);
        assert_eq!(v4_mask(32), u32::MAX);
        assert_eq!(v6_mask(0), 0);
        assert_eq!(v6_mask(65), !0u128 << 63);
        assert_eq!(v6_mask(128), u128::MAX);
    }

    #[test]
    fn test_ipv4_basic_membership() {
        assert!(is_ip_in_cidr("10.1.2.3", "10.0.0.0/8"));
        assert!(is_ip_in_cidr("172.31.255.255", "172.16.0.0/12"));
        assert!(!is_ip_in_cidr("172.32.0.0", "172.16.0.0/12"));
        assert!(is_ip_in_cidr("192.168.1.200", "192.168.1.128/25"));
        assert!(!is_ip_in_cidr("192.168.1.127", "192.168.1.128/25"));
    }

    #[test]
    fn test_ipv4_exact_host() {
        assert!(is_ip_in_cidr("203.0.113.7", "203.0.113.7/32"));
        assert!(!is_ip_in_cidr("203.0.113.6", "203.0.113.7/32"));
    }

    #[test]
    fn test_host_bits_in_network_are_ignored() {
        assert!(is_ip_in_cidr("10.200.0.1", "10.1.2.3/8"));
    }

    #[test]
    fn test_ipv6_exact_host() {
        assert!(is_ip_in_cidr("2001:db8::1", "2001:db8::1/128"));
        assert!(!is_ip_in_cidr("2001:db8::2", "2001:db8::1/128"));
    }

    #[test]
    fn test_zero_prefix_matches_whole_family() {
        for i in 0..2000u32 {
            let addr = i.wrapping_mul(2_654_435_761);
            assert!(is_ip_in_cidr(&v4(addr), "0.0.0.0/0"), "{}", v4(addr));
        }
        for i in 0..2000u128 {
            let addr = i.wrapping_mul(0x9E37_79B9_7F4A_7C15_F39C_C060_5CED_C835);
            assert!(is_ip_in_cidr(&v6(addr), "::/0"), "{}", v6(addr));
        }
    }

    #[test]
    fn test_zero_prefix_does_not_cross_families() {
        assert!(!is_ip_in_cidr("10.0.0.1", "::/0"));
        assert!(!is_ip_in_cidr("::1", "0.0.0.0/0"));
    }

    #[test]
    fn test_non_aligned_ipv6_boundaries() {
        // Same leading hextets, different bit 32
        assert!(is_ip_in_cidr("2001:db8:7fff::1", "2001:db8::/33"));
        assert!(!is_ip_in_cidr("2001:db8:8000::1", "2001:db8::/33"));

        // Same first four hextets, different bit 64
        assert!(is_ip_in_cidr("2001:db8::7fff:0:0:1", "2001:db8::/65"));
        assert!(!is_ip_in_cidr("2001:db8::8000:0:0:1", "2001:db8::/65"));
    }

    #[test]
    fn test_non_aligned_ipv4_boundaries() {
        assert!(is_ip_in_cidr("198.51.100.31", "198.51.100.0/27"));
        assert!(!is_ip_in_cidr("198.51.100.32", "198.51.100.0/27"));
        assert!(is_ip_in_cidr("10.0.15.255", "10.0.0.0/20"));
        assert!(!is_ip_in_cidr("10.0.16.0", "10.0.0.0/20"));
    }

    #[test]
    fn test_every_ipv6_prefix_is_bit_exact() {
        let base: u128 = 0x2001_0db8_85a3_1234_5678_9abc_def0_1357;
        for prefix in 1..=128u32 {
            let network = base & (u128::MAX << (128 - prefix));
            let cidr = format!("{}/{}", v6(network), prefix);
            let inside = network | !(u128::MAX.checked_shl(128 - prefix).unwrap_or(0));
            assert!(is_ip_in_cidr(&v6(inside), &cidr), "{cidr}");

            // Last network bit flipped: outside
            let outside = inside ^ (1u128 << (128 - prefix));
            assert!(!is_ip_in_cidr(&v6(outside), &cidr), "{cidr}");

            // First host bit flipped: still inside
            if prefix < 128 {
                let host_flip = inside ^ (1u128 << (127 - prefix));
                assert!(is_ip_in_cidr(&v6(host_flip), &cidr), "{cidr}");
            }
        }
    }

    #[test]
    fn test_every_ipv4_prefix_is_bit_exact() {
        let base: u32 = 0xC6_33_64_9B;
        for prefix in 1..=32u32 {
            let network = base & (u32::MAX << (32 - prefix));
            let cidr = format!("{}/{}", v4(network), prefix);
            let inside = network | !(u32::MAX.checked_shl(32 - prefix).unwrap_or(0));
            assert!(is_ip_in_cidr(&v4(inside), &cidr), "{cidr}");

            let outside = inside ^ (1u32 << (32 - prefix));
            assert!(!is_ip_in_cidr(&v4(outside), &cidr), "{cidr}");
        }
    }

    #[test]
    fn test_zone_suffix_is_stripped() {
        assert!(is_ip_in_cidr("fe80::1%eth0", "fe80::/10"));
        assert!(is_ip_in_cidr("fe80::1", "fe80::%eth0/10"));
        assert!(!is_ip_in_cidr("fe80::1%", "fe80::/10"));
    }

    #[test]
    fn test_ipv4_mapped_ipv6() {
        assert!(is_ip_in_cidr("::ffff:192.168.1.10", "::ffff:192.168.1.0/120"));
        assert!(!is_ip_in_cidr("::ffff:192.168.2.10", "::ffff:192.168.1.0/120"));
        // Family-exact: mapped form does not match a plain IPv4 block
        assert!(!is_ip_in_cidr("::ffff:192.168.1.10", "192.168.1.0/24"));
    }

    #[test]
    fn test_malformed_input_is_no_match() {
        assert!(!is_ip_in_cidr("not-an-ip", "10.0.0.0/8"));
        assert!(!is_ip_in_cidr("10.0.0.1", "10.0.0.0"));
        assert!(!is_ip_in_cidr("10.0.0.1", "10.0.0.0/"));
        assert!(!is_ip_in_cidr("10.0.0.1", "10.0.0.0/abc"));
        assert!(!is_ip_in_cidr("10.0.0.1", "10.0.0.0/-1"));
        assert!(!is_ip_in_cidr("10.0.0.1", "10.0.0.0/+8"));
        assert!(!is_ip_in_cidr("10.0.0.1", "10.0.0.0/33"));
        assert!(!is_ip_in_cidr("10.0.0.1", "10.0.0.0/99999999999"));
        assert!(!is_ip_in_cidr("::1", "::/129"));
        assert!(!is_ip_in_cidr("256.0.0.1", "0.0.0.0/0"));
        assert!(!is_ip_in_cidr("", "0.0.0.0/0"));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "10.0.0.0".parse::<CidrBlock>(),
            Err(CidrParseError::MissingPrefix)
        );
        assert_eq!(
            "10.0.0.0/40".parse::<CidrBlock>(),
            Err(CidrParseError::PrefixOutOfRange { prefix: 40, max: 32 })
        );
        assert!(matches!(
            "zzz/8".parse::<CidrBlock>(),
            Err(CidrParseError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_parse_cidr_list_skips_invalid_entries() {
        let blocks = parse_cidr_list("10.0.0.0/8, bogus, 2001:db8::/32,,192.168.0.0/33 ");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].to_string(), "10.0.0.0/8");
        assert_eq!(blocks[1].to_string(), "2001:db8::/32");
        assert!(parse_cidr_list("").is_empty());
    }

    #[test]
    fn test_new_rejects_wide_prefix() {
        assert!(CidrBlock::new("10.0.0.0".parse().unwrap(), 33).is_none());
        assert!(CidrBlock::new("::".parse().unwrap(), 128).is_some());
    }
}
