//! Client identification behind proxies
//!
//! Decides which source address may be used to identify a client. Proxy
//! headers (`cf-connecting-ip`, `x-forwarded-for`) are attacker-controlled
//! unless the request provably came through a configured intermediary:
//!
//! 1. the verified peer address is inside a trusted CIDR block, or
//! 2. the request carries the pre-shared proxy secret header.
//!
//! Without provenance the peer address is used as-is. The resolver never
//! fails; every doubtful case collapses to the peer address or `None`.

use http::HeaderMap;
use http::header::HeaderName;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use zeroize::Zeroizing;

use crate::crypto::constant_time_eq;
use crate::net::{CidrBlock, is_private_or_reserved, parse_ip};

/// Default header carrying the pre-shared proxy secret
pub const DEFAULT_SECRET_HEADER: &str = "x-proxy-verified";

const CF_CONNECTING_IP: &str = "cf-connecting-ip";
const CF_RAY: &str = "cf-ray";
const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Which proxy header, if any, carries the client address
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProxyMode {
    /// Cloudflare: `cf-connecting-ip`, corroborated by `cf-ray`
    Cloudflare,
    /// Generic reverse proxy chain: `x-forwarded-for`
    Xff,
    /// Headers are never consulted
    #[default]
    None,
}

/// Unknown proxy mode name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown proxy mode: {0} (expected cloudflare, xff or none)")]
pub struct UnknownProxyMode(pub String);

impl FromStr for ProxyMode {
    type Err = UnknownProxyMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cloudflare" => Ok(ProxyMode::Cloudflare),
            "xff" => Ok(ProxyMode::Xff),
            "" | "none" => Ok(ProxyMode::None),
            other => Err(UnknownProxyMode(other.to_string())),
        }
    }
}

/// Proxy trust configuration
///
/// Built once from configuration and shared read-only by every request.
#[derive(Clone)]
pub struct TrustConfig {
    pub mode: ProxyMode,
    /// Number of trusted proxies appending to `x-forwarded-for`
    pub trusted_hops: usize,
    /// Accept private/reserved addresses extracted from proxy headers
    pub allow_private_ips: bool,
    pub trusted_cidrs: Vec<CidrBlock>,
    pub shared_secret: Option<Zeroizing<String>>,
    pub secret_header_name: HeaderName,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            mode: ProxyMode::None,
            trusted_hops: 0,
            allow_private_ips: false,
            trusted_cidrs: Vec::new(),
            shared_secret: None,
            secret_header_name: HeaderName::from_static(DEFAULT_SECRET_HEADER),
        }
    }
}

impl fmt::Debug for TrustConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustConfig")
            .field("mode", &self.mode)
            .field("trusted_hops", &self.trusted_hops)
            .field("allow_private_ips", &self.allow_private_ips)
            .field("trusted_cidrs", &self.trusted_cidrs)
            .field("shared_secret", &self.secret().map(|_| "<redacted>"))
            .field("secret_header_name", &self.secret_header_name)
            .finish()
    }
}

impl TrustConfig {
    /// Whether any provenance mechanism is configured at all
    pub fn has_provenance_source(&self) -> bool {
        !self.trusted_cidrs.is_empty() || self.secret().is_some()
    }

    fn secret(&self) -> Option<&str> {
        self.shared_secret
            .as_deref()
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Resolve the client address for a request
///
/// ## Arguments
/// * `headers` - HTTP request headers
/// * `peer_ip` - Address of the directly connected peer, if known
/// * `config` - Proxy trust configuration
///
/// ## Returns
/// The client address to use for rate limiting, or `None` when no
/// trustworthy address can be determined.
pub fn resolve_client_ip(
    headers: &HeaderMap,
    peer_ip: Option<IpAddr>,
    config: &TrustConfig,
) -> Option<IpAddr> {
    if config.mode == ProxyMode::None {
        return peer_ip;
    }

    if !has_verified_provenance(headers, peer_ip, config) {
        if headers.contains_key(CF_CONNECTING_IP) || headers.contains_key(X_FORWARDED_FOR) {
            tracing::debug!(
                peer_ip = ?peer_ip,
                mode = ?config.mode,
                "Ignoring proxy headers without verified provenance"
            );
        }
        return peer_ip;
    }

    let candidate = match config.mode {
        ProxyMode::Cloudflare => match cloudflare_client_ip(headers) {
            Some(ip) => ip,
            None => return peer_ip,
        },
        ProxyMode::Xff => xff_client_ip(headers, config.trusted_hops)?,
        ProxyMode::None => return peer_ip,
    };

    if !config.allow_private_ips && is_private_or_reserved(&candidate) {
        tracing::debug!(
            candidate = %candidate,
            "Rejecting private or reserved forwarded address"
        );
        return None;
    }

    Some(candidate)
}

/// Proof that proxy headers came from a configured intermediary
fn has_verified_provenance(
    headers: &HeaderMap,
    peer_ip: Option<IpAddr>,
    config: &TrustConfig,
) -> bool {
    if let Some(peer) = peer_ip {
        // A dual-stack listener reports IPv4 peers as ::ffff:a.b.c.d
        let canonical = peer.to_canonical();
        if config
            .trusted_cidrs
            .iter()
            .any(|block| block.contains(&peer) || block.contains(&canonical))
        {
            return true;
        }
    }

    match (config.secret(), headers.get(&config.secret_header_name)) {
        (Some(secret), Some(value)) => constant_time_eq(value.as_bytes(), secret.as_bytes()),
        _ => false,
    }
}

/// `cf-connecting-ip`, only when a `cf-ray` header is also present
fn cloudflare_client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    if !headers.contains_key(CF_RAY) {
        return None;
    }
    headers
        .get(CF_CONNECTING_IP)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_ip)
}

/// The first hop beyond the trusted proxy chain
///
/// Entries are read in order across all `x-forwarded-for` header lines;
/// unparsable entries are dropped before indexing.
fn xff_client_ip(headers: &HeaderMap, trusted_hops: usize) -> Option<IpAddr> {
    let hops: Vec<IpAddr> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(parse_ip)
        .collect();

    let index = hops.len().checked_sub(1)?.checked_sub(trusted_hops)?;
    hops.get(index).copied()
}
