//! Cryptographic Utilities

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Compute SHA-256 hash
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute HMAC-SHA256 with a key of any length
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    // HMAC accepts keys of any size, so `new_from_slice` cannot fail here.
    match HmacSha256::new_from_slice(key) {
        Ok(mut mac) => {
            mac.update(data);
            mac.finalize().into_bytes().into()
        }
        Err(_) => sha256(data),
    }
}

/// Constant-time comparison to prevent timing attacks
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Canonical form of an account identifier (e.g. an email address)
///
/// NFKC, trimmed, lowercased.
pub fn normalize_identifier(raw: &str) -> String {
    raw.trim().nfkc().collect::<String>().to_lowercase()
}

/// Privacy-preserving identifier hashing
///
/// Rate-limit keys must never contain the raw account identifier. With a
/// key configured the digest is an HMAC, so stored keys cannot be reversed
/// by hashing a dictionary of known emails.
#[derive(Clone, Default)]
pub struct IdentifierHasher {
    key: Option<Zeroizing<Vec<u8>>>,
}

impl IdentifierHasher {
    /// Plain SHA-256 hasher
    pub fn unkeyed() -> Self {
        Self { key: None }
    }

    /// HMAC-SHA256 hasher; an empty key falls back to plain SHA-256
    pub fn keyed(key: &[u8]) -> Self {
        Self {
            key: (!key.is_empty()).then(|| Zeroizing::new(key.to_vec())),
        }
    }

    pub fn is_keyed(&self) -> bool {
        self.key.is_some()
    }

    /// Lowercase hex digest of the normalized identifier
    pub fn hash(&self, raw: &str) -> String {
        let normalized = normalize_identifier(raw);
        let digest = match &self.key {
            Some(key) => hmac_sha256(key, normalized.as_bytes()),
            None => sha256(normalized.as_bytes()),
        };
        hex::encode(digest)
    }
}

impl std::fmt::Debug for IdentifierHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentifierHasher")
            .field("keyed", &self.is_keyed())
            .finish()
    }
}
