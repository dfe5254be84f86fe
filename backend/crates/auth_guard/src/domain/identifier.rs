//! Identifier keys

use std::fmt;

use platform::crypto::IdentifierHasher;

use crate::error::{GuardError, GuardResult};

/// Store key derived from an account identifier (e.g. email)
///
/// Always the hex digest of the normalized identifier, so raw emails never
/// reach the attempt store or the logs.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct IdentifierKey(String);

impl IdentifierKey {
    /// Normalize and hash a raw identifier
    ///
    /// # Errors
    /// `InvalidRequest` when nothing remains after normalization.
    pub fn derive(hasher: &IdentifierHasher, raw: &str) -> GuardResult<Self> {
        if raw.trim().is_empty() {
            return Err(GuardError::InvalidRequest(
                "identifier must not be empty".to_string(),
            ));
        }
        Ok(Self(hasher.hash(raw)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Debug for IdentifierKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentifierKey({}…)", self.short())
    }
}

impl fmt::Display for IdentifierKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_variants_share_a_key() {
        let hasher = IdentifierHasher::unkeyed();
        let a = IdentifierKey::derive(&hasher, "Alice@Example.com").unwrap();
        let b = IdentifierKey::derive(&hasher, "  alice@example.com ").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_does_not_contain_raw_identifier() {
        let hasher = IdentifierHasher::unkeyed();
        let key = IdentifierKey::derive(&hasher, "alice@example.com").unwrap();
        assert!(!key.as_str().contains("alice"));
        assert_eq!(key.as_str().len(), 64);
        assert_eq!(key.short().len(), 12);
    }

    #[test]
    fn test_blank_identifier_rejected() {
        let hasher = IdentifierHasher::unkeyed();
        let err = IdentifierKey::derive(&hasher, "   ").unwrap_err();
        assert!(matches!(err, GuardError::InvalidRequest(_)));
    }
}
