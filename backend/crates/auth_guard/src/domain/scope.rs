//! Counter scopes

use std::fmt;

/// Namespace of a counter or lock key
///
/// The persisted tag is part of the store's primary key; renaming a
/// variant's tag orphans existing rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Keyed by client IP address
    Ip,
    /// Keyed by hashed account identifier
    Identifier,
}

impl Scope {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Scope::Ip => "ip",
            Scope::Identifier => "id",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persisted_tags() {
        assert_eq!(Scope::Ip.as_str(), "ip");
        assert_eq!(Scope::Identifier.as_str(), "id");
        assert_eq!(Scope::Identifier.to_string(), "id");
    }
}
