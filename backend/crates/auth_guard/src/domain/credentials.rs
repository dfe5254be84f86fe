//! Credentials and provider outcomes

use std::fmt;

use zeroize::Zeroizing;

/// Credentials forwarded verbatim to the authentication provider
pub struct Credentials {
    pub email: String,
    pub password: Zeroizing<String>,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: Zeroizing::new(password.into()),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &"<redacted>")
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What the authentication provider said about the credentials
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderOutcome {
    /// Accepted; carries the provider's response body (session, user, ...)
    Authenticated(serde_json::Value),
    /// Refused the credentials (wrong password, unknown account, duplicate sign-up)
    Rejected { status: u16 },
}

impl ProviderOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, ProviderOutcome::Authenticated(_))
    }
}
