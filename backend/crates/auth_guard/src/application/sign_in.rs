//! Sign In Use Case
//!
//! Gate the attempt, then forward the credentials to the authentication
//! provider and feed the outcome back into the rate limiter.

use std::net::IpAddr;
use std::sync::Arc;

use platform::crypto::IdentifierHasher;

use crate::application::rate_limiter::RateLimiter;
use crate::domain::credentials::{Credentials, ProviderOutcome};
use crate::domain::identifier::IdentifierKey;
use crate::domain::repository::{AttemptStore, Authenticator};
use crate::domain::verdict::{DenyReason, Verdict};
use crate::error::GuardResult;

/// Sign in input
pub struct SignInInput {
    pub credentials: Credentials,
    /// Resolved client address (`None` when untrusted or unknown)
    pub client_ip: Option<IpAddr>,
}

/// Result of a gated attempt
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// Gate refused; the provider was not called
    Denied {
        reason: DenyReason,
        retry_after_secs: u64,
    },
    /// Provider refused the credentials
    Rejected,
    /// Provider accepted; carries its response body
    Authenticated(serde_json::Value),
}

impl AttemptOutcome {
    pub(crate) fn from_denial(verdict: Verdict) -> Option<Self> {
        match verdict {
            Verdict::Allowed => None,
            Verdict::Denied {
                reason,
                retry_after_secs,
            } => Some(AttemptOutcome::Denied {
                reason,
                retry_after_secs,
            }),
        }
    }
}

/// Sign in use case
pub struct SignInUseCase<S, A>
where
    S: AttemptStore,
    A: Authenticator,
{
    limiter: RateLimiter<S>,
    authenticator: Arc<A>,
    hasher: Arc<IdentifierHasher>,
}

impl<S, A> SignInUseCase<S, A>
where
    S: AttemptStore + Sync,
    A: Authenticator + Sync,
{
    pub fn new(
        limiter: RateLimiter<S>,
        authenticator: Arc<A>,
        hasher: Arc<IdentifierHasher>,
    ) -> Self {
        Self {
            limiter,
            authenticator,
            hasher,
        }
    }

    pub async fn execute(&self, input: SignInInput) -> GuardResult<AttemptOutcome> {
        let identifier = IdentifierKey::derive(&self.hasher, &input.credentials.email)?;

        // Gate first: credentials never reach the provider on deny or error
        let verdict = self
            .limiter
            .check_and_consume(input.client_ip, &identifier)
            .await?;
        if let Some(denied) = AttemptOutcome::from_denial(verdict) {
            return Ok(denied);
        }

        match self.authenticator.sign_in(&input.credentials).await? {
            ProviderOutcome::Authenticated(body) => {
                // The user is authenticated at this point; failing to clear
                // counters only delays forgiveness.
                if let Err(e) = self.limiter.record_success(&identifier).await {
                    tracing::error!(
                        error = %e,
                        identifier = identifier.short(),
                        "Failed to reset identifier counters after sign-in"
                    );
                }
                tracing::info!(identifier = identifier.short(), "Sign-in succeeded");
                Ok(AttemptOutcome::Authenticated(body))
            }
            ProviderOutcome::Rejected { status } => {
                self.limiter
                    .record_failure(input.client_ip, &identifier)
                    .await?;
                tracing::info!(
                    identifier = identifier.short(),
                    provider_status = status,
                    "Sign-in rejected by provider"
                );
                Ok(AttemptOutcome::Rejected)
            }
        }
    }
}
