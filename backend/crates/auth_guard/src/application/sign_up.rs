//! Sign Up Use Case
//!
//! Sign-up consumes the same gate as sign-in. A provider rejection (e.g.
//! duplicate account) is not a credential failure and is not recorded.

use std::net::IpAddr;
use std::sync::Arc;

use platform::crypto::IdentifierHasher;

use crate::application::rate_limiter::RateLimiter;
use crate::application::sign_in::AttemptOutcome;
use crate::domain::credentials::{Credentials, ProviderOutcome};
use crate::domain::identifier::IdentifierKey;
use crate::domain::repository::{AttemptStore, Authenticator};
use crate::error::GuardResult;

/// Sign up input
pub struct SignUpInput {
    pub credentials: Credentials,
    pub client_ip: Option<IpAddr>,
}

/// Sign up use case
pub struct SignUpUseCase<S, A>
where
    S: AttemptStore,
    A: Authenticator,
{
    limiter: RateLimiter<S>,
    authenticator: Arc<A>,
    hasher: Arc<IdentifierHasher>,
}

impl<S, A> SignUpUseCase<S, A>
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

    pub async fn execute(&self, input: SignUpInput) -> GuardResult<AttemptOutcome> {
        let identifier = IdentifierKey::derive(&self.hasher, &input.credentials.email)?;

        let verdict = self
            .limiter
            .check_and_consume(input.client_ip, &identifier)
            .await?;
        if let Some(denied) = AttemptOutcome::from_denial(verdict) {
            return Ok(denied);
        }

        match self.authenticator.sign_up(&input.credentials).await? {
            ProviderOutcome::Authenticated(body) => {
                tracing::info!(identifier = identifier.short(), "Sign-up succeeded");
                Ok(AttemptOutcome::Authenticated(body))
            }
            ProviderOutcome::Rejected { status } => {
                tracing::info!(
                    identifier = identifier.short(),
                    provider_status = status,
                    "Sign-up rejected by provider"
                );
                Ok(AttemptOutcome::Rejected)
            }
        }
    }
}
