//! HTTP Handlers

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use kernel::error::app_error::AppError;
use platform::client::{TrustConfig, resolve_client_ip};
use platform::clock::Clock;
use platform::crypto::IdentifierHasher;

use crate::application::config::RateLimitPolicy;
use crate::application::rate_limiter::RateLimiter;
use crate::application::sign_in::{AttemptOutcome, SignInInput, SignInUseCase};
use crate::application::sign_up::{SignUpInput, SignUpUseCase};
use crate::domain::repository::{AttemptStore, Authenticator};
use crate::error::GuardResult;
use crate::presentation::dto::{AuthenticatedResponse, CredentialsRequest};

/// Shared state for guard handlers
pub struct GuardAppState<S, A>
where
    S: AttemptStore + Send + Sync + 'static,
    A: Authenticator + Send + Sync + 'static,
{
    pub sign_in: Arc<SignInUseCase<S, A>>,
    pub sign_up: Arc<SignUpUseCase<S, A>>,
    pub limiter: RateLimiter<S>,
    pub trust: Arc<TrustConfig>,
}

impl<S, A> Clone for GuardAppState<S, A>
where
    S: AttemptStore + Send + Sync + 'static,
    A: Authenticator + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            sign_in: self.sign_in.clone(),
            sign_up: self.sign_up.clone(),
            limiter: self.limiter.clone(),
            trust: self.trust.clone(),
        }
    }
}

impl<S, A> GuardAppState<S, A>
where
    S: AttemptStore + Send + Sync + 'static,
    A: Authenticator + Send + Sync + 'static,
{
    /// Wire the use cases around one shared store and provider
    pub fn new(
        store: Arc<S>,
        authenticator: Arc<A>,
        policy: Arc<RateLimitPolicy>,
        trust: Arc<TrustConfig>,
        hasher: Arc<IdentifierHasher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let limiter = RateLimiter::new(store, policy, clock);
        Self {
            sign_in: Arc::new(SignInUseCase::new(
                limiter.clone(),
                authenticator.clone(),
                hasher.clone(),
            )),
            sign_up: Arc::new(SignUpUseCase::new(limiter.clone(), authenticator, hasher)),
            limiter,
            trust,
        }
    }
}

/// POST /signin
pub async fn sign_in<S, A>(
    State(state): State<GuardAppState<S, A>>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<CredentialsRequest>,
) -> GuardResult<Response>
where
    S: AttemptStore + Send + Sync + 'static,
    A: Authenticator + Send + Sync + 'static,
{
    let client_ip = resolve_client_ip(&headers, Some(addr.ip()), &state.trust);

    let outcome = state
        .sign_in
        .execute(SignInInput {
            credentials: req.into_credentials(),
            client_ip,
        })
        .await?;

    Ok(attempt_response(
        outcome,
        AppError::unauthorized("Invalid credentials"),
    ))
}

/// POST /signup
pub async fn sign_up<S, A>(
    State(state): State<GuardAppState<S, A>>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<CredentialsRequest>,
) -> GuardResult<Response>
where
    S: AttemptStore + Send + Sync + 'static,
    A: Authenticator + Send + Sync + 'static,
{
    let client_ip = resolve_client_ip(&headers, Some(addr.ip()), &state.trust);

    let outcome = state
        .sign_up
        .execute(SignUpInput {
            credentials: req.into_credentials(),
            client_ip,
        })
        .await?;

    Ok(attempt_response(
        outcome,
        AppError::bad_request("Sign-up was rejected"),
    ))
}

fn attempt_response(outcome: AttemptOutcome, rejected: AppError) -> Response {
    match outcome {
        AttemptOutcome::Denied {
            retry_after_secs, ..
        } => AppError::too_many_requests("Too many attempts", retry_after_secs)
            .with_action("Wait before trying again")
            .into_response(),
        AttemptOutcome::Rejected => rejected.into_response(),
        AttemptOutcome::Authenticated(provider) => (
            StatusCode::OK,
            Json(AuthenticatedResponse {
                authenticated: true,
                provider,
            }),
        )
            .into_response(),
    }
}
