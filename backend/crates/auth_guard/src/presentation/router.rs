//! Guard Router

use axum::{Router, routing::post};

use crate::domain::repository::{AttemptStore, Authenticator};
use crate::presentation::handlers::{self, GuardAppState};

/// Create the router for gated sign-in/sign-up
///
/// Must be served with `into_make_service_with_connect_info::<SocketAddr>()`
/// so handlers can see the peer address.
pub fn guard_router<S, A>(state: GuardAppState<S, A>) -> Router
where
    S: AttemptStore + Send + Sync + 'static,
    A: Authenticator + Send + Sync + 'static,
{
    Router::new()
        .route("/signin", post(handlers::sign_in::<S, A>))
        .route("/signup", post(handlers::sign_up::<S, A>))
        .with_state(state)
}
