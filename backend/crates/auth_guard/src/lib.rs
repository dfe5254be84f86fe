//! Auth Guard - authentication abuse control
//!
//! Clean Architecture structure:
//! - `domain/` - Scopes, verdicts, identifier keys, store and provider traits
//! - `application/` - Rate-limit policy, configuration, gated sign-in/sign-up
//! - `infra/` - In-process and PostgreSQL attempt stores, HTTP auth provider
//! - `presentation/` - HTTP handlers, DTOs, router
//!
//! ## Security Model
//! - Every sign-in/sign-up attempt passes the gate *before* credentials reach
//!   the authentication provider; a denied gate never calls the provider
//! - Per-IP fixed windows (minute and hour) plus per-identifier soft limit
//!   with exponential backoff and hard lockout after consecutive failures
//! - Store failures surface as [`GuardError::BackendUnavailable`] and are
//!   answered with 503, never with an allow
//! - Rate-limit keys are hashes of normalized identifiers, never raw emails
//! - Client addresses come from proxy headers only with verified provenance

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;


// Re-exports for convenience
pub use application::config::{GuardSettings, RateLimitPolicy, StoreBackend};
pub use application::rate_limiter::RateLimiter;
pub use domain::verdict::{DenyReason, Verdict};
pub use error::{GuardError, GuardResult};
pub use infra::factory::{AttemptStoreBackend, build_attempt_store};
pub use presentation::router::guard_router;

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};
