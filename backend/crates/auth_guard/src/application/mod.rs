//! Application Layer
//!
//! Rate-limit policy and the gated sign-in/sign-up use cases.

pub mod config;
pub mod rate_limiter;
pub mod sign_in;
pub mod sign_up;

// Re-exports
pub use config::{Environment, GuardSettings, RateLimitPolicy, StoreBackend, StoreSettings};
pub use rate_limiter::RateLimiter;
pub use sign_in::{AttemptOutcome, SignInInput, SignInUseCase};
pub use sign_up::{SignUpInput, SignUpUseCase};
