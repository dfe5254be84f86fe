//! Presentation Layer
//!
//! HTTP handlers, DTOs and the router for gated sign-in/sign-up.

pub mod dto;
pub mod handlers;
pub mod router;

pub use handlers::GuardAppState;
pub use router::guard_router;
