//! Infrastructure Layer
//!
//! Attempt store backends and the external authentication provider client.

pub mod factory;
pub mod http_provider;
pub mod memory;
pub mod postgres;

pub use factory::{AttemptStoreBackend, build_attempt_store};
pub use http_provider::HttpAuthenticator;
pub use memory::MemoryAttemptStore;
pub use postgres::PgAttemptStore;
