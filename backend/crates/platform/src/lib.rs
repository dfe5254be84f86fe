//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Network address utilities (bit-exact CIDR matching, reserved ranges)
//! - Client address resolution behind trusted proxies
//! - Cryptographic utilities (SHA-256, HMAC, identifier hashing)
//! - Clock abstraction

pub mod client;
pub mod clock;
pub mod crypto;
pub mod net;
