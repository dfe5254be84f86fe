//! Domain layer
//!
//! Vocabulary of the guard and the seams to its collaborators.
//! Nothing in here touches the network, the database or the clock.

pub mod credentials;
pub mod identifier;
pub mod repository;
pub mod scope;
pub mod verdict;
