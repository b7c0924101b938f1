//! powchain: an append-only chain of hash-linked blocks, each sealed by a
//! proof-of-work value.
//!
//! - [`block`] - two-phase block construction and content hashing
//! - [`canonical`] - deterministic JSON encoding of the hashed fields
//! - [`pow`] - proof predicate and the golden-nonce search
//! - [`chain`] - the chain itself: create, mine, list, validate
//! - [`api`] - axum routes over a shared chain
//! - [`config`], [`logging`], [`error`]

pub mod api;
pub mod block;
pub mod canonical;
pub mod chain;
pub mod config;
pub mod error;
pub mod logging;
pub mod pow;
