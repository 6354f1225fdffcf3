//! Algolia backend adapter.
//!
//! Algolia has no engine-side federation, so multi-index requests go out as
//! one batched multi-query call and are blended locally.

pub mod client;
pub mod filter;
pub mod provider;

pub use client::AlgoliaClient;
pub use filter::{AlgoliaFilterBuilder, AlgoliaPredicate, FilterKind};
pub use provider::Algolia;

pub const BACKEND: &str = "algolia";
