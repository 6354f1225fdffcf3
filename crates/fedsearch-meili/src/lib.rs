//! Meilisearch backend adapter.

pub mod client;
pub mod filter;
pub mod provider;

pub use client::MeilisearchClient;
pub use filter::{MeiliFilterBuilder, MeiliPredicate};
pub use provider::Meilisearch;

pub const BACKEND: &str = "meilisearch";
