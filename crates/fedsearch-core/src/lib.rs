#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod builder;
pub mod compiler;
pub mod condition;
pub mod config;
pub mod error;
pub mod http;
pub mod normalizer;
pub mod payload;
pub mod schema;
pub mod schema_loader;
pub mod traits;
pub mod types;

pub use builder::{SearchBuilder, SearchRequest};
pub use condition::Condition;
pub use config::Config;
pub use error::{Error, Result};
pub use traits::{RelevanceFilter, SearchProvider};
pub use types::{FederationSpec, Fields, Hit};
