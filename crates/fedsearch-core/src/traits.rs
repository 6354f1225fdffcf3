use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::types::{FederationSpec, Fields, Hit};

/// Uniform search contract implemented by every backend adapter.
///
/// Backend, network and deadline failures never surface as `Err`: they are
/// logged at debug level and the call yields an empty list. `Err` is reserved
/// for request-fatal problems with the caller's declarative payload.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    type Client: ?Sized + Send + Sync;

    fn name(&self) -> &'static str;

    /// The underlying backend client, for callers that need native access.
    fn client(&self) -> &Self::Client;

    async fn search(&self, index: &str, query: &str, params: &Fields, limit: usize) -> Result<Vec<Hit>>;

    async fn multi_search(
        &self,
        queries: &[Fields],
        query: &str,
        federation: &FederationSpec,
        limit: usize,
    ) -> Result<Vec<Hit>>;

    async fn search_from_json(&self, payload: &Value) -> Result<Vec<Hit>>;

    async fn multi_search_from_json(&self, payload: &Value) -> Result<Vec<Hit>>;
}

/// Secondary filter/re-rank pass over a raw hit list.
pub trait RelevanceFilter: Send + Sync {
    fn filter(&self, query: &str, hits: Vec<Hit>) -> Vec<Hit>;
}

/// Collapse a non-fatal failure into an empty hit list, logging the detail.
pub fn degrade(result: Result<Vec<Hit>>, backend: &str, operation: &str) -> Result<Vec<Hit>> {
    match result {
        Ok(hits) => Ok(hits),
        Err(e) if e.is_request_fatal() => Err(e),
        Err(e) => {
            debug!(backend, operation, error = %e, "search failed; returning no hits");
            Ok(Vec::new())
        }
    }
}
