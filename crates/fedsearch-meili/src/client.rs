use serde_json::Value;
use std::time::Duration;

use fedsearch_core::http::{HttpTransport, JsonTransport};
use fedsearch_core::{Config, Error, Result};

pub const HOST_KEY: &str = "meilisearch.host";
pub const API_KEY_KEY: &str = "meilisearch.api_key";

/// Thin Meilisearch REST client over a [`JsonTransport`].
#[derive(Debug, Clone)]
pub struct MeilisearchClient<T = HttpTransport> {
    transport: T,
}

impl MeilisearchClient<HttpTransport> {
    pub fn new(host: &str, api_key: Option<&str>, timeout: Duration) -> Result<Self> {
        let headers: Vec<(&str, String)> = api_key
            .filter(|k| !k.is_empty())
            .map(|k| vec![("Authorization", format!("Bearer {k}"))])
            .unwrap_or_default();
        Ok(Self::with_transport(HttpTransport::new(host, &headers, timeout)?))
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let host: String = config
            .get(HOST_KEY)
            .map_err(|_| Error::InvalidConfig(format!("{HOST_KEY} is required")))?;
        let api_key: Option<String> = config.get(API_KEY_KEY).ok();
        Self::new(&host, api_key.as_deref(), Duration::from_millis(config.request_timeout_ms()))
    }
}

impl<T: JsonTransport> MeilisearchClient<T> {
    pub fn with_transport(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// `POST /indexes/{uid}/search`
    pub async fn search(&self, index_uid: &str, body: &Value) -> Result<Value> {
        self.transport.post_json(&format!("/indexes/{index_uid}/search"), body).await
    }

    /// `POST /multi-search`
    pub async fn multi_search(&self, body: &Value) -> Result<Value> {
        self.transport.post_json("/multi-search", body).await
    }
}
