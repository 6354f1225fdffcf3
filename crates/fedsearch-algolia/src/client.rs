use serde_json::Value;
use std::time::Duration;

use fedsearch_core::http::{HttpTransport, JsonTransport};
use fedsearch_core::{Config, Error, Result};

pub const APP_ID_KEY: &str = "algolia.app_id";
pub const API_KEY_KEY: &str = "algolia.api_key";
pub const HOST_KEY: &str = "algolia.host";

const QUERIES_PATH: &str = "/1/indexes/*/queries";

/// Algolia search client over a [`JsonTransport`]. Every search, single or
/// batched, goes through the multi-query endpoint.
#[derive(Debug, Clone)]
pub struct AlgoliaClient<T = HttpTransport> {
    transport: T,
}

impl AlgoliaClient<HttpTransport> {
    pub fn new(app_id: &str, api_key: &str, host: Option<&str>, timeout: Duration) -> Result<Self> {
        let host = host.map_or_else(|| default_host(app_id), str::to_string);
        let headers = [
            ("X-Algolia-Application-Id", app_id.to_string()),
            ("X-Algolia-API-Key", api_key.to_string()),
        ];
        Ok(Self::with_transport(HttpTransport::new(&host, &headers, timeout)?))
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let app_id: String = config
            .get(APP_ID_KEY)
            .map_err(|_| Error::InvalidConfig(format!("{APP_ID_KEY} is required")))?;
        let api_key: String = config
            .get(API_KEY_KEY)
            .map_err(|_| Error::InvalidConfig(format!("{API_KEY_KEY} is required")))?;
        let host: Option<String> = config.get(HOST_KEY).ok();
        Self::new(&app_id, &api_key, host.as_deref(), Duration::from_millis(config.request_timeout_ms()))
    }
}

impl<T: JsonTransport> AlgoliaClient<T> {
    pub fn with_transport(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// `POST /1/indexes/*/queries` with `{"requests": [...]}`.
    pub async fn search(&self, requests: Vec<Value>) -> Result<Value> {
        let body = serde_json::json!({ "requests": requests });
        self.transport.post_json(QUERIES_PATH, &body).await
    }
}

pub fn default_host(app_id: &str) -> String {
    format!("https://{app_id}-dsn.algolia.net")
}
