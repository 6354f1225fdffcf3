//! JSON-over-HTTP transport shared by the backend clients.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

/// Longest backend error body kept in [`Error::Backend`].
const MAX_ERROR_BODY: usize = 200;

/// POSTs a JSON body to a backend path and returns the decoded JSON response.
#[async_trait]
pub trait JsonTransport: Send + Sync {
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, headers: &[(&str, String)], timeout: Duration) -> Result<Self> {
        let mut header_map = HeaderMap::new();
        for (key, value) in headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| Error::InvalidConfig(format!("header name '{}': {}", key, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::InvalidConfig(format!("header '{}': {}", key, e)))?;
            header_map.insert(name, value);
        }

        let http = Client::builder().timeout(timeout).default_headers(header_map).build()?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string() })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl JsonTransport for HttpTransport {
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Backend {
                status: status.as_u16(),
                message: text.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        Ok(response.json().await?)
    }
}

/// Run `fut` under a deadline of `ms` milliseconds.
pub async fn with_deadline<T, F>(ms: u64, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(Duration::from_millis(ms), fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(ms)),
    }
}
