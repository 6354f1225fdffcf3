use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Malformed declarative filter, including unknown filter types.
    #[error("Invalid filter: {0}")]
    InvalidFilter(#[source] serde_json::Error),

    /// A well-formed condition the target backend cannot express.
    #[error("Unsupported condition for {backend}: {reason}")]
    UnsupportedCondition { backend: &'static str, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    /// True for errors that abort a request instead of degrading to an empty result.
    pub fn is_request_fatal(&self) -> bool {
        matches!(self, Error::InvalidFilter(_) | Error::UnsupportedCondition { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
