use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    // Well-formed HTTP response whose body is not the JSON we expect; the only retried failure.
    #[error("Failed to decode response from {url}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    /// Whether the failure is a decode error on an otherwise successful response.
    pub fn is_decode(&self) -> bool {
        matches!(self, FetchError::Decode { .. })
    }
}
