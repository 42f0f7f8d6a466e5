//! Raw byte transport for coverage requests.

use crate::{Result, TransportError};
use std::time::Duration;

/// Fetches the body of a URL.
///
/// A failed attempt is reported as [`TransportError`]; retrying is the
/// caller's concern.
pub trait Transport {
    /// GET `url` and return the full response body.
    fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, TransportError>;
}

/// Default request timeout. Whole-tile coverages can take minutes to render.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// [`Transport`] over a blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Client with [`DEFAULT_TIMEOUT`].
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Client with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, TransportError> {
        let fail = |reason: String| TransportError {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| fail(e.to_string()))?;

        if !response.status().is_success() {
            return Err(fail(format!("HTTP {}", response.status())));
        }

        let bytes = response.bytes().map_err(|e| fail(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
