//! Fetching static resources.
//!
//! The store only needs "give me the body at this path or tell me why not".
//! [`HttpTransport`] is the production implementation; tests plug in their own.

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::config::GachaConfig;
use crate::error::GachaKitError;
use crate::http_request::Request;

/// Source of static resources.
#[async_trait]
pub trait AssetTransport: Send + Sync {
    /// Fetches the resource at `path` (relative to the asset origin, starting with `/`).
    ///
    /// # Errors
    ///
    /// Returns [`GachaKitError::NetworkError`] if the resource cannot be fetched
    /// or the response status is not successful.
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, GachaKitError>;
}

/// Fetches resources over HTTP(S) from a fixed origin.
#[derive(Clone)]
pub struct HttpTransport {
    base_url: String,
    request: Request,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Builds a transport from the origin, timeout and retry settings in `config`.
    #[must_use]
    pub fn new(config: &GachaConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request: Request::new(config.request_timeout(), config.max_retries),
        }
    }

    /// Returns the absolute URL for `path`.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl AssetTransport for HttpTransport {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, GachaKitError> {
        let url = self.url_for(path);
        let response = self.request.fetch(&url).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GachaKitError::NetworkError {
                url,
                status: Some(status.as_u16()),
                error: format!("Fetch failed: {}", status.as_u16()),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| GachaKitError::NetworkError {
                url: url.clone(),
                status: Some(status.as_u16()),
                error: format!("failed to read response body: {err}"),
            })?;
        tracing::trace!(%url, bytes = body.len(), "fetched resource");
        Ok(body.to_vec())
    }
}

/// Decodes a fetched body as UTF-8 text.
pub(crate) fn decode_text(resource: &str, bytes: Vec<u8>) -> Result<String, GachaKitError> {
    String::from_utf8(bytes).map_err(|err| {
        GachaKitError::invalid_data(resource, format!("{resource} is not valid UTF-8: {err}"))
    })
}

/// Decodes a fetched body as JSON.
pub(crate) fn decode_json<T: DeserializeOwned>(
    resource: &str,
    bytes: &[u8],
) -> Result<T, GachaKitError> {
    serde_json::from_slice(bytes).map_err(|err| {
        GachaKitError::invalid_data(resource, format!("{resource} is not valid: {err}"))
    })
}
