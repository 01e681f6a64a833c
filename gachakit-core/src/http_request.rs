use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{RequestBuilder, Response, StatusCode};

use crate::error::GachaKitError;

/// GET client for the static asset origin. Applies the configured timeout and
/// the `gachakit-core/<version>` user agent, and retries transient failures.
#[derive(Debug, Clone)]
pub struct Request {
    client: reqwest::Client,
    timeout: Duration,
    max_retries: u32,
}

impl Request {
    pub(crate) fn new(timeout: Duration, max_retries: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
            max_retries,
        }
    }

    fn get(&self, url: &str) -> RequestBuilder {
        self.client
            .get(url)
            .timeout(self.timeout)
            .header(
                "User-Agent",
                format!("gachakit-core/{}", env!("CARGO_PKG_VERSION")),
            )
    }

    /// Issues a GET for `url`, retrying timeouts, connect errors, 429 and 5xx
    /// up to `max_retries` times. Other statuses are returned to the caller.
    pub(crate) async fn fetch(&self, url: &str) -> Result<Response, GachaKitError> {
        if self.max_retries == 0 {
            return self.attempt(url).await.map_err(Into::into);
        }

        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(self.max_retries as usize);

        (|| self.attempt(url))
            .retry(backoff)
            .when(|err: &AttemptError| err.transient)
            .notify(|err: &AttemptError, delay: Duration| {
                tracing::debug!(url, ?delay, "retrying asset fetch: {}", err.message);
            })
            .await
            .map_err(Into::into)
    }

    async fn attempt(&self, url: &str) -> Result<Response, AttemptError> {
        match self.get(url).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    return Err(AttemptError {
                        url: url.to_string(),
                        status: Some(status.as_u16()),
                        message: format!("Fetch failed: {}", status.as_u16()),
                        transient: true,
                    });
                }
                Ok(resp)
            }
            Err(err) => Err(AttemptError {
                url: url.to_string(),
                status: None,
                transient: err.is_timeout() || err.is_connect(),
                message: format!("Fetch failed: {err}"),
            }),
        }
    }
}

/// Failure of a single GET attempt.
#[derive(Debug)]
struct AttemptError {
    url: String,
    status: Option<u16>,
    message: String,
    transient: bool,
}

impl From<AttemptError> for GachaKitError {
    fn from(value: AttemptError) -> Self {
        Self::NetworkError {
            url: value.url,
            status: value.status,
            error: value.message,
        }
    }
}
