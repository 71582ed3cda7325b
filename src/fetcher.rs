//! Fetch operation trait and the default URL reachability probe
//!
//! A [`Fetcher`] performs the one real unit of work behind a task: given a
//! URL-shaped input, confirm it is reachable and return it as the result.
//! Implementations must be safe to invoke from any worker context and must
//! only return values — the runner is solely responsible for marshalling
//! results back to observers.

use async_trait::async_trait;
use url::Url;

use crate::error::FetchError;

/// A one-shot fetch operation: input in, result-or-failure out
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform the fetch
    ///
    /// Returns the loaded value on success. Failures are classified into
    /// [`FetchError`] kinds so the runner can record a structured terminal
    /// state; implementations must not panic on bad input.
    async fn fetch(&self, input: &str) -> Result<String, FetchError>;

    /// Implementation name, for logging
    fn name(&self) -> &str;
}

/// Default fetcher: validates the input URL by opening a connection to it
///
/// Issues a lightweight HEAD request and returns the input unchanged as the
/// loaded URI. The response status is deliberately ignored — the contract is
/// "the URL is well-formed and the host answers", not "the resource exists".
/// No body is read or decoded.
pub struct UrlProbeFetcher {
    client: reqwest::Client,
}

impl UrlProbeFetcher {
    /// Create a probe fetcher with a default HTTP client
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Create a probe fetcher with a caller-supplied client
    ///
    /// Useful for injecting proxy settings or connection limits.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for UrlProbeFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for UrlProbeFetcher {
    async fn fetch(&self, input: &str) -> Result<String, FetchError> {
        let parsed = Url::parse(input)
            .map_err(|e| FetchError::MalformedInput(format!("{input}: {e}")))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::MalformedInput(format!(
                "{input}: unsupported scheme '{}'",
                parsed.scheme()
            )));
        }

        self.client
            .head(parsed)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(e.to_string())
                } else {
                    FetchError::Network(e.to_string())
                }
            })?;

        tracing::debug!(input, "URL probe succeeded");

        Ok(input.to_string())
    }

    fn name(&self) -> &str {
        "url-probe"
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn probe_returns_input_for_reachable_url() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let input = format!("{}/a.png", server.uri());
        let fetcher = UrlProbeFetcher::new();

        let result = fetcher.fetch(&input).await.unwrap();
        assert_eq!(result, input, "probe must return the input URI unchanged");
    }

    #[tokio::test]
    async fn probe_ignores_http_error_status() {
        // The original contract only validates that a connection can be
        // opened; a 404 is still a reachable URL.
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let input = format!("{}/missing.png", server.uri());
        let fetcher = UrlProbeFetcher::new();

        assert!(fetcher.fetch(&input).await.is_ok());
    }

    #[tokio::test]
    async fn probe_rejects_malformed_input() {
        let fetcher = UrlProbeFetcher::new();

        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(
            matches!(err, FetchError::MalformedInput(_)),
            "expected MalformedInput, got: {err:?}"
        );
    }

    #[tokio::test]
    async fn probe_rejects_non_http_scheme() {
        let fetcher = UrlProbeFetcher::new();

        let err = fetcher.fetch("ftp://example.com/a.png").await.unwrap_err();
        match err {
            FetchError::MalformedInput(msg) => {
                assert!(msg.contains("ftp"), "message should name the scheme: {msg}");
            }
            other => panic!("expected MalformedInput, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn probe_reports_network_error_for_refused_connection() {
        // Port 1 on localhost is almost certainly closed
        let fetcher = UrlProbeFetcher::new();

        let err = fetcher.fetch("http://127.0.0.1:1/a.png").await.unwrap_err();
        assert!(
            matches!(err, FetchError::Network(_)),
            "expected Network, got: {err:?}"
        );
    }
}
