use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use thiserror::Error;

/// Response body as it arrives from the network.
pub type ByteStream = BoxStream<'static, Result<Bytes, FetchError>>;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("server answered {status} for {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },
    #[error("transfer interrupted: {0}")]
    Interrupted(#[source] reqwest::Error),
    #[error("transfer timed out after {0:?}")]
    Timeout(Duration),
}

/// Downloads PDF bytes over HTTP.
///
/// Wraps a shared `reqwest::Client`; cloning a `Fetcher` shares its
/// connection pool.
#[derive(Clone, Debug)]
pub struct Fetcher {
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl Fetcher {
    pub fn new(timeout: Option<Duration>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(FetchError::Request)?;
        Ok(Self { client, timeout })
    }

    pub fn with_client(client: reqwest::Client, timeout: Option<Duration>) -> Self {
        Self { client, timeout }
    }

    /// GET `url` and return the body as a stream.
    ///
    /// Non-2xx answers are errors. No retry is attempted.
    pub async fn get(&self, url: &str) -> Result<ByteStream, FetchError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme `{}`", parsed.scheme()),
            });
        }

        tracing::info!(url = %parsed, "start downloading");

        let mut request = self.client.get(parsed);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let timeout = self.timeout;
        let response = request.send().await.map_err(|e| match timeout {
            Some(t) if e.is_timeout() => FetchError::Timeout(t),
            _ => FetchError::Request(e),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                url: url.to_string(),
            });
        }

        tracing::debug!(
            url,
            %status,
            content_length = ?response.content_length(),
            "response headers received"
        );

        Ok(response
            .bytes_stream()
            .map(move |chunk| {
                chunk.map_err(|e| match timeout {
                    Some(t) if e.is_timeout() => FetchError::Timeout(t),
                    _ => FetchError::Interrupted(e),
                })
            })
            .boxed())
    }
}

/// Wrap in-memory bytes as a single-chunk [`ByteStream`].
pub fn stream_from_bytes(data: impl Into<Bytes>) -> ByteStream {
    let data = data.into();
    futures_util::stream::once(async move { Ok(data) }).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_unparseable_url() {
        let fetcher = Fetcher::new(None).unwrap();
        let err = fetcher.get("not a url").await.err().unwrap();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn rejects_non_http_scheme() {
        let fetcher = Fetcher::new(None).unwrap();
        let err = fetcher.get("file:///etc/passwd").await.err().unwrap();
        match err {
            FetchError::InvalidUrl { reason, .. } => assert!(reason.contains("file")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn stream_from_bytes_yields_one_chunk() {
        let mut stream = stream_from_bytes(&b"%PDF-1.7"[..]);
        let chunk = stream.next().await.unwrap().unwrap();
        assert_eq!(&chunk[..], b"%PDF-1.7");
        assert!(stream.next().await.is_none());
    }
}
