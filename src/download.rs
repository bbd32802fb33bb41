//! Artifact download
//!
//! Streams artifact bytes from the build service's storage into a local
//! file, optionally checking them against the checksum the build service
//! reported.

use crate::error::{ProviderError, ProviderResult};
use futures_util::StreamExt;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;
use url::Url;

/// Build the HTTP client used for downloads and build requests.
///
/// A malformed proxy URL is a configuration error.
pub fn http_client(
    proxy_url: Option<&str>,
    timeout: Option<Duration>,
) -> ProviderResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder().user_agent(concat!(
        env!("CARGO_PKG_NAME"),
        "/",
        env!("CARGO_PKG_VERSION")
    ));

    if let Some(proxy_url) = proxy_url.map(str::trim).filter(|p| !p.is_empty()) {
        let parsed = Url::parse(proxy_url)
            .map_err(|e| ProviderError::config_source(format!("download proxy {proxy_url}"), e))?;
        let proxy = reqwest::Proxy::all(parsed.as_str())
            .map_err(|e| ProviderError::config_source(format!("download proxy {proxy_url}"), e))?;
        builder = builder.proxy(proxy);
    }

    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }

    builder
        .build()
        .map_err(|e| ProviderError::config_source("building HTTP client", e))
}

/// Fetches artifact bytes over HTTP
#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::Client,
}

impl Downloader {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Stream `url` into `dest`, returning the number of bytes written.
    ///
    /// When `expected_checksum` is set, the SHA-256 of the body must match it
    /// (hex, case-insensitive). Anything other than a 200 response is an
    /// error, as is any failure writing to `dest`.
    pub async fn download<W>(
        &self,
        url: &str,
        dest: &mut W,
        expected_checksum: Option<&str>,
    ) -> ProviderResult<u64>
    where
        W: AsyncWrite + Unpin,
    {
        debug!("Downloading {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderError::download(url, e))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(ProviderError::DownloadStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let mut hasher = expected_checksum.map(|_| Sha256::new());
        let mut written: u64 = 0;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| ProviderError::download(url, e))?;
            if let Some(hasher) = hasher.as_mut() {
                hasher.update(&bytes);
            }
            dest.write_all(&bytes)
                .await
                .map_err(|e| ProviderError::download(url, e))?;
            written += bytes.len() as u64;
        }

        dest.flush()
            .await
            .map_err(|e| ProviderError::download(url, e))?;

        if let (Some(expected), Some(hasher)) = (expected_checksum, hasher) {
            let actual = hex::encode(hasher.finalize());
            if !actual.eq_ignore_ascii_case(expected.trim()) {
                return Err(ProviderError::ChecksumMismatch {
                    url: url.to_string(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        debug!("Downloaded {} bytes from {}", written, url);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testutil::{client, Reply, TestServer};

    fn sha256_hex(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    #[test]
    fn http_client_rejects_bad_proxy() {
        let err = http_client(Some("not a url"), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn http_client_accepts_proxy() {
        assert!(http_client(Some("http://proxy.local:3128"), None).is_ok());
        assert!(http_client(None, Some(Duration::from_secs(30))).is_ok());
        assert!(http_client(Some("  "), None).is_ok());
    }

    #[tokio::test]
    async fn download_writes_body() {
        let server = TestServer::start(Reply::ok("binary bytes")).await;
        let downloader = Downloader::new(client());

        let mut buf = Vec::new();
        let written = downloader
            .download(&server.url("abc123/k6"), &mut buf, None)
            .await
            .unwrap();

        assert_eq!(written, 12);
        assert_eq!(buf, b"binary bytes");
        assert!(server.requests()[0].starts_with("GET /abc123/k6"));
    }

    #[tokio::test]
    async fn download_rejects_non_200() {
        let server = TestServer::start(Reply::status(404, "missing")).await;
        let downloader = Downloader::new(client());

        let mut buf = Vec::new();
        let err = downloader
            .download(&server.url("abc123/k6"), &mut buf, None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Download);
        assert!(matches!(err, ProviderError::DownloadStatus { status: 404, .. }));
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn download_verifies_checksum() {
        let server = TestServer::start(Reply::ok("binary bytes")).await;
        let downloader = Downloader::new(client());
        let checksum = sha256_hex(b"binary bytes").to_uppercase();

        let mut buf = Vec::new();
        downloader
            .download(&server.url("k6"), &mut buf, Some(&checksum))
            .await
            .unwrap();

        let mut buf = Vec::new();
        let err = downloader
            .download(&server.url("k6"), &mut buf, Some("deadbeef"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::ChecksumMismatch { .. }));
    }

    #[tokio::test]
    async fn download_connection_refused() {
        // Bind and drop to get a port nobody listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let downloader = Downloader::new(client());
        let mut buf = Vec::new();
        let err = downloader
            .download(&format!("http://{}/k6", addr), &mut buf, None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Download);
    }
}
