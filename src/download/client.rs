//! HTTP client wrapper used by the materializer.
//!
//! The client is seeded once with the browser's session cookies and never
//! talks to the browser afterwards.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::cookie::Jar;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, ClientBuilder};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS, default_user_agent};
use super::error::DownloadError;
use super::naming::{ServerHints, parse_content_disposition, url_basename};

/// Authenticated HTTP client for file downloads.
///
/// Created once per run and reused for every item, taking advantage of
/// connection pooling. Redirects are followed.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

/// A successful response whose body has not been read yet.
#[derive(Debug)]
pub struct FetchedResponse {
    response: reqwest::Response,
    url: String,
    /// URL after redirects.
    pub final_url: Url,
    /// Declared `Content-Length`, if any.
    pub content_length: Option<u64>,
    /// Raw `Content-Type` header value.
    pub content_type: Option<String>,
    /// Filename from `Content-Disposition`, else the final URL's last segment.
    pub declared_filename: Option<String>,
}

impl FetchedResponse {
    /// Naming hints for [`resolve_file_name`](super::naming::resolve_file_name).
    #[must_use]
    pub fn hints(&self) -> ServerHints<'_> {
        ServerHints {
            declared_filename: self.declared_filename.as_deref(),
            content_type: self.content_type.as_deref(),
        }
    }

    /// Streams the body to `path` and returns bytes written.
    ///
    /// The body lands in a sibling `.part` file that replaces `path` only once
    /// it is complete; on error the `.part` file is removed and any existing
    /// file at `path` is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] on transport or filesystem failure, or when
    /// fewer bytes than the declared content length arrive.
    #[instrument(level = "debug", skip(self), fields(url = %self.url))]
    pub async fn stream_to(self, path: &Path) -> Result<u64, DownloadError> {
        let expected = self.content_length;
        let url = self.url.clone();
        let part_path = partial_path(path);
        let mut file = File::create(&part_path)
            .await
            .map_err(|e| DownloadError::io(&part_path, e))?;

        let streamed = match stream_to_file(&mut file, self.response, &url, &part_path).await {
            Ok(written) => match expected {
                Some(expected) if expected != written => {
                    Err(DownloadError::integrity(path, expected, written))
                }
                _ => Ok(written),
            },
            Err(err) => Err(err),
        };
        drop(file);

        let result = match streamed {
            Ok(written) => tokio::fs::rename(&part_path, path)
                .await
                .map(|()| written)
                .map_err(|e| DownloadError::io(path, e)),
            Err(err) => Err(err),
        };

        if result.is_err() {
            debug!(path = %part_path.display(), "cleaning up partial file after error");
            let _ = tokio::fs::remove_file(&part_path).await;
        }
        result
    }
}

/// `<name>.part` next to `path`.
fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

impl HttpClient {
    /// Creates a client without cookies and with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, DownloadError> {
        Self::build(
            None,
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            Duration::from_secs(READ_TIMEOUT_SECS),
        )
    }

    /// Creates a client that sends the cookies in `cookie_jar`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if the TLS backend cannot be initialised.
    #[instrument(level = "debug", skip(cookie_jar))]
    pub fn with_cookie_jar(cookie_jar: Arc<Jar>) -> Result<Self, DownloadError> {
        Self::with_cookie_jar_and_timeouts(
            cookie_jar,
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            Duration::from_secs(READ_TIMEOUT_SECS),
        )
    }

    /// Creates a cookie-carrying client with explicit timeouts.
    ///
    /// `read_timeout` bounds the gap between body chunks, not the whole
    /// transfer.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if the TLS backend cannot be initialised.
    #[instrument(level = "debug", skip(cookie_jar))]
    pub fn with_cookie_jar_and_timeouts(
        cookie_jar: Arc<Jar>,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, DownloadError> {
        Self::build(Some(cookie_jar), connect_timeout, read_timeout)
    }

    fn build(
        cookie_jar: Option<Arc<Jar>>,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, DownloadError> {
        let client = base_client_builder(cookie_jar, connect_timeout, read_timeout)
            .build()
            .map_err(DownloadError::ClientBuild)?;
        Ok(Self { client })
    }

    /// Issues a GET and returns once the response headers are in.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] for invalid URLs, transport failures and
    /// non-success statuses.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<FetchedResponse, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        let final_url = response.url().clone();
        let content_length = declared_content_length(&response);
        let content_type = header_string(&response, CONTENT_TYPE);
        let declared_filename = header_string(&response, CONTENT_DISPOSITION)
            .and_then(|cd| parse_content_disposition(&cd))
            .or_else(|| url_basename(&final_url));
        debug!(
            final_url = %final_url,
            content_length = ?content_length,
            content_type = ?content_type,
            declared_filename = ?declared_filename,
            "response headers received"
        );

        Ok(FetchedResponse {
            response,
            url: url.to_string(),
            final_url,
            content_length,
            content_type,
            declared_filename,
        })
    }
}

/// Streams response body to file, returning bytes written.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}

fn base_client_builder(
    cookie_jar: Option<Arc<Jar>>,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> ClientBuilder {
    let mut builder = Client::builder()
        .connect_timeout(connect_timeout)
        .read_timeout(read_timeout)
        .user_agent(default_user_agent());
    if let Some(jar) = cookie_jar {
        builder = builder.cookie_provider(jar);
    }
    builder
}

fn declared_content_length(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

fn header_string(
    response: &reqwest::Response,
    name: reqwest::header::HeaderName,
) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
