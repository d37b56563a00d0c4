//! HTTP access to the remote archives.
//!
//! Downloads stream into a `.partial` file next to their destination and
//! are renamed into place only once complete, so a reader never observes a
//! truncated granule. When the destination already exists the request is
//! made conditional on its modification time.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::{RetrievalError, RetrievalResult};
use crate::retry::RetryPolicy;

/// Marker the archive's login page carries when a download is refused.
const LOGIN_PAGE_MARKER: &str = "Earthdata Login";

/// HTTP-date format used by `If-Modified-Since`.
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Basic-auth credentials for the archives that require a login.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Read `EARTHDATA_USERNAME` and `EARTHDATA_PASSWORD`.
    pub fn from_env() -> Option<Self> {
        let username = std::env::var("EARTHDATA_USERNAME").ok()?;
        let password = std::env::var("EARTHDATA_PASSWORD").ok()?;
        Some(Self { username, password })
    }
}

/// Configuration for the archive client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// HTTP request timeout
    pub request_timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Retry budget for transient transport failures
    pub retry: RetryPolicy,
    pub credentials: Option<Credentials>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(600), // 10 minutes
            connect_timeout: Duration::from_secs(30),
            retry: RetryPolicy::downloads(),
            credentials: None,
        }
    }
}

/// A completed (or skipped) download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub path: PathBuf,
    /// Name advertised by the server, or the last URL path segment.
    pub file_name: String,
    pub bytes: u64,
    /// The local copy was already current.
    pub not_modified: bool,
}

/// Thin wrapper over a pooled `reqwest` client with retry on transport
/// failures.
pub struct ArchiveClient {
    client: Client,
    config: ClientConfig,
}

impl ArchiveClient {
    pub fn new(config: ClientConfig) -> RetrievalResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// GET a JSON document.
    #[instrument(skip(self, query), fields(url = %url))]
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> RetrievalResult<T> {
        self.config
            .retry
            .retry("get_json", RetrievalError::is_transient, move || async move {
                let response = self.request(url, query).send().await?;
                let response = check_status(url, response)?;
                Ok(response.json::<T>().await?)
            })
            .await
    }

    /// GET a text document such as a directory listing.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get_text(&self, url: &str) -> RetrievalResult<String> {
        self.config
            .retry
            .retry("get_text", RetrievalError::is_transient, move || async move {
                let response = self.request(url, &[]).send().await?;
                let response = check_status(url, response)?;
                Ok(response.text().await?)
            })
            .await
    }

    /// Download `url` to `dest`.
    ///
    /// An existing `dest` is only replaced when the server reports a newer
    /// copy.
    #[instrument(skip(self, query), fields(url = %url))]
    pub async fn download(
        &self,
        url: &str,
        query: &[(String, String)],
        dest: &Path,
    ) -> RetrievalResult<Download> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        let modified_since = match fs::metadata(dest).await {
            Ok(meta) => meta.modified().ok(),
            Err(_) => None,
        };

        let download = self
            .config
            .retry
            .retry("download", RetrievalError::is_transient, move || {
                self.download_once(url, query, dest, modified_since)
            })
            .await?;

        if download.not_modified {
            info!(path = %dest.display(), "Local copy is current, skipping download");
        } else {
            info!(
                path = %download.path.display(),
                bytes = download.bytes,
                "Download completed"
            );
        }
        Ok(download)
    }

    fn request(&self, url: &str, query: &[(String, String)]) -> RequestBuilder {
        let mut request = self.client.get(url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(creds) = &self.config.credentials {
            request = request.basic_auth(&creds.username, Some(&creds.password));
        }
        request
    }

    async fn download_once(
        &self,
        url: &str,
        query: &[(String, String)],
        dest: &Path,
        modified_since: Option<SystemTime>,
    ) -> RetrievalResult<Download> {
        let mut request = self.request(url, query);
        if let Some(since) = modified_since {
            request = request.header(header::IF_MODIFIED_SINCE, http_date(since));
        }

        let response = request.send().await?;
        let file_name = content_disposition_filename(response.headers())
            .unwrap_or_else(|| file_name_from_url(url));

        if response.status() == StatusCode::NOT_MODIFIED {
            return Ok(Download {
                path: dest.to_path_buf(),
                file_name,
                bytes: 0,
                not_modified: true,
            });
        }
        let response = check_status(url, response)?;

        if is_html(&response) {
            let body = response.text().await?;
            if body.contains(LOGIN_PAGE_MARKER) {
                return Err(RetrievalError::Unauthorized(url.to_string()));
            }
            let bytes = body.len() as u64;
            write_atomically(dest, body.as_bytes()).await?;
            return Ok(Download {
                path: dest.to_path_buf(),
                file_name,
                bytes,
                not_modified: false,
            });
        }

        let bytes = stream_to_file(response, dest).await?;
        Ok(Download {
            path: dest.to_path_buf(),
            file_name,
            bytes,
            not_modified: false,
        })
    }
}

fn check_status(url: &str, response: Response) -> RetrievalResult<Response> {
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(RetrievalError::Http {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    Ok(response)
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("text/html"))
        .unwrap_or(false)
}

fn partial_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!("{}.{}.partial", name, Uuid::new_v4().simple()))
}

/// Stream a response body into `dest` through a partial file.
async fn stream_to_file(response: Response, dest: &Path) -> RetrievalResult<u64> {
    let partial = partial_path(dest);
    let result = async {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&partial)
            .await?;

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        promote(&partial, dest).await?;
        Ok::<u64, RetrievalError>(written)
    }
    .await;

    if result.is_err() {
        let _ = fs::remove_file(&partial).await;
    }
    result
}

async fn write_atomically(dest: &Path, contents: &[u8]) -> RetrievalResult<()> {
    let partial = partial_path(dest);
    if let Err(e) = fs::write(&partial, contents).await {
        let _ = fs::remove_file(&partial).await;
        return Err(e.into());
    }
    promote(&partial, dest).await
}

async fn promote(partial: &Path, dest: &Path) -> RetrievalResult<()> {
    if fs::rename(partial, dest).await.is_err() {
        // rename failed (likely cross-device), fall back to copy+delete
        fs::copy(partial, dest).await?;
        fs::remove_file(partial).await?;
    }
    debug!(path = %dest.display(), "Promoted partial download");
    Ok(())
}

/// Format a timestamp as an HTTP-date.
pub fn http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).format(HTTP_DATE_FORMAT).to_string()
}

/// File name from a `Content-Disposition: ...; filename=...` header.
pub fn content_disposition_filename(headers: &header::HeaderMap) -> Option<String> {
    let value = headers.get(header::CONTENT_DISPOSITION)?.to_str().ok()?;
    let (_, rest) = value.split_once("filename=")?;
    let name = rest
        .split(';')
        .next()
        .unwrap_or(rest)
        .trim()
        .trim_matches('"');
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Last path segment of a URL, ignoring any query string.
pub fn file_name_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
        .to_string()
}
