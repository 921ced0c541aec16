use std::collections::BTreeMap;
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::HeaderMap;
use reqwest::Client;
use thiserror::Error;

use crate::config::Config;

/// Identification header value sent with every outbound request.
pub const USER_AGENT: &str = concat!("mite-reader/", env!("CARGO_PKG_VERSION"));

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Response headers keyed by lower-cased name.
pub type Headers = BTreeMap<String, String>;

/// Errors that can occur while fetching a URL.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, timeout, body decoding)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with a non-2xx status code
    #[error("Could not fetch URL due to code {0}")]
    HttpStatus(u16),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
}

impl FetchError {
    /// HTTP status code, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::HttpStatus(code) => Some(*code),
            FetchError::Network(e) => e.status().map(|s| s.as_u16()),
            FetchError::ResponseTooLarge => None,
        }
    }
}

/// A fully read HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResponse {
    pub status: u16,
    pub headers: Headers,
    /// Body decoded as UTF-8
    pub body: String,
    /// Final URL after redirects
    pub url: String,
}

impl FetchedResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn etag(&self) -> Option<&str> {
        self.header("etag")
    }

    pub fn last_modified(&self) -> Option<&str> {
        self.header("last-modified")
    }
}

/// Builds the HTTP client shared by fetch, discovery and polling.
///
/// Timeout and redirect policy come from [`Config`]; callers that need a
/// different policy can pass their own `reqwest::Client` to any operation.
pub fn build_client(config: &Config) -> Result<Client, FetchError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
        .build()?;
    Ok(client)
}

/// Sends a GET request to `url` with the identification header.
///
/// # Arguments
///
/// * `client` - HTTP client (see [`build_client`])
/// * `url` - Absolute URL to fetch; redirects are followed
///
/// # Returns
///
/// Status, lower-cased headers, body text and the final URL after redirects.
///
/// # Errors
///
/// - [`FetchError::Network`] - connection, TLS, timeout or body errors
/// - [`FetchError::HttpStatus`] - the server answered with a non-2xx status
/// - [`FetchError::ResponseTooLarge`] - body exceeded 10MB
pub async fn fetch_url(client: &Client, url: &str) -> Result<FetchedResponse, FetchError> {
    tracing::debug!(url = %url, "Fetching URL");

    let response = client
        .get(url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        tracing::debug!(url = %url, status = status.as_u16(), "Fetch returned non-success status");
        return Err(FetchError::HttpStatus(status.as_u16()));
    }

    read_response(response).await
}

/// Reads status, headers, final URL and body of a response.
///
/// The body is streamed and abandoned as soon as it passes [`MAX_FEED_SIZE`],
/// whether or not the server declared a `Content-Length`.
pub(crate) async fn read_response(response: reqwest::Response) -> Result<FetchedResponse, FetchError> {
    let status = response.status().as_u16();
    let url = response.url().to_string();
    let headers = collect_headers(response.headers());

    let bytes = read_limited_bytes(response, MAX_FEED_SIZE).await?;
    // Feeds are XML; invalid UTF-8 is replaced rather than rejected
    let body = String::from_utf8_lossy(&bytes).into_owned();

    Ok(FetchedResponse {
        status,
        headers,
        body,
        url,
    })
}

async fn read_limited_bytes(response: reqwest::Response, limit: usize) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            tracing::debug!(received = bytes.len(), limit, "Response body exceeds size limit");
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

/// Flattens a header map; repeated headers are joined with `", "`.
fn collect_headers(map: &HeaderMap) -> Headers {
    let mut headers = Headers::new();

    for (name, value) in map {
        let Ok(value) = value.to_str() else {
            tracing::debug!(header = %name, "Skipping non-ASCII header value");
            continue;
        };
        // HeaderName is always stored lower-cased
        headers
            .entry(name.as_str().to_owned())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_owned());
    }

    headers
}
