//! Conditional HTTP fetches over a blocking reqwest client.
//!
//! The transport is stateless apart from connection reuse. It knows nothing
//! about the cache layout; it only issues a GET with an optional
//! `If-None-Match` precondition and reports whether the server said the
//! content is unchanged.

use crate::{Error, Result};
use reqwest::blocking::{Client, Response};
use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::StatusCode;

/// Outcome of a conditional GET.
pub enum FetchOutcome {
    /// The stored validator still matches; no body was transferred.
    NotModified,
    /// New content; the response body has not been consumed yet.
    New(Response),
}

pub struct Transport {
    client: Client,
}

impl Transport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Issue a GET for `url`, carrying `etag` as `If-None-Match` when present.
    ///
    /// A 304 response maps to [`FetchOutcome::NotModified`]; any other
    /// non-success status fails with [`Error::Download`].
    pub fn conditional_get(&self, url: &str, etag: Option<&str>) -> Result<FetchOutcome> {
        let mut request = self.client.get(url);
        if let Some(tag) = etag {
            request = request.header(IF_NONE_MATCH, tag);
        }

        let response = request.send().map_err(|e| {
            if e.is_connect() {
                Error::Download(format!(
                    "Cannot connect to {}\n\
                     Please check that the repository URL is correct and reachable.",
                    url
                ))
            } else if e.is_timeout() {
                Error::Download(format!("Request to {} timed out", url))
            } else {
                Error::Download(format!("Failed to fetch {}: {}", url, e))
            }
        })?;

        let status = response.status();

        if status == StatusCode::NOT_MODIFIED {
            return Ok(FetchOutcome::NotModified);
        }

        if !status.is_success() {
            let error_msg = match status.as_u16() {
                404 => format!("Not found on server: {}", url),
                500 | 502 | 503 | 504 => format!(
                    "Server error (HTTP {}) fetching {}.\n\
                     The repository is experiencing issues. Please try again later.",
                    status.as_u16(),
                    url
                ),
                _ => format!("HTTP {} fetching {}", status.as_u16(), url),
            };
            return Err(Error::Download(error_msg));
        }

        Ok(FetchOutcome::New(response))
    }
}

/// Extract the ETag validator from a response, if the server sent one.
pub fn response_etag(response: &Response) -> Option<String> {
    response
        .headers()
        .get(ETAG)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}
