//! Deadline-aware response wrapper.
//!
//! [`Response`] hands back status and headers immediately while the
//! whole-request deadline stays armed across body reads. Draining the body
//! disarms the deadline and lets the connection return to the wrapped
//! client's pool; expiry drops the connection instead, so it can never be
//! reused. Dropping an unread response also closes it.

use crate::{Error, Result};
use bytes::{Bytes, BytesMut};
use http::{HeaderMap, StatusCode, Version};
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use url::Url;

/// A successful round-trip: headers received, body not yet (fully) read.
///
/// # Examples
///
/// ```no_run
/// use holdfast::Transport;
///
/// # async fn example() -> Result<(), holdfast::Error> {
/// let transport = Transport::builder().build()?;
/// let response = transport.get("http://localhost:8080/answer").await?;
///
/// println!("status: {}", response.status());
/// println!("body: {}", response.text().await?);
/// # Ok(())
/// # }
/// ```
pub struct Response {
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    url: Url,
    content_length: Option<u64>,
    /// `None` once the request deadline fired and the connection was
    /// dropped.
    body: Option<reqwest::Response>,
    deadline: Option<Instant>,
    request_timeout: Option<Duration>,
}

impl Response {
    pub(crate) fn new(
        inner: reqwest::Response,
        deadline: Option<Instant>,
        request_timeout: Option<Duration>,
    ) -> Self {
        Response {
            status: inner.status(),
            version: inner.version(),
            headers: inner.headers().clone(),
            url: inner.url().clone(),
            content_length: inner.content_length(),
            body: Some(inner),
            deadline,
            request_timeout,
        }
    }

    /// The HTTP status code. Status codes, including 5xx, are not errors.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The HTTP version the response was received over.
    pub fn version(&self) -> Version {
        self.version
    }

    /// The response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The final URL of the response.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The `Content-Length`, when the server declared one.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// A header value as a string, when present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// The next body chunk, bounded by the whole-request deadline.
    ///
    /// Returns `Ok(None)` once the body is drained, which disarms the
    /// deadline. If the deadline fires, the connection is dropped and this
    /// and every later read report [`Error::RequestTimeout`].
    pub async fn chunk(&mut self) -> Result<Option<Bytes>> {
        let Some(body) = self.body.as_mut() else {
            return Err(self.expired());
        };
        let read = match self.deadline {
            Some(deadline) => match timeout_at(deadline, body.chunk()).await {
                Ok(read) => read,
                Err(_) => {
                    // Drop the connection; it must not be reused after the
                    // deadline fires.
                    self.body = None;
                    return Err(self.expired());
                }
            },
            None => body.chunk().await,
        };
        match read {
            Ok(Some(chunk)) => Ok(Some(chunk)),
            Ok(None) => {
                self.deadline = None;
                Ok(None)
            }
            Err(source) => Err(Error::Body { source }),
        }
    }

    /// Reads the body to completion.
    pub async fn bytes(mut self) -> Result<Bytes> {
        let mut buffered = BytesMut::new();
        while let Some(chunk) = self.chunk().await? {
            buffered.extend_from_slice(&chunk);
        }
        Ok(buffered.freeze())
    }

    /// Reads the body to completion as text, replacing invalid UTF-8.
    pub async fn text(self) -> Result<String> {
        let raw = self.bytes().await?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    fn expired(&self) -> Error {
        Error::RequestTimeout {
            timeout: self.request_timeout.unwrap_or_default(),
        }
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("url", &self.url.as_str())
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}
