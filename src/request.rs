//! Request model.
//!
//! Bodies are buffered bytes, so a request can always be replayed when the
//! retry policy asks for another attempt.

use crate::{Error, Result};
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use url::Url;

/// A single HTTP request, replayable across retry attempts.
///
/// # Examples
///
/// ```
/// use holdfast::Request;
/// use http::Method;
///
/// # fn example() -> Result<(), holdfast::Error> {
/// let request = Request::parse(Method::GET, "http://localhost:8080/search")?
///     .with_query_param("page", "1")
///     .with_header("x-trace", "abc123")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    /// The HTTP method. Only idempotent methods are ever retried.
    pub method: Method,
    /// The absolute request URL.
    pub url: Url,
    /// Headers sent with every attempt of this request.
    pub headers: HeaderMap,
    /// Optional buffered body.
    pub body: Option<Bytes>,
}

impl Request {
    /// Creates a request with no headers and no body.
    pub fn new(method: Method, url: Url) -> Self {
        Request {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Creates a request from a string URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the URL does not parse.
    pub fn parse(method: Method, url: impl AsRef<str>) -> Result<Self> {
        Ok(Request::new(method, Url::parse(url.as_ref())?))
    }

    /// Adds a header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the name or value is invalid.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|err| Error::Config(format!("invalid header name: {err}")))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|err| Error::Config(format!("invalid header value: {err}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Appends a query parameter to the URL.
    pub fn with_query_param(mut self, key: &str, value: &str) -> Self {
        self.url.query_pairs_mut().append_pair(key, value);
        self
    }

    /// Sets the request body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}
