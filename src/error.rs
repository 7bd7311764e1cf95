//! Error types for transport round-trips.
//!
//! Two substrings in the rendered messages are part of the external
//! contract and are matched by callers: connect-phase failures contain
//! `dial`, and deadline expiries contain `connection closed`.

use std::time::Duration;
use url::Url;

/// The error type for round-trips performed by a [`Transport`](crate::Transport).
///
/// HTTP status codes are never errors: a 5xx response is a successful
/// round-trip and surfaces as a [`Response`](crate::Response).
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The dial failed: connection refused, host unreachable, or the
    /// connect deadline expired before the handshake completed.
    #[error("dial {url}: {source}")]
    Connect {
        /// The URL the dial was for.
        url: Url,
        /// The underlying client error.
        source: reqwest::Error,
    },

    /// The response-header deadline expired before any headers arrived.
    ///
    /// The attempt's connection was closed and will not be reused.
    #[error("no response headers within {timeout:?}: connection closed")]
    HeaderTimeout {
        /// The configured response-header timeout.
        timeout: Duration,
    },

    /// The whole-request deadline expired, either before headers or while
    /// the body was streaming.
    ///
    /// The attempt's connection was closed and will not be reused.
    #[error("request deadline exceeded after {timeout:?}: connection closed")]
    RequestTimeout {
        /// The configured whole-request timeout.
        timeout: Duration,
    },

    /// The request failed after the dial: the peer reset or closed the
    /// connection mid-exchange, or sent malformed HTTP.
    #[error("request {url}: {source}")]
    Request {
        /// The URL of the failed request.
        url: Url,
        /// The underlying client error.
        source: reqwest::Error,
    },

    /// Reading the response body failed for a reason other than a deadline.
    #[error("read response body: {source}")]
    Body {
        /// The underlying client error.
        source: reqwest::Error,
    },

    /// An invalid URL was provided.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The transport or request was misconfigured.
    #[error("configuration: {0}")]
    Config(String),

    /// The transport was closed; no new round-trips may be started.
    #[error("transport is closed")]
    Closed,
}

impl Error {
    /// Returns `true` when this error was caused by a deadline expiry,
    /// either one of the transport's own timers or a timeout reported by
    /// the wrapped client.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::HeaderTimeout { .. } | Error::RequestTimeout { .. } => true,
            Error::Connect { source, .. } | Error::Request { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    /// Returns `true` when the failure happened during the dial.
    pub fn is_connect(&self) -> bool {
        matches!(self, Error::Connect { .. })
    }
}

/// A specialized `Result` type for transport round-trips.
pub type Result<T> = std::result::Result<T, Error>;
