//! Retry decisions for failed attempts.
//!
//! A failed attempt is replayed only when the method is safe to repeat and
//! the failure class guarantees the server cannot have started acting on
//! the request: the dial failed, the peer dropped the connection before a
//! full response, or the header deadline expired with nothing received.
//! Retries are immediate, with no backoff.

use crate::Error;
use http::Method;
use std::io;

/// Methods safe to replay automatically. POST and PATCH are never retried.
pub(crate) fn is_idempotent(method: &Method) -> bool {
    matches!(
        method.as_str(),
        "GET" | "HEAD" | "OPTIONS" | "PUT" | "DELETE" | "TRACE"
    )
}

/// Coarse classification of an attempt's failure, for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Dial failed: refused, unreachable, or the connect deadline expired.
    Connect,
    /// The header deadline expired before any response arrived.
    HeaderTimeout,
    /// The whole-request deadline expired. The server may already be acting
    /// on the request, so this is terminal.
    RequestTimeout,
    /// The peer closed or reset the connection before a full response.
    Reset,
    /// Anything else: protocol violations, body failures, configuration.
    Other,
}

/// Classify an error for retry purposes.
pub fn classify(error: &Error) -> ErrorClass {
    match error {
        Error::Connect { .. } => ErrorClass::Connect,
        Error::HeaderTimeout { .. } => ErrorClass::HeaderTimeout,
        Error::RequestTimeout { .. } => ErrorClass::RequestTimeout,
        Error::Request { source, .. } => classify_transport_error(source),
        Error::Body { .. } | Error::InvalidUrl(_) | Error::Config(_) | Error::Closed => {
            ErrorClass::Other
        }
    }
}

fn classify_transport_error(error: &reqwest::Error) -> ErrorClass {
    if error.is_connect() {
        return ErrorClass::Connect;
    }
    match io_error_kind(error) {
        Some(io::ErrorKind::ConnectionRefused) => ErrorClass::Connect,
        Some(
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof,
        ) => ErrorClass::Reset,
        Some(_) => ErrorClass::Other,
        // hyper reports a connection dropped before any response byte as an
        // incomplete message, without an io error on the chain
        None if chain_mentions(error, "connection closed before message completed")
            || chain_mentions(error, "IncompleteMessage") =>
        {
            ErrorClass::Reset
        }
        None => ErrorClass::Other,
    }
}

/// Walk the source chain looking for the underlying io error.
fn io_error_kind(error: &(dyn std::error::Error + 'static)) -> Option<io::ErrorKind> {
    let mut source = error.source();
    while let Some(cause) = source {
        if let Some(io_error) = cause.downcast_ref::<io::Error>() {
            return Some(io_error.kind());
        }
        source = cause.source();
    }
    None
}

fn chain_mentions(error: &(dyn std::error::Error + 'static), needle: &str) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(error);
    while let Some(cause) = current {
        if cause.to_string().contains(needle) {
            return true;
        }
        current = cause.source();
    }
    false
}

/// Bounded, immediate retry of idempotent requests.
///
/// `max_tries` caps total attempts, not retries; `0` behaves as `1`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Upper bound on total attempts, including the first.
    pub max_tries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy { max_tries: 1 }
    }
}

impl RetryPolicy {
    /// Creates a policy allowing up to `max_tries` total attempts.
    pub fn new(max_tries: u32) -> Self {
        RetryPolicy {
            max_tries: max_tries.max(1),
        }
    }

    /// Decides whether to replay the request after a failed attempt.
    ///
    /// `attempt` is the zero-based index of the attempt that just finished.
    pub fn should_retry(&self, method: &Method, error: &Error, attempt: u32) -> bool {
        if attempt + 1 >= self.max_tries.max(1) {
            return false;
        }
        if !is_idempotent(method) {
            return false;
        }
        matches!(
            classify(error),
            ErrorClass::Connect | ErrorClass::HeaderTimeout | ErrorClass::Reset
        )
    }
}
