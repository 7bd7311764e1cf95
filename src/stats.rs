//! Per-attempt statistics delivered to an observer hook.
//!
//! The hook runs synchronously on the calling task, after an attempt's
//! outcome is known and before the transport retries or returns. Callers
//! rely on that ordering to act between attempts (the integration tests
//! bring a server up from inside the hook). A panic inside the hook is not
//! masked; it propagates to the caller.

use crate::{Error, Request};
use std::sync::Arc;
use std::time::Duration;

/// Where an attempt sits within its call's retry sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Zero-based index of this attempt. The first attempt is `0`.
    pub count: u32,
    /// `true` when the policy decided to replay the request after this
    /// attempt. Exactly one record per call has `pending == false`, and it
    /// is the last.
    pub pending: bool,
}

/// Snapshot of a single attempt.
///
/// Exactly one `Stats` is delivered per attempt. On success `response` is
/// set and `error` is `None`; on failure the reverse. The hook may inspect
/// the response's status and headers but has no access to its body, which
/// belongs to the caller.
#[derive(Debug)]
pub struct Stats<'a> {
    /// The request this attempt sent. Never absent.
    pub request: &'a Request,
    /// The received response, when headers arrived.
    pub response: Option<&'a reqwest::Response>,
    /// The attempt's terminal or retriable error.
    pub error: Option<&'a Error>,
    /// Retry position of this attempt.
    pub retry: RetryState,
    /// Wall-clock duration of this attempt, from send to outcome.
    pub duration: Duration,
}

impl Stats<'_> {
    /// One-line rendering of the attempt, suitable for logs.
    pub fn summary(&self) -> String {
        match (self.response, self.error) {
            (Some(response), _) => format!(
                "{} {}: {} in {:?} (attempt {})",
                self.request.method,
                self.request.url,
                response.status(),
                self.duration,
                self.retry.count,
            ),
            (None, Some(error)) => format!(
                "{} {}: {} in {:?} (attempt {}{})",
                self.request.method,
                self.request.url,
                error,
                self.duration,
                self.retry.count,
                if self.retry.pending { ", retrying" } else { "" },
            ),
            (None, None) => format!(
                "{} {} (attempt {})",
                self.request.method, self.request.url, self.retry.count,
            ),
        }
    }
}

/// Observer invoked once per attempt.
pub type StatsHook = Arc<dyn Fn(&Stats<'_>) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use url::Url;

    #[test]
    fn summary_includes_attempt_and_error() {
        let request = Request::new(
            Method::GET,
            Url::parse("http://localhost/answer").expect("static url"),
        );
        let error = Error::Closed;
        let stats = Stats {
            request: &request,
            response: None,
            error: Some(&error),
            retry: RetryState {
                count: 1,
                pending: true,
            },
            duration: Duration::from_millis(5),
        };
        let summary = stats.summary();
        assert!(summary.contains("attempt 1"), "got: {summary}");
        assert!(summary.contains("retrying"), "got: {summary}");
        assert!(summary.contains("transport is closed"), "got: {summary}");
    }
}
